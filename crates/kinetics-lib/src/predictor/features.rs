//! Feature vector assembly for ML inference
//!
//! Turns caller input into a fixed-order numeric row. Named inputs follow the
//! feature schema order and tolerate missing or malformed values; ordered
//! inputs are taken as given and must be fully numeric.

use crate::error::PredictError;
use crate::models::{FeatureInput, FeatureRow, FeatureSchema};
use serde_json::Value;

/// Builds feature rows against a feature schema
pub struct FeatureVectorizer<'a> {
    schema: &'a FeatureSchema,
}

impl<'a> FeatureVectorizer<'a> {
    pub fn new(schema: &'a FeatureSchema) -> Self {
        Self { schema }
    }

    /// Build a `[1 x D]` row from caller input
    ///
    /// `D` is the schema length for named input and the input length for
    /// ordered input.
    pub fn vectorize(&self, input: &FeatureInput) -> Result<FeatureRow, PredictError> {
        match input {
            FeatureInput::Named(map) => {
                let values = self
                    .schema
                    .names()
                    .iter()
                    .map(|name| map.get(name).and_then(coerce).unwrap_or(0.0))
                    .collect();
                Ok(FeatureRow::new(values))
            }
            FeatureInput::Ordered(items) => {
                let values = items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| {
                        coerce(item).ok_or_else(|| PredictError::InvalidFeatureInput {
                            index,
                            reason: format!("cannot convert {} to a number", item),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(FeatureRow::new(values))
            }
        }
    }
}

/// Coerce a JSON value to a finite float
///
/// Numbers convert directly, strings are parsed after trimming, booleans map
/// to 1.0/0.0. Everything else, and any non-finite result, is rejected.
pub fn coerce(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }?;
    number.is_finite().then_some(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(["f1", "f2", "f3"])
    }

    #[test]
    fn test_named_input_follows_schema_order() {
        let schema = schema();
        let input = FeatureInput::named([("f2", 5.0), ("f1", 1.0)]);
        let row = FeatureVectorizer::new(&schema).vectorize(&input).unwrap();
        assert_eq!(row.values(), &[1.0, 5.0, 0.0]);
    }

    #[test]
    fn test_named_input_malformed_values_become_zero() {
        let schema = schema();
        let input: FeatureInput =
            serde_json::from_value(json!({"f1": "abc", "f2": null, "f3": "2.5", "extra": 9})).unwrap();
        let row = FeatureVectorizer::new(&schema).vectorize(&input).unwrap();
        assert_eq!(row.values(), &[0.0, 0.0, 2.5]);
    }

    #[test]
    fn test_ordered_input_passes_through() {
        let schema = schema();
        let row = FeatureVectorizer::new(&schema)
            .vectorize(&FeatureInput::ordered([2.0, 3.0]))
            .unwrap();
        assert_eq!(row.values(), &[2.0, 3.0]);
        assert_eq!(row.width(), 2);
    }

    #[test]
    fn test_ordered_input_rejects_non_numeric() {
        let schema = schema();
        let input: FeatureInput = serde_json::from_value(json!([1.0, "warm", 3.0])).unwrap();
        let err = FeatureVectorizer::new(&schema).vectorize(&input).unwrap_err();
        match err {
            PredictError::InvalidFeatureInput { index, .. } => assert_eq!(index, 1),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_ordered_input_accepts_numeric_strings() {
        let schema = schema();
        let input: FeatureInput = serde_json::from_value(json!(["4", " 5.5 ", true])).unwrap();
        let row = FeatureVectorizer::new(&schema).vectorize(&input).unwrap();
        assert_eq!(row.values(), &[4.0, 5.5, 1.0]);
    }

    #[test]
    fn test_empty_schema_named_input() {
        let schema = FeatureSchema::default();
        let row = FeatureVectorizer::new(&schema)
            .vectorize(&FeatureInput::named([("T", 300.0)]))
            .unwrap();
        assert_eq!(row.width(), 0);
    }

    #[test]
    fn test_coerce_rejects_non_finite() {
        assert_eq!(coerce(&json!("nan")), None);
        assert_eq!(coerce(&json!("inf")), None);
        assert_eq!(coerce(&json!([1])), None);
        assert_eq!(coerce(&json!(7)), Some(7.0));
    }
}
