//! Prediction CLI command

use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde_json::{Map, Number, Value};
use tabled::{settings::Style, Table, Tabled};

use crate::client::ApiClient;
use crate::output::{color_model, format_scientific, print_json, OutputFormat};

/// Row for the kinetic parameters table
#[derive(Tabled)]
struct ParameterRow {
    #[tabled(rename = "Parameter")]
    parameter: &'static str,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Unit")]
    unit: &'static str,
}

/// Parse one `name=value` feature argument
///
/// Numeric values are sent as numbers; anything else is sent as text and left
/// to the service to coerce.
pub fn parse_feature(arg: &str) -> Result<(String, Value)> {
    let Some((name, raw)) = arg.split_once('=') else {
        bail!("Invalid feature {:?}, expected NAME=VALUE", arg);
    };

    let name = name.trim();
    if name.is_empty() {
        bail!("Invalid feature {:?}, name is empty", arg);
    }

    let raw = raw.trim();
    let value = raw
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(raw.to_string()));
    Ok((name.to_string(), value))
}

/// Parse a comma-separated ordered feature vector
pub fn parse_values(arg: &str) -> Result<Vec<f64>> {
    arg.split(',')
        .enumerate()
        .map(|(index, raw)| {
            raw.trim()
                .parse::<f64>()
                .with_context(|| format!("Value {} ({:?}) is not a number", index, raw.trim()))
        })
        .collect()
}

/// Build the `features` payload from `--feature` or `--values`
pub fn build_features(features: &[String], values: Option<&str>) -> Result<Value> {
    if let Some(values) = values {
        let values = parse_values(values)?;
        return Ok(Value::Array(values.into_iter().map(Value::from).collect()));
    }

    if features.is_empty() {
        bail!("Provide features with --feature NAME=VALUE or --values V1,V2,...");
    }

    let mut named = Map::new();
    for arg in features {
        let (name, value) = parse_feature(arg)?;
        named.insert(name, value);
    }
    Ok(Value::Object(named))
}

/// Request a prediction and print the kinetic parameters
pub async fn predict(
    client: &ApiClient,
    features: &[String],
    values: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let payload = build_features(features, values)?;
    let result = client.predict(payload).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            println!("{}", "Kinetics Prediction".bold());
            println!("{}", "=".repeat(50));
            println!("Model:  {}", color_model(&result.model_used));
            println!();

            let rows = vec![
                ParameterRow {
                    parameter: "A",
                    value: format_scientific(result.a),
                    unit: "pre-exponential factor",
                },
                ParameterRow {
                    parameter: "n",
                    value: format!("{:.4}", result.n),
                    unit: "temperature exponent",
                },
                ParameterRow {
                    parameter: "Ea",
                    value: format!("{:.2}", result.ea_kj_per_mol),
                    unit: "kJ/mol",
                },
            ];
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{}", table);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_numeric_feature() {
        let (name, value) = parse_feature("T=300").unwrap();
        assert_eq!(name, "T");
        assert_eq!(value, json!(300.0));
    }

    #[test]
    fn test_parse_text_feature_is_passed_through() {
        let (name, value) = parse_feature(" solvent = water ").unwrap();
        assert_eq!(name, "solvent");
        assert_eq!(value, json!("water"));
    }

    #[test]
    fn test_parse_feature_requires_separator() {
        assert!(parse_feature("T300").is_err());
        assert!(parse_feature("=300").is_err());
    }

    #[test]
    fn test_parse_values() {
        assert_eq!(parse_values("2.0, 3.5,-1").unwrap(), vec![2.0, 3.5, -1.0]);

        let err = parse_values("1,warm").unwrap_err();
        assert!(err.to_string().contains("Value 1"));
    }

    #[test]
    fn test_build_named_features() {
        let features = vec!["T=300".to_string(), "P=1".to_string()];
        assert_eq!(
            build_features(&features, None).unwrap(),
            json!({"T": 300.0, "P": 1.0})
        );
    }

    #[test]
    fn test_values_take_precedence() {
        assert_eq!(build_features(&[], Some("1,2")).unwrap(), json!([1.0, 2.0]));
    }

    #[test]
    fn test_build_requires_input() {
        assert!(build_features(&[], None).is_err());
    }
}
