//! API client for communicating with the kinetics prediction service

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// Header carrying the API key
const API_KEY_HEADER: &str = "X-API-Key";

/// API client for the kinetics prediction service
pub struct ApiClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;
        self.send(self.client.get(url)).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;
        self.send(self.client.post(url).json(body)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let request = match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        };

        let response = request.send().await.context("Failed to send request")?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        response.json().await.context("Failed to parse response")
    }

    /// Predict kinetic parameters for a named or ordered feature input
    pub async fn predict(&self, features: Value) -> Result<Prediction> {
        self.post("predict/features", &PredictRequest { features })
            .await
    }

    pub async fn meta(&self) -> Result<MetaInfo> {
        self.get("meta").await
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        self.get("health").await
    }

    pub async fn reload(&self) -> Result<ReloadStatus> {
        self.post("reload", &serde_json::json!({})).await
    }
}

/// Surface the service's `detail` message when there is one
async fn api_error(response: Response) -> anyhow::Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.detail)
        .unwrap_or(body);
    anyhow::anyhow!("API error ({}): {}", status, message)
}

// API request/response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub features: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(rename = "A")]
    pub a: f64,
    pub n: f64,
    #[serde(rename = "Ea_kJ_per_mol")]
    pub ea_kj_per_mol: f64,
    pub model_used: String,
    #[serde(default)]
    pub meta: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaInfo {
    pub expected_features: usize,
    #[serde(default)]
    pub models: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub models_loaded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadStatus {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_predict_sends_features_and_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/predict/features")
            .match_header("x-api-key", "secret")
            .match_body(Matcher::Json(json!({"features": {"T": 300.0}})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"A": 100.0, "n": 0.5, "Ea_kJ_per_mol": 120.0, "model_used": "Primary", "meta": {}}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), Some("secret".to_string())).unwrap();
        let prediction = client.predict(json!({"T": 300.0})).await.unwrap();

        assert_eq!(prediction.a, 100.0);
        assert_eq!(prediction.model_used, "Primary");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_detail_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/predict/features")
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail": "No trained models loaded."}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), None).unwrap();
        let err = client.predict(json!([1.0])).await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("500"));
        assert!(message.contains("No trained models loaded."));
    }

    #[tokio::test]
    async fn test_plain_error_body_is_kept() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/meta")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), None).unwrap();
        let err = client.meta().await.unwrap_err();
        assert!(err.to_string().contains("bad gateway"));
    }

    #[tokio::test]
    async fn test_health_and_reload() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(r#"{"status": "ok", "models_loaded": false}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/reload")
            .with_status(200)
            .with_body(r#"{"status": "reloaded"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), None).unwrap();
        assert!(!client.health().await.unwrap().models_loaded);
        assert_eq!(client.reload().await.unwrap().status, "reloaded");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new("not a url", None).is_err());
    }
}
