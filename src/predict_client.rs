use crate::capture::MediaChunk;
use async_trait::async_trait;
use log::debug;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One ranked alternative returned alongside the top prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternatePrediction {
    pub sign: String,
    pub score: f64,
}

/// Successful response from the prediction endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: String,
    pub confidence: f64,
    #[serde(default)]
    pub all_predictions: Vec<AlternatePrediction>,
}

#[derive(Debug, Deserialize)]
struct BackendError {
    error: String,
}

/// Entry in the reference sign gallery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignClip {
    pub name: String,
    pub video_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendHealth {
    pub status: String,
    pub model_loaded: bool,
}

/// Seam between the session controller and the prediction service, so the
/// controller can be driven by a stub in tests.
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(&self, chunk: &MediaChunk) -> Result<PredictionResponse, String>;
}

/// HTTP client for the prediction service.
pub struct PredictClient {
    client: reqwest::Client,
    base_url: String,
}

impl PredictClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, String> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err("Prediction service base URL is empty".to_string());
        }

        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the reference gallery: one representative clip per sign, in
    /// the order the backend lists them.
    pub async fn list_signs(&self) -> Result<Vec<SignClip>, String> {
        let url = format!("{}/api/signs", self.base_url);
        debug!("Fetching sign gallery from: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("Sign gallery request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("Sign gallery request failed with status {}", status));
        }

        response
            .json()
            .await
            .map_err(|e| format!("Failed to parse sign gallery response: {}", e))
    }

    pub async fn health(&self) -> Result<BackendHealth, String> {
        let url = format!("{}/health", self.base_url);
        debug!("Checking backend health at: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("Health request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("Health request failed with status {}", status));
        }

        response
            .json()
            .await
            .map_err(|e| format!("Failed to parse health response: {}", e))
    }
}

#[async_trait]
impl Predictor for PredictClient {
    async fn predict(&self, chunk: &MediaChunk) -> Result<PredictionResponse, String> {
        let url = format!("{}/predict", self.base_url);
        debug!(
            "Submitting {} byte chunk to: {}",
            chunk.len(),
            url
        );

        let video_part = Part::bytes(chunk.data.clone())
            .file_name(chunk.file_name.clone())
            .mime_str(&chunk.mime_type)
            .map_err(|e| format!("Failed to build multipart video part: {}", e))?;

        let form = Form::new().part("video", video_part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("Prediction request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            let message = serde_json::from_str::<BackendError>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(format!(
                "Prediction failed with status {}: {}",
                status, message
            ));
        }

        let prediction: PredictionResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse prediction response: {}", e))?;

        debug!(
            "Prediction received: '{}' ({:.3})",
            prediction.prediction, prediction.confidence
        );

        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prediction_response() {
        let body = r#"{
            "prediction": "Hello",
            "confidence": 0.91,
            "all_predictions": [
                {"sign": "Hello", "score": 0.91},
                {"sign": "Thanks", "score": 0.05}
            ]
        }"#;

        let parsed: PredictionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.prediction, "Hello");
        assert!((parsed.confidence - 0.91).abs() < 1e-9);
        assert_eq!(parsed.all_predictions.len(), 2);
        assert_eq!(parsed.all_predictions[1].sign, "Thanks");
    }

    #[test]
    fn test_parse_response_without_alternatives() {
        let body = r#"{"prediction": "No Motion", "confidence": 0.0, "message": "No frames processed"}"#;
        let parsed: PredictionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.prediction, "No Motion");
        assert!(parsed.all_predictions.is_empty());
    }

    #[test]
    fn test_parse_backend_error_body() {
        let parsed: BackendError = serde_json::from_str(r#"{"error": "No video file provided"}"#).unwrap();
        assert_eq!(parsed.error, "No video file provided");
    }

    #[test]
    fn test_empty_base_url_rejected() {
        assert!(PredictClient::new("   ", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = PredictClient::new("http://localhost:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000");
    }
}
