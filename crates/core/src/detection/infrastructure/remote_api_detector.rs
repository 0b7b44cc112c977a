use std::io::Cursor;

use serde::Deserialize;

use crate::detection::domain::detector::Detector;
use crate::shared::constants::INFERENCE_API_URL;
use crate::shared::detection::{BoundingBox, Detection};
use crate::shared::frame::Frame;

/// Explicit configuration for the hosted inference back end.
///
/// Built by the caller from CLI arguments or environment; the detector
/// reads no ambient state.
#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub api_key: String,
    /// `workspace/project/version` or `project/version`.
    pub model_id: String,
    /// Confidence threshold in `0.0..=1.0`.
    pub confidence: f64,
}

/// Object detection via a Roboflow-style hosted inference API.
///
/// Encodes the frame to JPEG in memory and POSTs it as multipart form
/// data. The response reports center-form boxes, which are converted to
/// corner form here so callers never see the wire shape.
pub struct RemoteApiDetector {
    client: reqwest::blocking::Client,
    config: RemoteConfig,
    endpoint: String,
}

impl RemoteApiDetector {
    pub fn new(config: RemoteConfig) -> Self {
        // Timeout behavior stays with the HTTP client defaults; the
        // dispatcher adds none of its own.
        Self {
            client: reqwest::blocking::Client::new(),
            config,
            endpoint: INFERENCE_API_URL.to_string(),
        }
    }

    /// Points the detector at a self-hosted inference server.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn validate_config(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.config.api_key.is_empty() {
            return Err(
                "API key is not set. Configure ROBOFLOW_API_KEY or pass --api-key.".into(),
            );
        }
        let parts = self.config.model_id.split('/').count();
        if parts != 2 && parts != 3 {
            return Err(format!(
                "Invalid model id format: '{}'. Expected 'workspace/project/version' or 'project/version'",
                self.config.model_id
            )
            .into());
        }
        Ok(())
    }

    fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let img =
            image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
                .ok_or("Frame buffer does not match its dimensions")?;
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)?;
        Ok(buf)
    }
}

impl Detector for RemoteApiDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        self.validate_config()?;

        let jpeg = Self::encode_jpeg(frame)?;
        let part = reqwest::blocking::multipart::Part::bytes(jpeg)
            .file_name("frame.jpg")
            .mime_str("image/jpeg")?;
        let form = reqwest::blocking::multipart::Form::new().part("file", part);

        let url = format!("{}/{}", self.endpoint, self.config.model_id);
        let confidence_pct = (self.config.confidence * 100.0).to_string();

        let response = self
            .client
            .post(&url)
            .query(&[
                ("api_key", self.config.api_key.as_str()),
                ("confidence", confidence_pct.as_str()),
            ])
            .multipart(form)
            .send()
            .map_err(|e| format!("Network error calling inference API: {e}"))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| format!("Network error reading inference response: {e}"))?;

        if !status.is_success() {
            return Err(status_error(status, &self.config.model_id, &body).into());
        }

        parse_predictions(&body)
    }
}

/// Maps HTTP failure statuses to the message vocabulary the error
/// classifier keys on.
fn status_error(status: reqwest::StatusCode, model_id: &str, body: &str) -> String {
    use reqwest::StatusCode;
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            format!("API authentication failed. Check your API key and model id: {body}")
        }
        StatusCode::NOT_FOUND => {
            format!("Model not found. Verify model id '{model_id}' is correct: {body}")
        }
        StatusCode::TOO_MANY_REQUESTS => {
            format!("API credits exhausted or rate limited: {body}")
        }
        _ => format!("API detection error: {status}: {body}"),
    }
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    #[serde(default)]
    predictions: Vec<ApiPrediction>,
}

/// One prediction as reported on the wire: center-form box plus class.
#[derive(Debug, Deserialize)]
struct ApiPrediction {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    confidence: f64,
    class: String,
}

fn parse_predictions(body: &str) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
    let response: PredictionResponse = serde_json::from_str(body)
        .map_err(|e| format!("API detection error: malformed response: {e}"))?;

    Ok(response
        .predictions
        .into_iter()
        .map(|p| {
            Detection::new(
                BoundingBox::from_center(p.x, p.y, p.width, p.height),
                p.confidence,
                p.class,
            )
        })
        .collect())
}
