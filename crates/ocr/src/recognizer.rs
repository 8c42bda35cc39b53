use image::RgbImage;
use reqwest::header::CONTENT_TYPE;
use scanline_core::{Detection, RecognizerSettings};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::preprocess::encode_png;

#[derive(Debug, Error)]
pub enum RecognizeError {
    #[error("Recognition engine error: {0}")]
    Engine(String),
    #[error("Failed to encode image for recognition: {0}")]
    Encode(#[from] image::ImageError),
    #[error("Recognition request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Recognition service returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Abstraction over the text-recognition model.
/// Implementations take a normalized RGB image and return every token they
/// found with its bounding polygon, in whatever order the model emits them.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &RgbImage) -> Result<Vec<Detection>, RecognizeError>;
}

impl<T: TextRecognizer + ?Sized> TextRecognizer for Box<T> {
    fn recognize(&self, image: &RgbImage) -> Result<Vec<Detection>, RecognizeError> {
        (**self).recognize(image)
    }
}

impl<T: TextRecognizer + ?Sized> TextRecognizer for std::sync::Arc<T> {
    fn recognize(&self, image: &RgbImage) -> Result<Vec<Detection>, RecognizeError> {
        (**self).recognize(image)
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a preset list of detections regardless of the image.
pub struct MockRecognizer {
    pub detections: Vec<Detection>,
}

impl MockRecognizer {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }
}

impl TextRecognizer for MockRecognizer {
    fn recognize(&self, _image: &RgbImage) -> Result<Vec<Detection>, RecognizeError> {
        Ok(self.detections.clone())
    }
}

// ── HTTP backend ──────────────────────────────────────────────────────────────

/// Sends the normalized image as PNG to a recognition service and expects a
/// JSON array of `{"text": ..., "polygon": [[x, y], ...]}` back.
///
/// Uses the blocking client: call it from a blocking-capable thread, never
/// directly on an async executor.
pub struct HttpRecognizer {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpRecognizer {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, RecognizeError> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint: endpoint.into() })
    }

    pub fn from_settings(settings: &RecognizerSettings) -> Result<Self, RecognizeError> {
        Self::new(settings.endpoint.clone(), Duration::from_secs(settings.timeout_secs))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl TextRecognizer for HttpRecognizer {
    fn recognize(&self, image: &RgbImage) -> Result<Vec<Detection>, RecognizeError> {
        let png = encode_png(image)?;
        debug!(endpoint = %self.endpoint, bytes = png.len(), "sending image to recognizer");

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "image/png")
            .body(png)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(RecognizeError::Status { status: status.as_u16(), body });
        }

        Ok(response.json::<Vec<Detection>>()?)
    }
}
