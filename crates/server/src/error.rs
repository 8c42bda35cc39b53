use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use scanline_ocr::{ErrorKind, PipelineError};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, empty or undecodable image input.
    #[error("{0}")]
    BadRequest(String),
    #[error("Image upload too large: {0}")]
    PayloadTooLarge(String),
    #[error("OCR processing failed: {0}")]
    Processing(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Map an extractor rejection, keeping 413 for bodies over the limit.
    pub fn rejected(status: StatusCode, message: String) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(message)
        } else {
            ApiError::BadRequest(message)
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Processing(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e.kind() {
            ErrorKind::InvalidInput => ApiError::BadRequest(e.to_string()),
            ErrorKind::MalformedDetection | ErrorKind::Processing => {
                ApiError::Processing(e.to_string())
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(status = status.as_u16(), "request failed: {self}");
        let body = ErrorBody { success: false, error: self.to_string() };
        (status, Json(body)).into_response()
    }
}
