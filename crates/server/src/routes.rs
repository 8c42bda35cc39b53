use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, info_span, Instrument, Span};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// JSON body variant of `/extract_text`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractRequest {
    /// Base64 image, optionally as a `data:<mime>;base64,` URL.
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractResponse {
    pub success: bool,
    pub extracted_text: Vec<String>,
    pub total_lines: usize,
}

impl ExtractResponse {
    pub fn new(extracted_text: Vec<String>) -> Self {
        let total_lines = extracted_text.len();
        Self { success: true, extracted_text, total_lines }
    }
}

enum ImageInput {
    Upload { filename: String, data: Vec<u8> },
    Base64(String),
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "scanline" }))
}

/// POST /extract_text
///
/// Accepts either a multipart form with an `image` file field or a JSON body
/// `{"image": "<base64>"}`, and answers with the reading-order lines.
pub async fn extract_text(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<ExtractResponse>, ApiError> {
    let span = info_span!("extract_text", request_id = %Uuid::new_v4());
    async move {
        let input = read_input(&state, request).await?;
        let pipeline = state.pipeline.clone();
        let span = Span::current();

        // Preprocessing and recognition are CPU-bound and blocking.
        let extraction = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            match input {
                ImageInput::Upload { filename, data } => pipeline.process_upload(&data, &filename),
                ImageInput::Base64(payload) => pipeline.process_base64(&payload),
            }
        })
        .await
        .map_err(|e| ApiError::Internal(format!("OCR worker failed: {e}")))??;

        info!(lines = extraction.total_lines(), "text extracted");
        Ok(Json(ExtractResponse::new(extraction.lines)))
    }
    .instrument(span)
    .await
}

async fn read_input(state: &AppState, request: Request) -> Result<ImageInput, ApiError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?
        {
            if field.name() != Some("image") {
                continue;
            }
            let filename = field.file_name().unwrap_or_default().to_string();
            if filename.is_empty() {
                return Err(ApiError::BadRequest("No image file selected".to_string()));
            }
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
            debug!(%filename, bytes = data.len(), "multipart image received");
            return Ok(ImageInput::Upload { filename, data: data.to_vec() });
        }
        Err(ApiError::BadRequest("No image file provided".to_string()))
    } else if content_type.starts_with("application/json") {
        let Json(body) = Json::<ExtractRequest>::from_request(request, state)
            .await
            .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
        match body.image {
            Some(image) if !image.trim().is_empty() => {
                debug!(chars = image.len(), "base64 image received");
                Ok(ImageInput::Base64(image))
            }
            _ => Err(ApiError::BadRequest("No image provided".to_string())),
        }
    } else {
        Err(ApiError::BadRequest("No image file provided".to_string()))
    }
}
