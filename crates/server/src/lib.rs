pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use routes::{ExtractRequest, ExtractResponse};
pub use state::{AppState, SharedPipeline};

/// Body size is capped by `DefaultBodyLimit`, so oversized uploads surface
/// as extractor rejections and get the JSON error body.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/extract_text", post(routes::extract_text))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
