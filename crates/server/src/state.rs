use scanline_ocr::{ExtractionPipeline, TextRecognizer};
use std::sync::Arc;

pub type SharedPipeline = Arc<ExtractionPipeline<Box<dyn TextRecognizer>>>;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: SharedPipeline,
}

impl AppState {
    pub fn new(pipeline: SharedPipeline) -> Self {
        Self { pipeline }
    }
}
