use scanline_core::{MalformedDetection, Settings};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::layout::LineReconstructor;
use crate::payload::{self, PayloadError};
use crate::preprocess::{ImagePreprocessor, ImageSource, PreprocessError};
use crate::recognizer::{RecognizeError, TextRecognizer};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("Invalid image payload: {0}")]
    Payload(#[from] PayloadError),
    #[error("OCR recognition failed: {0}")]
    Recognize(#[from] RecognizeError),
    #[error(transparent)]
    Malformed(#[from] MalformedDetection),
}

/// Coarse failure classes the request boundary maps to responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No image, or the image could not be decoded. The caller's fault.
    InvalidInput,
    /// The recognizer returned a polygon with no corners.
    MalformedDetection,
    /// Anything else that went wrong while processing.
    Processing,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Preprocess(e) if e.is_invalid_input() => ErrorKind::InvalidInput,
            PipelineError::Payload(_) => ErrorKind::InvalidInput,
            PipelineError::Malformed(_) => ErrorKind::MalformedDetection,
            PipelineError::Preprocess(_) | PipelineError::Io(_) | PipelineError::Recognize(_) => {
                ErrorKind::Processing
            }
        }
    }
}

/// Reading-order text for one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    pub lines: Vec<String>,
    /// Tokens the recognizer reported, including ones on dropped blank lines.
    pub detections: usize,
}

impl Extraction {
    pub fn total_lines(&self) -> usize {
        self.lines.len()
    }
}

/// Orchestrates: (materialize upload) → preprocess → recognize → reconstruct.
pub struct ExtractionPipeline<R: TextRecognizer> {
    recognizer: R,
    preprocessor: ImagePreprocessor,
    reconstructor: LineReconstructor,
    scratch_dir: PathBuf,
}

impl<R: TextRecognizer> ExtractionPipeline<R> {
    pub fn new(recognizer: R, scratch_dir: PathBuf) -> Self {
        Self {
            recognizer,
            preprocessor: ImagePreprocessor::default(),
            reconstructor: LineReconstructor::default(),
            scratch_dir,
        }
    }

    pub fn from_settings(recognizer: R, settings: &Settings) -> Self {
        Self {
            recognizer,
            preprocessor: ImagePreprocessor::from_settings(&settings.preprocess),
            reconstructor: LineReconstructor::from_settings(&settings.layout),
            scratch_dir: settings.scratch_dir(),
        }
    }

    pub fn with_preprocessor(mut self, preprocessor: ImagePreprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub fn with_reconstructor(mut self, reconstructor: LineReconstructor) -> Self {
        self.reconstructor = reconstructor;
        self
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Run the full pipeline on one image.
    pub fn process(&self, source: ImageSource) -> Result<Extraction, PipelineError> {
        // 1. Normalize for the recognizer.
        let image = self.preprocessor.prepare(source)?;
        debug!(width = image.width(), height = image.height(), "image normalized");

        // 2. Recognize tokens.
        let detections = self.recognizer.recognize(&image)?;
        let count = detections.len();

        // 3. Rebuild reading order.
        let lines = self.reconstructor.reconstruct(detections)?;
        info!(detections = count, lines = lines.len(), "extraction complete");

        Ok(Extraction { lines, detections: count })
    }

    pub fn process_file(&self, path: &Path) -> Result<Extraction, PipelineError> {
        self.process(ImageSource::Path(path.to_path_buf()))
    }

    /// Process encoded image bytes held in memory.
    pub fn process_bytes(&self, data: &[u8]) -> Result<Extraction, PipelineError> {
        self.process(ImageSource::Bytes(data.to_vec()))
    }

    /// Process a base64 payload, with or without a `data:` URL prefix.
    pub fn process_base64(&self, payload: &str) -> Result<Extraction, PipelineError> {
        let data = payload::decode_base64_image(payload)?;
        self.process(ImageSource::Bytes(data))
    }

    /// Write an uploaded file into the scratch directory and process it from
    /// there. The temporary file is removed on every exit path.
    pub fn process_upload(&self, data: &[u8], filename: &str) -> Result<Extraction, PipelineError> {
        let suffix = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
            .unwrap_or_default();

        let mut temp = tempfile::Builder::new()
            .prefix("scanline-")
            .suffix(&suffix)
            .tempfile_in(&self.scratch_dir)?;
        temp.write_all(data)?;
        temp.flush()?;
        debug!(path = %temp.path().display(), bytes = data.len(), "upload materialized");

        let result = self.process_file(temp.path());
        if let Err(e) = &result {
            warn!(filename, "upload processing failed: {e}");
        }
        // `temp` drops here, deleting the file.
        result
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
