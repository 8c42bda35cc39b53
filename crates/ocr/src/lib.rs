pub mod clahe;
pub mod layout;
pub mod payload;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;

pub use clahe::Clahe;
pub use layout::{
    grouper_for, Cluster, FirstMatch, LineGrouper, LineReconstructor, NearestAnchor,
    RunningCentroid, DEFAULT_Y_THRESHOLD,
};
pub use payload::{decode_base64_image, PayloadError};
pub use pipeline::{ErrorKind, Extraction, ExtractionPipeline, PipelineError};
pub use preprocess::{encode_png, ImagePreprocessor, ImageSource, PreprocessError};
pub use recognizer::{HttpRecognizer, MockRecognizer, RecognizeError, TextRecognizer};
