pub mod config;
pub mod detection;
pub mod line;

pub use config::{
    ConfigError, GroupingStrategy, LayoutSettings, PreprocessSettings, RecognizerSettings,
    ServerSettings, Settings,
};
pub use detection::{Detection, MalformedDetection, Point};
pub use line::Line;
