use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Env var naming a TOML settings file.
pub const CONFIG_ENV: &str = "SCANLINE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// How detections are clustered into lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingStrategy {
    /// Join the first line (in creation order) whose frozen anchor is within
    /// the threshold.
    #[default]
    FirstMatch,
    /// Join the line whose frozen anchor is closest, if within the threshold.
    Nearest,
    /// First match, but the anchor tracks the mean center of its members.
    RunningCentroid,
}

impl std::str::FromStr for GroupingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first_match" => Ok(GroupingStrategy::FirstMatch),
            "nearest" => Ok(GroupingStrategy::Nearest),
            "running_centroid" => Ok(GroupingStrategy::RunningCentroid),
            other => Err(format!("Unknown grouping strategy: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5002,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// Vertical distance (pixels, in the normalized image) below which a
    /// token joins an existing line.
    pub y_threshold: f32,
    pub strategy: GroupingStrategy,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self { y_threshold: 20.0, strategy: GroupingStrategy::FirstMatch }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessSettings {
    pub scale: u32,
    pub clip_limit: f32,
    pub tile_grid: u32,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self { scale: 2, clip_limit: 2.0, tile_grid: 8 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerSettings {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for RecognizerSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5003/recognize".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub layout: LayoutSettings,
    pub preprocess: PreprocessSettings,
    pub recognizer: RecognizerSettings,
    /// Where uploads are materialized while being processed.
    pub scratch_dir: Option<PathBuf>,
}

impl Settings {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// File named by `SCANLINE_CONFIG` (or defaults), then env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Apply `PORT`, `SCANLINE_Y_THRESHOLD`, `SCANLINE_RECOGNIZER_URL` and
    /// `SCANLINE_STRATEGY` from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                message: format!("'{port}' is not a port number"),
            })?;
        }
        if let Some(threshold) = lookup("SCANLINE_Y_THRESHOLD") {
            self.layout.y_threshold =
                threshold.trim().parse().map_err(|_| ConfigError::Invalid {
                    key: "SCANLINE_Y_THRESHOLD",
                    message: format!("'{threshold}' is not a number"),
                })?;
        }
        if let Some(url) = lookup("SCANLINE_RECOGNIZER_URL") {
            self.recognizer.endpoint = url;
        }
        if let Some(strategy) = lookup("SCANLINE_STRATEGY") {
            self.layout.strategy = strategy
                .parse()
                .map_err(|message| ConfigError::Invalid { key: "SCANLINE_STRATEGY", message })?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.layout.y_threshold;
        if !t.is_finite() || t <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "layout.y_threshold",
                message: format!("must be a positive number, got {t}"),
            });
        }
        if self.preprocess.scale == 0 {
            return Err(ConfigError::Invalid {
                key: "preprocess.scale",
                message: "must be at least 1".to_string(),
            });
        }
        if self.preprocess.tile_grid == 0 {
            return Err(ConfigError::Invalid {
                key: "preprocess.tile_grid",
                message: "must be at least 1".to_string(),
            });
        }
        let clip = self.preprocess.clip_limit;
        if !clip.is_finite() || clip <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "preprocess.clip_limit",
                message: format!("must be a positive number, got {clip}"),
            });
        }
        Ok(())
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
