use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default probability cutoff above which a category counts as a match.
pub const DEFAULT_THRESHOLD: f32 = 0.9;
/// Default idle time after the last edit before a prediction is requested.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(300);
/// Default token budget for ONNX classifiers; longer inputs are truncated.
pub const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 512;

const MODEL_DIR_ENV: &str = "TOXISCOPE_MODEL_DIR";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Threshold must be strictly between 0 and 1, got {0}")]
    InvalidThreshold(f32),
    #[error("Max sequence length must be greater than zero")]
    InvalidSequenceLength,
}

/// Settings for the debounced predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorConfig {
    pub threshold: f32,
    pub delay: Duration,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            delay: DEFAULT_DELAY,
        }
    }
}

impl PredictorConfig {
    /// Sets the match threshold.
    ///
    /// # Example
    /// ```
    /// use toxiscope::PredictorConfig;
    ///
    /// let config = PredictorConfig::default().with_threshold(0.8).unwrap();
    /// assert_eq!(config.threshold, 0.8);
    /// assert!(PredictorConfig::default().with_threshold(1.0).is_err());
    /// ```
    pub fn with_threshold(mut self, threshold: f32) -> Result<Self, ConfigError> {
        validate_threshold(threshold)?;
        self.threshold = threshold;
        Ok(self)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Checks a config that was built or deserialized without the setters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_threshold(self.threshold)
    }
}

fn validate_threshold(threshold: f32) -> Result<(), ConfigError> {
    // Rejects NaN too
    if threshold > 0.0 && threshold < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold(threshold))
    }
}

/// Location and limits of an ONNX toxicity model on disk.
///
/// The directory must contain `model.onnx` and `tokenizer.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnnxModelConfig {
    pub model_dir: PathBuf,
    pub max_sequence_length: usize,
}

impl Default for OnnxModelConfig {
    fn default() -> Self {
        Self::new(Self::default_model_dir())
    }
}

impl OnnxModelConfig {
    pub fn new(model_dir: impl AsRef<Path>) -> Self {
        Self {
            model_dir: model_dir.as_ref().to_path_buf(),
            max_sequence_length: DEFAULT_MAX_SEQUENCE_LENGTH,
        }
    }

    pub fn with_max_sequence_length(mut self, max_sequence_length: usize) -> Result<Self, ConfigError> {
        if max_sequence_length == 0 {
            return Err(ConfigError::InvalidSequenceLength);
        }
        self.max_sequence_length = max_sequence_length;
        Ok(self)
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join("model.onnx")
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.model_dir.join("tokenizer.json")
    }

    /// Returns the default model directory path
    pub fn default_model_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var(MODEL_DIR_ENV) {
            return PathBuf::from(path);
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("toxiscope").join("model");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("toxiscope").join("model");
        }

        env::temp_dir().join("toxiscope").join("model")
    }
}
