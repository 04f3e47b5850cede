//! As-you-type toxicity scoring: a debounced prediction pipeline in front of a
//! pretrained multi-label toxicity classifier.
//!
//! # Basic Usage
//!
//! ```no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use toxiscope::{DebouncedPredictor, LazyClassifier, OnnxLoader, OnnxModelConfig, PredictorConfig, RuntimeConfig};
//!
//! let loader = OnnxLoader::new(OnnxModelConfig::default(), RuntimeConfig::default());
//! let classifier = Arc::new(LazyClassifier::new(loader));
//!
//! let mut predictor = DebouncedPredictor::new(classifier, PredictorConfig::default());
//! let mut updates = predictor.subscribe();
//!
//! predictor.set_text("I hate you");
//! updates.changed().await?;
//! println!("{}", predictor.panel());
//! # Ok(())
//! # }
//! ```
//!
//! The classifier is loaded on the first prediction and shared by every
//! request after that. Any type implementing [`ClassifierLoader`] and
//! [`ToxicityClassifier`] can stand in for the ONNX backend.

pub mod classifier;
pub mod config;
pub mod prediction;
pub mod predictor;
mod runtime;
pub mod view;

pub use classifier::{
    ClassifierError, ClassifierLoader, LabelPrediction, LabelScore, LazyClassifier, OnnxLoader,
    OnnxToxicityClassifier, ToxicityClassifier, TOXICITY_LABELS,
};
pub use config::{ConfigError, OnnxModelConfig, PredictorConfig};
pub use prediction::{format_probability, to_predictions, LabelResult, Predictions};
pub use predictor::DebouncedPredictor;
pub use runtime::{create_session_builder, RuntimeConfig};
pub use view::Panel;

pub fn init_logger() {
    env_logger::init();
}
