//! The classifier seam: raw per-label scores, the async classification traits,
//! and the lazily constructed handle shared by every request of a session.

mod error;
mod lazy;
pub mod onnx;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

pub use error::ClassifierError;
pub use lazy::LazyClassifier;
pub use onnx::{OnnxLoader, OnnxToxicityClassifier};

/// The toxicity categories scored for every input, in display order.
pub const TOXICITY_LABELS: [&str; 7] = [
    "identity_attack",
    "insult",
    "threat",
    "sexual_explicit",
    "toxicity",
    "severe_toxicity",
    "obscene",
];

/// Score of one category for one input of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelScore {
    /// `Some(true)` when P(positive) exceeds the threshold, `Some(false)` when
    /// P(negative) does, `None` when neither side is confident enough.
    pub matched: Option<bool>,
    /// `[P(negative), P(positive)]`
    pub probabilities: [f32; 2],
}

impl LabelScore {
    /// Applies `threshold` to a positive-class probability.
    pub fn from_positive(probability: f32, threshold: f32) -> Self {
        let probabilities = [1.0 - probability, probability];
        let matched = if probabilities[1] > threshold {
            Some(true)
        } else if probabilities[0] > threshold {
            Some(false)
        } else {
            None
        };
        Self { matched, probabilities }
    }
}

/// Raw classifier output for one category: one score per input of the batch,
/// in batch order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelPrediction {
    pub label: String,
    pub results: Vec<LabelScore>,
}

/// A constructed toxicity classifier.
///
/// Implementations are treated as stateless by callers: a single instance is
/// shared across all requests and may be invoked while a previous call is
/// still in flight.
#[async_trait]
pub trait ToxicityClassifier: Send + Sync {
    /// Scores every text of `batch` against every configured category.
    async fn classify(&self, batch: &[String]) -> Result<Vec<LabelPrediction>, ClassifierError>;
}

/// Constructs a classifier for a threshold and an ordered list of categories.
#[async_trait]
pub trait ClassifierLoader: Send + Sync {
    async fn load(
        &self,
        threshold: f32,
        labels: &[&str],
    ) -> Result<Arc<dyn ToxicityClassifier>, ClassifierError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_rule() {
        let score = LabelScore::from_positive(0.98, 0.9);
        assert_eq!(score.matched, Some(true));

        let score = LabelScore::from_positive(0.01, 0.9);
        assert_eq!(score.matched, Some(false));

        // Neither side clears the threshold
        let score = LabelScore::from_positive(0.5, 0.9);
        assert_eq!(score.matched, None);
        assert_eq!(score.probabilities, [0.5, 0.5]);
    }

    #[test]
    fn test_label_order() {
        assert_eq!(TOXICITY_LABELS.len(), 7);
        assert_eq!(TOXICITY_LABELS[0], "identity_attack");
        assert_eq!(TOXICITY_LABELS[6], "obscene");
    }
}
