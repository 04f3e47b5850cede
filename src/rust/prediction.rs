//! Maps raw classifier output into display-ready results.

use std::sync::Arc;

use serde::Serialize;

use crate::classifier::{ClassifierError, LabelPrediction};

/// A complete, ordered result set, one entry per configured category.
/// Replaced wholesale on every accepted classification.
pub type Predictions = Arc<[LabelResult]>;

/// The display record of one toxicity category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelResult {
    pub label: String,
    /// Whether the positive-class probability crossed the threshold.
    #[serde(rename = "match")]
    pub matched: bool,
    /// `[P(negative), P(positive)]`
    pub probabilities: [f32; 2],
    /// `probabilities[1]` as a percentage with two decimals, e.g. `"87.30%"`.
    pub probability: String,
}

impl LabelResult {
    /// Builds the display record from the first (and only) input of a batch.
    pub fn from_prediction(prediction: &LabelPrediction) -> Result<Self, ClassifierError> {
        let score = prediction.results.first().ok_or_else(|| {
            ClassifierError::PredictionError(format!("No score returned for label '{}'", prediction.label))
        })?;

        Ok(Self {
            label: prediction.label.clone(),
            matched: score.matched == Some(true),
            probabilities: score.probabilities,
            probability: format_probability(score.probabilities[1]),
        })
    }
}

/// Formats a probability in `[0, 1]` as a percentage with two decimals.
///
/// ```
/// assert_eq!(toxiscope::format_probability(0.873), "87.30%");
/// ```
pub fn format_probability(probability: f32) -> String {
    format!("{:.2}%", f64::from(probability) * 100.0)
}

/// Converts a raw classifier response into a complete prediction set ordered
/// like `labels`.
///
/// Fails unless the response covers every label exactly once, so a published
/// set is never partial.
pub fn to_predictions(raw: &[LabelPrediction], labels: &[&str]) -> Result<Predictions, ClassifierError> {
    if raw.len() != labels.len() {
        return Err(ClassifierError::PredictionError(format!(
            "Expected {} labels, classifier returned {}",
            labels.len(),
            raw.len()
        )));
    }

    labels
        .iter()
        .map(|label| {
            let prediction = raw
                .iter()
                .find(|prediction| prediction.label == *label)
                .ok_or_else(|| ClassifierError::PredictionError(format!("Missing label '{}'", label)))?;
            LabelResult::from_prediction(prediction)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{LabelScore, TOXICITY_LABELS};

    fn raw(label: &str, matched: Option<bool>, probabilities: [f32; 2]) -> LabelPrediction {
        LabelPrediction {
            label: label.to_string(),
            results: vec![LabelScore { matched, probabilities }],
        }
    }

    #[test]
    fn test_probability_format() {
        assert_eq!(format_probability(0.873), "87.30%");
        assert_eq!(format_probability(0.98), "98.00%");
        assert_eq!(format_probability(0.0), "0.00%");
        assert_eq!(format_probability(1.0), "100.00%");
    }

    #[test]
    fn test_label_result_from_prediction() {
        let result = LabelResult::from_prediction(&raw("insult", Some(true), [0.02, 0.98])).unwrap();
        assert_eq!(result.label, "insult");
        assert!(result.matched);
        assert_eq!(result.probabilities, [0.02, 0.98]);
        assert_eq!(result.probability, "98.00%");

        let result = LabelResult::from_prediction(&raw("threat", Some(false), [0.1, 0.873])).unwrap();
        assert!(!result.matched);
        assert_eq!(result.probability, "87.30%");
    }

    #[test]
    fn test_undecided_score_is_not_a_match() {
        let result = LabelResult::from_prediction(&raw("toxicity", None, [0.4, 0.6])).unwrap();
        assert!(!result.matched);
    }

    #[test]
    fn test_empty_results_rejected() {
        let prediction = LabelPrediction {
            label: "obscene".into(),
            results: Vec::new(),
        };
        assert!(LabelResult::from_prediction(&prediction).is_err());
    }

    #[test]
    fn test_predictions_follow_configured_order() {
        // Classifier answers in reverse order
        let response: Vec<_> = TOXICITY_LABELS
            .iter()
            .rev()
            .map(|label| raw(label, Some(false), [0.9, 0.1]))
            .collect();

        let predictions = to_predictions(&response, &TOXICITY_LABELS).unwrap();
        assert_eq!(predictions.len(), TOXICITY_LABELS.len());
        let labels: Vec<&str> = predictions.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, TOXICITY_LABELS);
    }

    #[test]
    fn test_partial_response_rejected() {
        let mut response: Vec<_> = TOXICITY_LABELS
            .iter()
            .map(|label| raw(label, Some(false), [0.9, 0.1]))
            .collect();
        response.pop();
        assert!(to_predictions(&response, &TOXICITY_LABELS).is_err());

        // Right count, wrong label
        response.push(raw("spam", Some(false), [0.9, 0.1]));
        assert!(to_predictions(&response, &TOXICITY_LABELS).is_err());
    }

    #[test]
    fn test_serializes_match_field() {
        let result = LabelResult::from_prediction(&raw("insult", Some(true), [0.02, 0.98])).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["match"], serde_json::json!(true));
        assert_eq!(json["probability"], serde_json::json!("98.00%"));
    }
}
