use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info};
use ndarray::Array2;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Tokenizer, TruncationParams};

use super::{ClassifierError, ClassifierLoader, LabelPrediction, LabelScore, ToxicityClassifier};
use crate::config::OnnxModelConfig;
use crate::runtime::{create_session_builder, RuntimeConfig};

/// A multi-label toxicity classifier backed by an ONNX sequence classification model.
///
/// # Model Format
/// - Inputs: `input_ids` and `attention_mask`, plus `token_type_ids` for BERT-style
///   exports, all `[batch_size=1, sequence_length]`
/// - Output: logits `[batch_size=1, num_labels]`, one column per configured label in order
///
/// Each logit is passed through a sigmoid to get P(positive) for that label.
#[derive(Debug, Clone)]
pub struct OnnxToxicityClassifier {
    tokenizer: Arc<Tokenizer>,
    session: Arc<Session>,
    labels: Arc<[String]>,
    threshold: f32,
    feeds_token_type_ids: bool,
}

const INPUT_IDS: &str = "input_ids";
const ATTENTION_MASK: &str = "attention_mask";
const TOKEN_TYPE_IDS: &str = "token_type_ids";

impl OnnxToxicityClassifier {
    /// Loads the model and tokenizer from `model`. Blocks while ONNX Runtime
    /// reads the model file.
    pub fn load(
        model: &OnnxModelConfig,
        runtime: &RuntimeConfig,
        threshold: f32,
        labels: &[&str],
    ) -> Result<Self, ClassifierError> {
        if labels.is_empty() {
            return Err(ClassifierError::ValidationError("At least one label is required".into()));
        }

        let model_path = model.model_path();
        let tokenizer_path = model.tokenizer_path();
        if !model_path.exists() {
            return Err(ClassifierError::LoadError(format!("Model file not found: {:?}", model_path)));
        }
        if !tokenizer_path.exists() {
            return Err(ClassifierError::LoadError(format!("Tokenizer file not found: {:?}", tokenizer_path)));
        }

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            error!("Failed to load tokenizer: {}", e);
            ClassifierError::LoadError(format!("Failed to load tokenizer: {}", e))
        })?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: model.max_sequence_length,
                ..Default::default()
            }))
            .map_err(|e| ClassifierError::TokenizerError(e.to_string()))?;
        info!("Tokenizer loaded from {:?}", tokenizer_path);

        let session = create_session_builder(runtime)?.commit_from_file(&model_path)?;
        let feeds_token_type_ids = Self::validate_model(&session)?;
        info!("Model loaded from {:?}", model_path);

        Ok(Self {
            tokenizer: Arc::new(tokenizer),
            session: Arc::new(session),
            labels: labels.iter().map(|label| label.to_string()).collect(),
            threshold,
            feeds_token_type_ids,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Returns whether the model also takes `token_type_ids`.
    fn validate_model(session: &Session) -> Result<bool, ClassifierError> {
        let names: Vec<&str> = session.inputs.iter().map(|input| input.name.as_str()).collect();
        let feeds_token_type_ids = check_input_names(&names)?;
        if session.outputs.is_empty() {
            return Err(ClassifierError::ModelError("Model must have at least 1 output for logits".into()));
        }
        Ok(feeds_token_type_ids)
    }

    /// Runs the model on a single text and returns one logit per label.
    fn logits(&self, text: &str) -> Result<Vec<f32>, ClassifierError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ClassifierError::TokenizerError(e.to_string()))?;
        let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| i64::from(id)).collect();
        let mask: Vec<i64> = encoding.get_attention_mask().iter().map(|&m| i64::from(m)).collect();
        let type_ids: Vec<i64> = encoding.get_type_ids().iter().map(|&t| i64::from(t)).collect();
        let sequence_length = ids.len();
        debug!("Scoring {} tokens", sequence_length);

        let input_ids = Array2::from_shape_vec((1, sequence_length), ids)
            .map_err(|e| ClassifierError::ModelError(format!("Failed to create input array: {}", e)))?;
        let attention_mask = Array2::from_shape_vec((1, sequence_length), mask)
            .map_err(|e| ClassifierError::ModelError(format!("Failed to create mask array: {}", e)))?;

        let mut input_tensors = HashMap::new();
        input_tensors.insert(
            INPUT_IDS,
            Tensor::from_array(input_ids)
                .map_err(|e| ClassifierError::ModelError(format!("Failed to create input tensor: {}", e)))?,
        );
        input_tensors.insert(
            ATTENTION_MASK,
            Tensor::from_array(attention_mask)
                .map_err(|e| ClassifierError::ModelError(format!("Failed to create mask tensor: {}", e)))?,
        );
        if self.feeds_token_type_ids {
            let token_type_ids = Array2::from_shape_vec((1, sequence_length), type_ids)
                .map_err(|e| ClassifierError::ModelError(format!("Failed to create type id array: {}", e)))?;
            input_tensors.insert(
                TOKEN_TYPE_IDS,
                Tensor::from_array(token_type_ids)
                    .map_err(|e| ClassifierError::ModelError(format!("Failed to create type id tensor: {}", e)))?,
            );
        }

        let outputs = self
            .session
            .run(input_tensors)
            .map_err(|e| ClassifierError::ModelError(format!("Failed to run model: {}", e)))?;
        let logits = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::ModelError(format!("Failed to extract output tensor: {}", e)))?;

        let shape = logits.shape();
        if shape.len() != 2 || shape[1] != self.labels.len() {
            return Err(ClassifierError::PredictionError(format!(
                "Expected logits of shape [1, {}], got {:?}",
                self.labels.len(),
                shape
            )));
        }
        Ok(logits.iter().copied().collect())
    }

    /// Scores a whole batch synchronously.
    pub fn classify_blocking(&self, batch: &[String]) -> Result<Vec<LabelPrediction>, ClassifierError> {
        let mut predictions: Vec<LabelPrediction> = self
            .labels
            .iter()
            .map(|label| LabelPrediction {
                label: label.clone(),
                results: Vec::with_capacity(batch.len()),
            })
            .collect();

        for text in batch {
            let logits = self.logits(text)?;
            for (prediction, logit) in predictions.iter_mut().zip(logits) {
                prediction.results.push(LabelScore::from_positive(sigmoid(logit), self.threshold));
            }
        }

        Ok(predictions)
    }
}

#[async_trait]
impl ToxicityClassifier for OnnxToxicityClassifier {
    async fn classify(&self, batch: &[String]) -> Result<Vec<LabelPrediction>, ClassifierError> {
        let classifier = self.clone();
        let batch = batch.to_vec();
        tokio::task::spawn_blocking(move || classifier.classify_blocking(&batch))
            .await
            .map_err(|e| ClassifierError::PredictionError(format!("Inference task failed: {}", e)))?
    }
}

/// Loads an [`OnnxToxicityClassifier`] from a model directory off the async runtime.
#[derive(Debug, Clone)]
pub struct OnnxLoader {
    model: OnnxModelConfig,
    runtime: RuntimeConfig,
}

impl OnnxLoader {
    pub fn new(model: OnnxModelConfig, runtime: RuntimeConfig) -> Self {
        Self { model, runtime }
    }
}

#[async_trait]
impl ClassifierLoader for OnnxLoader {
    async fn load(
        &self,
        threshold: f32,
        labels: &[&str],
    ) -> Result<Arc<dyn ToxicityClassifier>, ClassifierError> {
        let model = self.model.clone();
        let runtime = self.runtime.clone();
        let labels: Vec<String> = labels.iter().map(|label| label.to_string()).collect();

        let classifier = tokio::task::spawn_blocking(move || {
            let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
            OnnxToxicityClassifier::load(&model, &runtime, threshold, &labels)
        })
        .await
        .map_err(|e| ClassifierError::LoadError(format!("Loader task failed: {}", e)))??;

        Ok(Arc::new(classifier))
    }
}

/// Checks that every declared model input is one `logits` can feed. Returns
/// whether `token_type_ids` is among them.
fn check_input_names(names: &[&str]) -> Result<bool, ClassifierError> {
    for required in [INPUT_IDS, ATTENTION_MASK] {
        if !names.contains(&required) {
            return Err(ClassifierError::ModelError(format!(
                "Model is missing the '{}' input (found {:?})",
                required, names
            )));
        }
    }
    if let Some(unknown) = names
        .iter()
        .find(|name| ![INPUT_IDS, ATTENTION_MASK, TOKEN_TYPE_IDS].contains(*name))
    {
        return Err(ClassifierError::ModelError(format!("Model input '{}' is not supported", unknown)));
    }
    Ok(names.contains(&TOKEN_TYPE_IDS))
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
