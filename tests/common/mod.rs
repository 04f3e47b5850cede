#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use toxiscope::{
    ClassifierError, ClassifierLoader, LabelPrediction, LabelScore, ToxicityClassifier,
};

/// Scripted classifier shared between a loader and the test body.
#[derive(Default)]
pub struct MockState {
    /// Every batch passed to `classify`, in call order.
    pub calls: Mutex<Vec<Vec<String>>>,
    /// `(threshold, labels)` for every load attempt.
    pub loads: Mutex<Vec<(f32, Vec<String>)>>,
    pub completed: Mutex<usize>,
    failing_loads: Mutex<usize>,
    latency: Mutex<HashMap<String, Duration>>,
    failing: Mutex<HashSet<String>>,
    scores: Mutex<HashMap<(String, String), (Option<bool>, [f32; 2])>>,
    omitted: Mutex<Option<String>>,
}

impl MockState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn loader(self: &Arc<Self>) -> MockLoader {
        MockLoader(Arc::clone(self))
    }

    pub fn texts(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().flatten().cloned().collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn completed(&self) -> usize {
        *self.completed.lock().unwrap()
    }

    pub fn fail_next_loads(&self, count: usize) {
        *self.failing_loads.lock().unwrap() = count;
    }

    pub fn set_latency(&self, text: &str, latency: Duration) {
        self.latency.lock().unwrap().insert(text.to_string(), latency);
    }

    pub fn fail_on(&self, text: &str) {
        self.failing.lock().unwrap().insert(text.to_string());
    }

    pub fn succeed_on(&self, text: &str) {
        self.failing.lock().unwrap().remove(text);
    }

    pub fn set_score(&self, text: &str, label: &str, matched: Option<bool>, probabilities: [f32; 2]) {
        self.scores
            .lock()
            .unwrap()
            .insert((text.to_string(), label.to_string()), (matched, probabilities));
    }

    pub fn omit_label(&self, label: &str) {
        *self.omitted.lock().unwrap() = Some(label.to_string());
    }

    fn score(&self, text: &str, label: &str) -> LabelScore {
        let scripted = self
            .scores
            .lock()
            .unwrap()
            .get(&(text.to_string(), label.to_string()))
            .copied();
        match scripted {
            Some((matched, probabilities)) => LabelScore { matched, probabilities },
            None => LabelScore {
                matched: Some(false),
                probabilities: [0.97, 0.03],
            },
        }
    }
}

pub struct MockLoader(Arc<MockState>);

#[async_trait]
impl ClassifierLoader for MockLoader {
    async fn load(
        &self,
        threshold: f32,
        labels: &[&str],
    ) -> Result<Arc<dyn ToxicityClassifier>, ClassifierError> {
        let labels: Vec<String> = labels.iter().map(|label| label.to_string()).collect();
        self.0.loads.lock().unwrap().push((threshold, labels.clone()));
        {
            let mut failing = self.0.failing_loads.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(ClassifierError::LoadError("model unavailable".into()));
            }
        }
        Ok(Arc::new(MockClassifier {
            state: Arc::clone(&self.0),
            labels,
        }))
    }
}

struct MockClassifier {
    state: Arc<MockState>,
    labels: Vec<String>,
}

#[async_trait]
impl ToxicityClassifier for MockClassifier {
    async fn classify(&self, batch: &[String]) -> Result<Vec<LabelPrediction>, ClassifierError> {
        self.state.calls.lock().unwrap().push(batch.to_vec());

        let latency = batch
            .iter()
            .filter_map(|text| self.state.latency.lock().unwrap().get(text).copied())
            .max()
            .unwrap_or(Duration::from_millis(5));
        tokio::time::sleep(latency).await;
        *self.state.completed.lock().unwrap() += 1;

        if batch.iter().any(|text| self.state.failing.lock().unwrap().contains(text)) {
            return Err(ClassifierError::PredictionError("inference failed".into()));
        }

        let omitted = self.state.omitted.lock().unwrap().clone();
        Ok(self
            .labels
            .iter()
            .filter(|label| Some(*label) != omitted.as_ref())
            .map(|label| LabelPrediction {
                label: label.clone(),
                results: batch.iter().map(|text| self.state.score(text, label)).collect(),
            })
            .collect())
    }
}
