//! The debounced prediction pipeline.
//!
//! Every edit re-arms a timer; when the timer expires the current text is sent
//! to the shared classifier and the mapped result is published on a watch
//! channel. Requests carry a generation number so a slow, older response can
//! never replace the result of a newer request.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, error, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::classifier::{LazyClassifier, TOXICITY_LABELS};
use crate::config::PredictorConfig;
use crate::prediction::{to_predictions, Predictions};
use crate::view::Panel;

/// Re-scores the current text after the user stops typing.
///
/// Must be driven from inside a Tokio runtime: edits spawn the timer task and
/// each issued request runs on its own task.
///
/// ```no_run
/// # async fn demo(classifier: std::sync::Arc<toxiscope::LazyClassifier>) {
/// use toxiscope::{DebouncedPredictor, PredictorConfig};
///
/// let mut predictor = DebouncedPredictor::new(classifier, PredictorConfig::default());
/// let mut updates = predictor.subscribe();
///
/// predictor.set_text("I hate you");
/// updates.changed().await.unwrap();
/// println!("{}", predictor.panel());
/// # }
/// ```
pub struct DebouncedPredictor {
    config: PredictorConfig,
    text: String,
    shared: Arc<Shared>,
    pending: Option<ScheduledPrediction>,
}

/// State reachable from the timer and request tasks.
struct Shared {
    classifier: Arc<LazyClassifier>,
    threshold: f32,
    issued: AtomicU64,
    predictions: watch::Sender<Option<Predictions>>,
    /// Task of the most recently issued request; older ones run detached.
    latest_request: Mutex<Option<JoinHandle<()>>>,
}

/// An armed timer. Whoever clears `armed` first (the timer, `flush`, or a
/// cancellation) decides whether the request is issued.
struct ScheduledPrediction {
    timer: JoinHandle<()>,
    armed: Arc<AtomicBool>,
    text: String,
}

impl DebouncedPredictor {
    pub fn new(classifier: Arc<LazyClassifier>, config: PredictorConfig) -> Self {
        let (predictions, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                classifier,
                threshold: config.threshold,
                issued: AtomicU64::new(0),
                predictions,
                latest_request: Mutex::new(None),
            }),
            config,
            text: String::new(),
            pending: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn delay(&self) -> Duration {
        self.config.delay
    }

    /// Replaces the current text. A changed value cancels any pending
    /// prediction and schedules a new one `delay` from now; an unchanged value
    /// is a no-op.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text == self.text {
            return;
        }
        self.text = text;
        self.schedule();
    }

    /// Changes the debounce delay and re-arms the timer with it.
    pub fn set_delay(&mut self, delay: Duration) {
        if delay == self.config.delay {
            return;
        }
        self.config.delay = delay;
        self.schedule();
    }

    /// Latest published prediction set, if any.
    ///
    /// Clearing the text does not clear this; the panel hides it instead.
    pub fn predictions(&self) -> Option<Predictions> {
        self.shared.predictions.borrow().clone()
    }

    /// Receiver notified every time a new prediction set is published.
    pub fn subscribe(&self) -> watch::Receiver<Option<Predictions>> {
        self.shared.predictions.subscribe()
    }

    /// The panel for the current text and prediction set.
    pub fn panel(&self) -> Panel {
        let predictions = self.predictions();
        Panel::render(&self.text, predictions.as_deref())
    }

    /// Number of classification requests issued so far.
    pub fn requests_issued(&self) -> u64 {
        self.shared.issued.load(Ordering::SeqCst)
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|scheduled| scheduled.armed.load(Ordering::SeqCst))
    }

    /// Fires the pending prediction now instead of waiting for the delay.
    ///
    /// Returns `false` when nothing was pending, the timer already fired, or
    /// the pending text is empty.
    pub fn flush(&mut self) -> bool {
        let Some(scheduled) = self.pending.take() else {
            return false;
        };
        scheduled.timer.abort();
        if !scheduled.armed.swap(false, Ordering::SeqCst) {
            return false;
        }
        debug!("Flushing pending prediction");
        self.shared.fire(scheduled.text)
    }

    /// Flushes any pending prediction, then waits for the latest issued
    /// request to finish, whether it was issued by the flush or by a timer
    /// that fired earlier.
    pub async fn wait_idle(&mut self) {
        self.flush();
        let request = self.shared.take_latest_request();
        if let Some(request) = request {
            if let Err(e) = request.await {
                warn!("Prediction task ended abnormally: {}", e);
            }
        }
    }

    fn schedule(&mut self) {
        self.cancel_pending();

        let armed = Arc::new(AtomicBool::new(true));
        let text = self.text.clone();
        let delay = self.config.delay;
        debug!("Scheduling prediction in {:?} ({} chars)", delay, text.chars().count());

        let timer = {
            let armed = Arc::clone(&armed);
            let shared = Arc::clone(&self.shared);
            let text = text.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if armed.swap(false, Ordering::SeqCst) {
                    shared.fire(text);
                }
            })
        };

        self.pending = Some(ScheduledPrediction { timer, armed, text });
    }

    fn cancel_pending(&mut self) {
        if let Some(scheduled) = self.pending.take() {
            if scheduled.armed.swap(false, Ordering::SeqCst) {
                debug!("Cancelled pending prediction");
            }
            scheduled.timer.abort();
        }
    }
}

impl Drop for DebouncedPredictor {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

impl std::fmt::Debug for DebouncedPredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebouncedPredictor")
            .field("config", &self.config)
            .field("text", &self.text)
            .field("pending", &self.is_pending())
            .field("requests_issued", &self.requests_issued())
            .finish()
    }
}

impl Shared {
    /// Issues a request for `text` on its own task. Empty text issues nothing.
    fn fire(self: &Arc<Self>, text: String) -> bool {
        if text.is_empty() {
            debug!("Text is empty, skipping prediction");
            return false;
        }

        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Issuing prediction request #{}", generation);
        let shared = Arc::clone(self);
        let request = tokio::spawn(async move { shared.request(generation, text).await });
        // Replacing the handle detaches the previous request; it keeps running
        *self.latest_request.lock().unwrap_or_else(PoisonError::into_inner) = Some(request);
        true
    }

    fn take_latest_request(&self) -> Option<JoinHandle<()>> {
        self.latest_request.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    async fn request(&self, generation: u64, text: String) {
        let classifier = match self.classifier.get_or_load(self.threshold, &TOXICITY_LABELS).await {
            Ok(classifier) => classifier,
            Err(e) => {
                error!("Failed to load toxicity classifier: {}", e);
                return;
            }
        };

        let batch = [text];
        let predictions = match classifier
            .classify(&batch)
            .await
            .and_then(|raw| to_predictions(&raw, &TOXICITY_LABELS))
        {
            Ok(predictions) => predictions,
            Err(e) => {
                warn!("Prediction request #{} failed: {}", generation, e);
                return;
            }
        };

        self.publish(generation, predictions);
    }

    /// Publishes `predictions` if `generation` is still the latest request.
    fn publish(&self, generation: u64, predictions: Predictions) -> bool {
        self.predictions.send_if_modified(|slot| {
            let latest = self.issued.load(Ordering::SeqCst);
            if generation != latest {
                debug!("Discarding stale response #{} (latest is #{})", generation, latest);
                return false;
            }
            *slot = Some(predictions);
            true
        })
    }
}
