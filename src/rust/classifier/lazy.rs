use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::info;
use tokio::sync::OnceCell;

use super::{ClassifierError, ClassifierLoader, ToxicityClassifier};

/// A classifier that is constructed on first use and reused afterwards.
///
/// The handle is owned explicitly and injected into whoever needs it, usually
/// wrapped in an `Arc`. Concurrent callers racing on the first use wait for a
/// single load. A failed load leaves the handle empty so the next call retries.
pub struct LazyClassifier {
    loader: Box<dyn ClassifierLoader>,
    cell: OnceCell<Arc<dyn ToxicityClassifier>>,
    load_attempts: AtomicUsize,
}

impl LazyClassifier {
    pub fn new(loader: impl ClassifierLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            cell: OnceCell::new(),
            load_attempts: AtomicUsize::new(0),
        }
    }

    /// Returns the shared classifier, loading it with `threshold` and `labels`
    /// if it does not exist yet. Arguments are ignored once loaded.
    pub async fn get_or_load(
        &self,
        threshold: f32,
        labels: &[&str],
    ) -> Result<Arc<dyn ToxicityClassifier>, ClassifierError> {
        let classifier = self
            .cell
            .get_or_try_init(|| async {
                let attempt = self.load_attempts.fetch_add(1, Ordering::SeqCst) + 1;
                info!(
                    "Loading toxicity classifier (attempt {}, threshold {}, {} labels)",
                    attempt,
                    threshold,
                    labels.len()
                );
                let classifier = self.loader.load(threshold, labels).await?;
                info!("Toxicity classifier loaded");
                Ok::<_, ClassifierError>(classifier)
            })
            .await?;
        Ok(Arc::clone(classifier))
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// Number of times the loader has been invoked, failed attempts included.
    pub fn load_attempts(&self) -> usize {
        self.load_attempts.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for LazyClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyClassifier")
            .field("loaded", &self.is_loaded())
            .field("load_attempts", &self.load_attempts())
            .finish()
    }
}
