use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use crate::classifier::{ClassifierError, ImageClassifier};

/// Where the classifier is in its one-way lifecycle.
#[derive(Clone)]
pub enum LifecycleState {
    Unloaded,
    Loading,
    Ready(Arc<dyn ImageClassifier>),
    /// Terminal; carries the last load error
    Failed(String),
}

impl LifecycleState {
    pub fn status(&self) -> ModelStatus {
        match self {
            LifecycleState::Unloaded => ModelStatus::Unloaded,
            LifecycleState::Loading => ModelStatus::Loading,
            LifecycleState::Ready(_) => ModelStatus::Ready,
            LifecycleState::Failed(_) => ModelStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Ready(_) | LifecycleState::Failed(_))
    }
}

impl fmt::Debug for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Unloaded => f.write_str("Unloaded"),
            LifecycleState::Loading => f.write_str("Loading"),
            LifecycleState::Ready(_) => f.write_str("Ready(..)"),
            LifecycleState::Failed(reason) => f.debug_tuple("Failed").field(reason).finish(),
        }
    }
}

/// Lifecycle state without the handle, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

/// How hard a single load operation tries before settling on `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPolicy {
    /// Total attempts, at least 1
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each one after
    pub backoff: Duration,
}

impl Default for LoadPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

impl LoadPolicy {
    pub fn with_retries(retries: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            backoff,
        }
    }

    fn delay_before(&self, attempt: u32) -> Duration {
        // attempt is 1-based; no delay before the first
        let exponent = attempt.saturating_sub(2).min(16);
        self.backoff.saturating_mul(1u32 << exponent)
    }
}

struct Inner {
    state: watch::Sender<LifecycleState>,
    started: AtomicBool,
    policy: LoadPolicy,
}

/// Owns the classifier handle and its `Unloaded -> Loading -> Ready | Failed`
/// transitions. Exactly one load runs per lifecycle; terminal states never change.
#[derive(Clone)]
pub struct ClassifierLifecycle {
    inner: Arc<Inner>,
}

impl Default for ClassifierLifecycle {
    fn default() -> Self {
        Self::new(LoadPolicy::default())
    }
}

impl fmt::Debug for ClassifierLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierLifecycle")
            .field("state", &*self.inner.state.borrow())
            .field("policy", &self.inner.policy)
            .finish()
    }
}

impl ClassifierLifecycle {
    pub fn new(policy: LoadPolicy) -> Self {
        let (state, _) = watch::channel(LifecycleState::Unloaded);
        Self {
            inner: Arc::new(Inner {
                state,
                started: AtomicBool::new(false),
                policy,
            }),
        }
    }

    /// A lifecycle that is already `Ready` with the given handle.
    pub fn ready(classifier: Arc<dyn ImageClassifier>) -> Self {
        let lifecycle = Self::default();
        lifecycle.inner.started.store(true, Ordering::SeqCst);
        lifecycle.inner.state.send_replace(LifecycleState::Ready(classifier));
        lifecycle
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.state.borrow().clone()
    }

    pub fn status(&self) -> ModelStatus {
        self.inner.state.borrow().status()
    }

    pub fn is_ready(&self) -> bool {
        self.status() == ModelStatus::Ready
    }

    /// The classifier handle, available only once `Ready`.
    pub fn handle(&self) -> Option<Arc<dyn ImageClassifier>> {
        match &*self.inner.state.borrow() {
            LifecycleState::Ready(classifier) => Some(Arc::clone(classifier)),
            _ => None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.inner.state.subscribe()
    }

    /// Starts the single load on the current tokio runtime and returns at once.
    ///
    /// Returns `false` without doing anything if a load was already started.
    /// Completion is reported only through the state channel.
    pub fn load<F, Fut>(&self, loader: F) -> bool
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Arc<dyn ImageClassifier>, ClassifierError>> + Send + 'static,
    {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            log::debug!("Classifier load already started, ignoring");
            return false;
        }

        log::info!("Loading classifier...");
        self.inner.state.send_replace(LifecycleState::Loading);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let next = match load_with_policy(&inner.policy, loader).await {
                Ok(classifier) => {
                    log::info!("Classifier loaded successfully");
                    LifecycleState::Ready(classifier)
                }
                Err(e) => {
                    log::error!("Error loading classifier: {}", e);
                    LifecycleState::Failed(e.to_string())
                }
            };
            inner.state.send_replace(next);
        });
        true
    }

    /// Waits for `Ready` or `Failed`. Returns immediately with `Unloaded`
    /// if no load was ever started.
    pub async fn wait_until_settled(&self) -> LifecycleState {
        if !self.inner.started.load(Ordering::SeqCst) {
            return self.state();
        }
        let mut rx = self.inner.state.subscribe();
        let settled = match rx.wait_for(LifecycleState::is_terminal).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        settled
    }
}

async fn load_with_policy<F, Fut>(
    policy: &LoadPolicy,
    loader: F,
) -> Result<Arc<dyn ImageClassifier>, ClassifierError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Arc<dyn ImageClassifier>, ClassifierError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match loader().await {
            Ok(classifier) => return Ok(classifier),
            Err(e) if attempt < attempts => {
                attempt += 1;
                let delay = policy.delay_before(attempt);
                log::warn!(
                    "Classifier load failed ({}), retrying in {:?} (attempt {}/{})",
                    e, delay, attempt, attempts
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Prediction;
    use image::DynamicImage;
    use std::sync::atomic::AtomicUsize;

    struct Fixed;

    impl ImageClassifier for Fixed {
        fn classify(&self, _image: &DynamicImage) -> Result<Vec<Prediction>, ClassifierError> {
            Ok(vec![Prediction::new("tin can", 0.5)])
        }
    }

    fn ok_loader() -> impl Future<Output = Result<Arc<dyn ImageClassifier>, ClassifierError>> {
        async { Ok(Arc::new(Fixed) as Arc<dyn ImageClassifier>) }
    }

    #[tokio::test]
    async fn test_load_reaches_ready() {
        let lifecycle = ClassifierLifecycle::default();
        assert_eq!(lifecycle.status(), ModelStatus::Unloaded);
        assert!(lifecycle.handle().is_none());

        assert!(lifecycle.load(ok_loader));
        let settled = lifecycle.wait_until_settled().await;
        assert_eq!(settled.status(), ModelStatus::Ready);
        assert!(lifecycle.is_ready());
        assert!(lifecycle.handle().is_some());
    }

    #[tokio::test]
    async fn test_load_runs_only_once() {
        let lifecycle = ClassifierLifecycle::default();
        assert!(lifecycle.load(ok_loader));
        assert!(!lifecycle.load(ok_loader));
        lifecycle.wait_until_settled().await;
        assert!(!lifecycle.load(ok_loader));
        assert!(lifecycle.is_ready());
    }

    #[tokio::test]
    async fn test_failure_is_terminal() {
        let lifecycle = ClassifierLifecycle::default();
        lifecycle.load(|| async {
            Err::<Arc<dyn ImageClassifier>, _>(ClassifierError::ModelError("weights missing".into()))
        });

        match lifecycle.wait_until_settled().await {
            LifecycleState::Failed(reason) => assert!(reason.contains("weights missing")),
            other => panic!("expected Failed, got {:?}", other),
        }
        assert!(!lifecycle.load(ok_loader));
        assert_eq!(lifecycle.status(), ModelStatus::Failed);
    }

    #[tokio::test]
    async fn test_state_is_loading_while_in_flight() {
        let lifecycle = ClassifierLifecycle::default();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let gate = Arc::new(tokio::sync::Mutex::new(Some(rx)));
        lifecycle.load(move || {
            let gate = Arc::clone(&gate);
            async move {
                if let Some(rx) = gate.lock().await.take() {
                    let _ = rx.await;
                }
                Ok(Arc::new(Fixed) as Arc<dyn ImageClassifier>)
            }
        });

        assert_eq!(lifecycle.status(), ModelStatus::Loading);
        tx.send(()).unwrap();
        assert_eq!(lifecycle.wait_until_settled().await.status(), ModelStatus::Ready);
    }

    #[tokio::test]
    async fn test_retry_policy_recovers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lifecycle = ClassifierLifecycle::new(LoadPolicy::with_retries(2, Duration::from_millis(5)));
        let counter = Arc::clone(&calls);
        lifecycle.load(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ClassifierError::ModelError("flaky".into()))
                } else {
                    Ok(Arc::new(Fixed) as Arc<dyn ImageClassifier>)
                }
            }
        });

        assert_eq!(lifecycle.wait_until_settled().await.status(), ModelStatus::Ready);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_default_policy_does_not_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lifecycle = ClassifierLifecycle::default();
        let counter = Arc::clone(&calls);
        lifecycle.load(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<Arc<dyn ImageClassifier>, _>(ClassifierError::ModelError("down".into())) }
        });

        assert_eq!(lifecycle.wait_until_settled().await.status(), ModelStatus::Failed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wait_without_load_returns_unloaded() {
        let lifecycle = ClassifierLifecycle::default();
        assert_eq!(lifecycle.wait_until_settled().await.status(), ModelStatus::Unloaded);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = LoadPolicy::with_retries(3, Duration::from_millis(100));
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.delay_before(2), Duration::from_millis(100));
        assert_eq!(policy.delay_before(3), Duration::from_millis(200));
        assert_eq!(policy.delay_before(4), Duration::from_millis(400));
    }
}
