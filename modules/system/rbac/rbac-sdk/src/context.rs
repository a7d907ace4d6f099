use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::AuthzError;
use crate::models::Action;

/// Digest identifying one `(subject, action, object)` triple.
pub type CacheKey = [u8; 32];

/// Request-scoped memo of authorization results.
///
/// One instance lives for exactly one request. Concurrent sub-checks within
/// that request share it; the lock is never held while evaluating.
#[derive(Debug, Default)]
pub struct DecisionCache {
    entries: Mutex<HashMap<CacheKey, Result<(), AuthzError>>>,
}

impl DecisionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Result<(), AuthzError>> {
        self.entries.lock().get(key).cloned()
    }

    /// Store a result. Cancellations are not decisions and are never stored.
    pub fn insert(&self, key: CacheKey, result: &Result<(), AuthzError>) {
        if matches!(result, Err(AuthzError::Cancelled)) {
            return;
        }
        self.entries.lock().insert(key, result.clone());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// One authorization check as seen by a [`CheckRecorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCheck {
    pub action: Action,
    pub resource_type: String,
    pub object_id: String,
    pub allowed: bool,
}

/// Collects every check performed during a request.
#[derive(Debug, Default)]
pub struct CheckRecorder {
    checks: Mutex<Vec<RecordedCheck>>,
}

impl CheckRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, check: RecordedCheck) {
        self.checks.lock().push(check);
    }

    /// Snapshot of the checks recorded so far, in call order.
    #[must_use]
    pub fn checks(&self) -> Vec<RecordedCheck> {
        self.checks.lock().clone()
    }
}

/// `AuthzContext` carries per-request authorization state.
///
/// Built once per inbound request and passed to every authorizer call made
/// while serving it. Nothing in it outlives the request.
#[derive(Debug, Clone, Default)]
pub struct AuthzContext {
    cache: Option<Arc<DecisionCache>>,
    cancellation: Option<CancellationToken>,
    recorder: Option<Arc<CheckRecorder>>,
}

impl AuthzContext {
    /// Create a new `AuthzContext` builder
    #[must_use]
    pub fn builder() -> AuthzContextBuilder {
        AuthzContextBuilder::default()
    }

    /// A context with no cache, no cancellation and no recorder.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn cache(&self) -> Option<&DecisionCache> {
        self.cache.as_deref()
    }

    #[must_use]
    pub fn recorder(&self) -> Option<&CheckRecorder> {
        self.recorder.as_deref()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Fail fast if the request is already done.
    ///
    /// # Errors
    /// Returns [`AuthzError::Cancelled`] if the cancellation token fired.
    pub fn ensure_active(&self) -> Result<(), AuthzError> {
        if self.is_cancelled() {
            return Err(AuthzError::Cancelled);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct AuthzContextBuilder {
    cache: Option<Arc<DecisionCache>>,
    cancellation: Option<CancellationToken>,
    recorder: Option<Arc<CheckRecorder>>,
}

impl AuthzContextBuilder {
    /// Attach a fresh decision cache.
    #[must_use]
    pub fn with_cache(mut self) -> Self {
        self.cache = Some(Arc::new(DecisionCache::new()));
        self
    }

    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    #[must_use]
    pub fn recorder(mut self, recorder: Arc<CheckRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    #[must_use]
    pub fn build(self) -> AuthzContext {
        AuthzContext {
            cache: self.cache,
            cancellation: self.cancellation,
            recorder: self.recorder,
        }
    }
}
