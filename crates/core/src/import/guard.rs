//! Advisory guard serializing multi-step recomputations per aggregate.

use std::sync::Arc;

use dashmap::DashSet;

/// Set of aggregates currently being recomputed.
///
/// [`RecomputeGuard::try_acquire`] never waits: a second caller for the
/// same key gets `None` and is expected to skip its run.
#[derive(Debug, Clone, Default)]
pub struct RecomputeGuard {
    held: Arc<DashSet<String>>,
}

impl RecomputeGuard {
    /// Creates an empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the guard for `key`, or returns `None` if it is already held.
    #[must_use]
    pub fn try_acquire(&self, key: &str) -> Option<GuardToken> {
        if self.held.insert(key.to_string()) {
            Some(GuardToken {
                held: Arc::clone(&self.held),
                key: key.to_string(),
            })
        } else {
            None
        }
    }

    /// Returns true while a token for `key` is alive.
    #[must_use]
    pub fn is_held(&self, key: &str) -> bool {
        self.held.contains(key)
    }
}

/// Proof of holding the guard for one key. Dropping it releases the key.
#[derive(Debug)]
#[must_use = "the guard is released as soon as the token is dropped"]
pub struct GuardToken {
    held: Arc<DashSet<String>>,
    key: String,
}

impl GuardToken {
    /// The guarded key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for GuardToken {
    fn drop(&mut self) {
        self.held.remove(&self.key);
    }
}
