//! Per-mutation in-flight tracking
//!
//! Each mutation is tracked under its own key, so an assignment for one
//! unit never blocks creating a player or assigning a different unit.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{ClaimError, ClaimResult};

pub const CREATE_PLAYER: &str = "create-player";
pub const SKIP: &str = "skip";

pub fn assign_key(unique_key: &str) -> String {
    format!("assign:{}", unique_key)
}

/// Set of mutation keys currently in flight
#[derive(Debug, Default)]
pub struct PendingMutations {
    keys: Mutex<HashSet<String>>,
}

impl PendingMutations {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark `key` in flight until the returned guard drops
    pub fn begin(self: &Arc<Self>, key: impl Into<String>) -> ClaimResult<PendingGuard> {
        let key = key.into();
        if !self.lock().insert(key.clone()) {
            return Err(ClaimError::MutationPending(key));
        }
        Ok(PendingGuard {
            owner: Arc::clone(self),
            key,
        })
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // set of strings stays consistent even if a holder panicked
        self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Clears its key when dropped
#[derive(Debug)]
pub struct PendingGuard {
    owner: Arc<PendingMutations>,
    key: String,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.owner.lock().remove(&self.key);
    }
}
