//! Process-wide readiness flag consumed by `/-/ready`.

use std::sync::{PoisonError, RwLock};

const NOT_YET_DISCOVERED: &str = "no discovery snapshot received yet";

#[derive(Debug)]
pub struct Readiness {
    reason: RwLock<Option<String>>,
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

impl Readiness {
    /// Starts not ready until the first discovery snapshot is applied.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reason: RwLock::new(Some(NOT_YET_DISCOVERED.to_string())),
        }
    }

    pub fn ready(&self) {
        *self.reason.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn not_ready(&self, reason: impl Into<String>) {
        *self.reason.write().unwrap_or_else(PoisonError::into_inner) = Some(reason.into());
    }

    /// `Ok(())` when ready, otherwise the reason it is not.
    pub fn is_ready(&self) -> Result<(), String> {
        match &*self.reason.read().unwrap_or_else(PoisonError::into_inner) {
            None => Ok(()),
            Some(reason) => Err(reason.clone()),
        }
    }
}
