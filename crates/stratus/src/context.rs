//! Cooperative cancellation for validation runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::ValidateError;

/// A cloneable cancellation handle checked at coarse boundaries: the start
/// of each element, each mapping-node level, and each substitution. Hosts
/// with deadlines cancel the token themselves when the deadline passes.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns promptly with [`ValidateError::Cancelled`] once the token has
    /// been cancelled.
    pub fn check(&self) -> Result<(), ValidateError> {
        if self.is_cancelled() {
            Err(ValidateError::Cancelled)
        } else {
            Ok(())
        }
    }
}
