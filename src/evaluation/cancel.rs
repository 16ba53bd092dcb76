//! Cooperative cancellation of analysis runs
//!
//! A run checks its token between documents and between candidate pages.
//! Records already written stay written.

use super::error::{EvalResult, EvaluationError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop flag; clones observe the same state
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Request that the run stop at its next check
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// `Err(Cancelled)` once cancellation was requested
    pub fn check(&self) -> EvalResult<()> {
        if self.is_cancelled() {
            Err(EvaluationError::Cancelled)
        } else {
            Ok(())
        }
    }
}
