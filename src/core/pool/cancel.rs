//! Cooperative cancellation shared between the caller and the workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// A cancellation token for a scan run.
///
/// Clones share state: cancelling any clone cancels them all. Workers check
/// the token before starting each item, so in-flight items still finish.
///
/// ```
/// use photo_library_matcher::core::pool::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
///
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the cancellation state so the token can drive another run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// `Err` once cancellation has been requested.
    pub fn check(&self) -> Result<(), CancelledError> {
        if self.is_cancelled() {
            Err(CancelledError)
        } else {
            Ok(())
        }
    }
}

/// Returned by [`CancellationToken::check`] after cancellation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Scan was cancelled")]
pub struct CancelledError;
