//! Cooperative cancellation for long-running downloads.
//!
//! The store performs blocking I/O; a bundle download can sit in the read
//! loop for minutes. A [`CancellationToken`] is checked between chunks so a
//! settings screen can abort a stalled download from another thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::ModelStoreError;

/// A cancellation flag shared between the caller and a running operation.
///
/// Clones share state: cancelling any clone cancels them all.
///
/// # Example
///
/// ```
/// use softkey_models::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_view = token.clone();
///
/// token.cancel();
/// assert!(worker_view.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, not-yet-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return [`ModelStoreError::Cancelled`] once cancellation was requested.
    pub fn check(&self) -> Result<(), ModelStoreError> {
        if self.is_cancelled() {
            Err(ModelStoreError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn test_clone_shares_state() {
        let token = CancellationToken::new();
        let other = token.clone();

        other.cancel();

        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(ModelStoreError::Cancelled)));
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let token = CancellationToken::new();
        let remote = token.clone();
        std::thread::spawn(move || remote.cancel())
            .join()
            .unwrap();
        assert!(token.is_cancelled());
    }
}
