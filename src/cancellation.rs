//! Cooperative cancellation shared by the long-running loops.
//!
//! A [`CancellationToken`] is set once and observed at loop boundaries. Sleeps
//! race against it so shutdown does not wait out a full interval, but
//! in-flight socket I/O is never interrupted.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Cloneable shutdown flag; every clone observes the same state
#[derive(Debug, Clone)]
pub struct CancellationToken {
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        Self {
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    /// Request shutdown. Idempotent.
    pub fn cancel(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Resolves once the token has been cancelled
    pub async fn cancelled(&self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        // The sender lives as long as `self`, so this only returns once cancelled
        let _ = shutdown_rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `true` when the sleep was cut short by cancellation.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }

        tokio::select! {
            _ = self.cancelled() => true,
            _ = tokio::time::sleep(duration) => self.is_cancelled(),
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
