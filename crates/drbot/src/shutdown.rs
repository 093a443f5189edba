//! Cooperative shutdown signal.

use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable trigger the main loop watches.
///
/// Shutdown is sticky: once triggered it stays triggered.
///
/// # Examples
///
/// ```
/// use drbot::ShutdownHandle;
///
/// let handle = ShutdownHandle::new();
/// let observer = handle.clone();
/// handle.shutdown();
/// assert!(observer.is_shutdown());
/// ```
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Create an untriggered handle.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Ask the loop to stop after the event in flight.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    /// Whether shutdown was requested.
    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once shutdown is requested.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as self, so this only returns once triggered
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}
