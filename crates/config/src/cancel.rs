//! Cooperative cancellation, grounded on the `watch`-channel shutdown signal the teacher's
//! background daemon tasks select against (`crates/runtime/src/server.rs`).

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct CancelToken(watch::Receiver<bool>);

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the token is cancelled; never resolves otherwise.
    pub async fn cancelled(&mut self) {
        let _ = self.0.wait_for(|cancelled| *cancelled).await;
    }
}

#[derive(Debug, Clone)]
pub struct CancelSource(watch::Sender<bool>);

impl CancelSource {
    pub fn new() -> (Self, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (Self(tx), CancelToken(rx))
    }

    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new().0
    }
}
