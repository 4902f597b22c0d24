//! Pause gate
//!
//! Open means "keep going". The runner awaits the gate between engine-reported
//! steps, so pause latency is bounded by the duration of the current step.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct PauseGate {
    state: Arc<watch::Sender<bool>>,
}

impl PauseGate {
    /// New gate, initially open
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(true);
        Self {
            state: Arc::new(tx),
        }
    }

    pub fn close(&self) {
        self.state.send_replace(false);
    }

    pub fn open(&self) {
        self.state.send_replace(true);
    }

    pub fn is_open(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolve once the gate is open (immediately if it already is)
    pub async fn wait_open(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}
