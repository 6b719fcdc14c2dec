//! Single-slot mailbox carrying the latest check cadence to the loop.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// Latest-value-wins handoff between the reload callback and the check loop.
///
/// [`signal`](Self::signal) overwrites any value not yet consumed and never
/// blocks; [`recv`](Self::recv) takes the value and clears the slot. There
/// is no backlog.
#[derive(Debug, Default)]
pub struct CadenceMailbox {
    slot: Mutex<Option<Duration>>,
    notify: Notify,
}

impl CadenceMailbox {
    /// Create an empty mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `cadence`, replacing any pending value.
    pub fn signal(&self, cadence: Duration) {
        *self.slot.lock() = Some(cadence);
        self.notify.notify_one();
    }

    /// Take the pending value, if any.
    pub fn try_take(&self) -> Option<Duration> {
        self.slot.lock().take()
    }

    /// Wait for a value and take it. Cancel safe.
    pub async fn recv(&self) -> Duration {
        loop {
            if let Some(cadence) = self.try_take() {
                return cadence;
            }
            self.notify.notified().await;
        }
    }
}
