//! Wake signal used to resume a suspended consumer

use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::error::Elapsed;

/// Per-consumer "log advanced" signal
///
/// Backed by [`tokio::sync::Notify`]: a wake that arrives while nobody is
/// waiting is stored as a permit, so a producer racing a consumer that is
/// about to suspend is never lost.
#[derive(Debug, Default)]
pub(crate) struct WakeSignal {
    notify: Notify,
}

impl WakeSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wake the waiter, or leave a permit for the next wait
    pub(crate) fn wake(&self) {
        self.notify.notify_one();
    }

    /// Wait until woken
    pub(crate) async fn wait(&self) {
        self.notify.notified().await;
    }

    /// Wait until woken or until `timeout` elapses
    ///
    /// The timer is dropped as soon as the wake wins, and the pending
    /// notification is dropped when the timer wins.
    pub(crate) async fn wait_timeout(&self, timeout: Duration) -> Result<(), Elapsed> {
        tokio::time::timeout(timeout, self.notify.notified()).await
    }
}
