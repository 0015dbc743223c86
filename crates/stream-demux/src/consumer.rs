use crate::{
    config::duration_millis,
    demux::ConsumerStats,
    error::{DemuxError, Result},
    filter::Subscription,
    notification::WakeSignal,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stream_demux_core::{observe, ConsumerId, LogConsumer, LogNode, Packet, SharedLog, StreamItem};

pub(crate) type DemuxLog<T> = SharedLog<T, ConsumerState<T>>;

/// Half of a consumer that lives in the log registry
///
/// Producers reach it through the registry to charge backpressure, wake the
/// reader, or inject a kill; the cursor stays with [`StreamConsumer`].
pub(crate) struct ConsumerState<T> {
    subscription: Subscription,
    timeout: Option<Duration>,
    created_at: DateTime<Utc>,
    backpressure: AtomicU64,
    warn_threshold: u64,
    alive: AtomicBool,
    pending_kill: Mutex<Option<Option<T>>>,
    wake: WakeSignal,
}

enum Liveness<T> {
    Alive,
    Killed(Option<T>),
    Destroyed,
}

impl<T> ConsumerState<T> {
    fn new(id: ConsumerId, stream: String, timeout: Option<Duration>, warn_threshold: u64) -> Self {
        Self {
            subscription: Subscription::new(stream, id),
            timeout,
            created_at: Utc::now(),
            backpressure: AtomicU64::new(0),
            warn_threshold,
            alive: AtomicBool::new(true),
            pending_kill: Mutex::new(None),
            wake: WakeSignal::new(),
        }
    }

    pub(crate) fn id(&self) -> ConsumerId {
        self.subscription.consumer_id()
    }

    pub(crate) fn stream(&self) -> &str {
        self.subscription.stream()
    }

    pub(crate) fn backpressure(&self) -> u64 {
        self.backpressure.load(Ordering::SeqCst)
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub(crate) fn stats(&self) -> ConsumerStats {
        ConsumerStats {
            id: self.id(),
            backpressure: self.backpressure(),
            stream: self.stream().to_string(),
            timeout_ms: self.timeout.map(duration_millis),
            created_at: self.created_at,
        }
    }

    fn release_backpressure(&self) {
        let _ = self
            .backpressure
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |bp| {
                Some(bp.saturating_sub(1))
            });
    }

    /// Flip to destroyed. Only the caller that performed the transition gets `true`.
    fn mark_destroyed(&self) -> bool {
        let was_alive = self.alive.swap(false, Ordering::SeqCst);
        if was_alive {
            self.backpressure.store(0, Ordering::SeqCst);
        }
        was_alive
    }

    /// Inject a terminal packet out of band and wake the reader
    ///
    /// Returns `false` if the consumer was already destroyed. The caller is
    /// responsible for removing it from the registry.
    pub(crate) fn kill(&self, value: Option<T>) -> bool {
        {
            let mut slot = self.pending_kill.lock();
            if !self.mark_destroyed() {
                return false;
            }
            *slot = Some(value);
        }
        self.wake.wake();
        true
    }

    fn liveness(&self) -> Liveness<T> {
        let mut slot = self.pending_kill.lock();
        if let Some(value) = slot.take() {
            return Liveness::Killed(value);
        }
        if self.is_alive() {
            Liveness::Alive
        } else {
            Liveness::Destroyed
        }
    }

    fn discard_kill(&self) {
        self.pending_kill.lock().take();
    }
}

impl<T> LogConsumer<T> for ConsumerState<T>
where
    T: Send + Sync,
{
    fn accepts(&self, packet: &Packet<T>) -> bool {
        self.is_alive() && self.subscription.matches(packet)
    }

    fn apply_backpressure(&self, _packet: &Packet<T>) {
        let backpressure = self.backpressure.fetch_add(1, Ordering::SeqCst) + 1;
        observe::record_backpressure(backpressure);
        if self.warn_threshold > 0 && backpressure == self.warn_threshold {
            tracing::warn!(
                consumer_id = self.id(),
                stream = self.stream(),
                backpressure,
                "Stream consumer is falling behind"
            );
        }
    }

    fn wake(&self) {
        self.wake.wake();
    }
}

/// An independent reader over one named stream
///
/// Each consumer has a private cursor into the shared log, starting at the
/// tail as of its creation. It yields every packet written to its stream (or
/// addressed to its id) in append order, and is destroyed by the first
/// terminal item, a kill, a timeout, [`cancel`](Self::cancel), or drop.
pub struct StreamConsumer<T>
where
    T: Clone + Send + Sync + 'static,
{
    state: Arc<ConsumerState<T>>,
    cursor: Option<Arc<LogNode<T>>>,
    log: Arc<DemuxLog<T>>,
}

impl<T> StreamConsumer<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        log: Arc<DemuxLog<T>>,
        stream: String,
        timeout: Option<Duration>,
        warn_threshold: u64,
    ) -> Self {
        let (state, cursor) =
            log.register(|id| ConsumerState::new(id, stream, timeout, warn_threshold));

        observe::record_consumer_created();
        tracing::debug!(
            consumer_id = state.id(),
            stream = state.stream(),
            ?timeout,
            "Created stream consumer"
        );

        Self {
            state,
            cursor: Some(cursor),
            log,
        }
    }

    pub fn id(&self) -> ConsumerId {
        self.state.id()
    }

    /// Name of the stream this consumer is subscribed to
    pub fn stream(&self) -> &str {
        self.state.stream()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.state.timeout
    }

    /// Packets accepted by this consumer that it has not read yet
    pub fn backpressure(&self) -> u64 {
        self.state.backpressure()
    }

    pub fn is_alive(&self) -> bool {
        self.state.is_alive()
    }

    pub fn stats(&self) -> ConsumerStats {
        self.state.stats()
    }

    /// Wait for the next item
    ///
    /// Returns `Done` exactly once, after which the consumer is destroyed and
    /// every further call fails with [`DemuxError::ConsumerDestroyed`]. When a
    /// timeout is configured it applies to each suspension separately; if it
    /// elapses the consumer is destroyed and [`DemuxError::Timeout`] is
    /// returned.
    ///
    /// Cancel safe: dropping the returned future loses no packets.
    pub async fn next(&mut self) -> Result<StreamItem<T>> {
        loop {
            match self.state.liveness() {
                Liveness::Killed(value) => {
                    self.destroy("killed");
                    return Ok(StreamItem::Done(value));
                }
                Liveness::Destroyed => {
                    self.cursor = None;
                    return Err(DemuxError::ConsumerDestroyed(self.id()));
                }
                Liveness::Alive => {}
            }

            if let Some(item) = self.advance() {
                return Ok(item);
            }

            match self.state.timeout {
                None => self.state.wake.wait().await,
                Some(timeout) => {
                    if self.state.wake.wait_timeout(timeout).await.is_err() {
                        tracing::debug!(
                            consumer_id = self.id(),
                            stream = self.stream(),
                            ?timeout,
                            "Stream consumer timed out"
                        );
                        self.destroy("timeout");
                        return Err(DemuxError::Timeout {
                            consumer_id: self.id(),
                            timeout,
                        });
                    }
                }
            }
        }
    }

    /// Move the cursor to the next matching node, if one has been appended
    fn advance(&mut self) -> Option<StreamItem<T>> {
        while let Some(node) = self.cursor.as_ref().and_then(|c| c.next()).cloned() {
            let item = node
                .packet()
                .filter(|packet| self.state.subscription.matches(*packet))
                .map(|packet| packet.item.clone());
            self.cursor = Some(node);

            let Some(item) = item else {
                continue;
            };

            self.state.release_backpressure();
            if item.is_done() {
                self.destroy("closed");
            }
            return Some(item);
        }
        None
    }

    /// Stop consuming without a terminal item. Idempotent.
    pub fn cancel(&mut self) {
        self.destroy("cancelled");
    }

    fn destroy(&mut self, reason: &'static str) {
        self.cursor = None;
        if reason != "killed" {
            // A kill that raced this exit must not yield a second terminal item
            self.state.discard_kill();
        }
        if self.state.mark_destroyed() {
            self.log.deregister(self.id());
            observe::record_consumer_destroyed(reason);
            tracing::debug!(
                consumer_id = self.id(),
                stream = self.stream(),
                reason,
                "Destroyed stream consumer"
            );
        } else if reason == "killed" {
            tracing::debug!(
                consumer_id = self.id(),
                stream = self.stream(),
                "Delivered kill to stream consumer"
            );
        }
    }
}

impl<T> Drop for StreamConsumer<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.destroy("dropped");
    }
}

impl<T> std::fmt::Debug for StreamConsumer<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConsumer")
            .field("id", &self.id())
            .field("stream", &self.stream())
            .field("backpressure", &self.backpressure())
            .field("alive", &self.is_alive())
            .finish()
    }
}
