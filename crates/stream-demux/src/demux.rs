use crate::{
    config::DemuxConfig,
    consumer::{ConsumerState, DemuxLog, StreamConsumer},
    error::{DemuxError, Result},
    stream::DemuxedStream,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use stream_demux_core::{observe, ConsumerId, LogStats, Packet, SharedLog, Target};

/// Snapshot of one live consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerStats {
    /// Consumer id
    pub id: ConsumerId,

    /// Packets accepted but not yet read
    pub backpressure: u64,

    /// Stream name the consumer is subscribed to
    pub stream: String,

    /// Per-suspension timeout, if any
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timeout_ms: Option<u64>,

    /// When the consumer was created
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Multiplexes named streams over one shared log
///
/// Producers write to stream names; consumers subscribe to one name each.
/// A name is only a tag on packets: closing or killing a stream leaves the
/// name free for later writes and later consumers.
///
/// Cloning is cheap and every clone shares the same log and registry.
pub struct StreamDemux<T> {
    log: Arc<DemuxLog<T>>,
    config: Arc<DemuxConfig>,
}

impl<T> Clone for StreamDemux<T> {
    fn clone(&self) -> Self {
        Self {
            log: self.log.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T> StreamDemux<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a demux with the default configuration
    pub fn new() -> Self {
        Self::with_config(DemuxConfig::default())
    }

    pub fn with_config(config: DemuxConfig) -> Self {
        Self {
            log: Arc::new(SharedLog::new()),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &DemuxConfig {
        &self.config
    }

    /// Append a value to the named stream
    pub fn write(&self, name: impl Into<String>, value: T) {
        self.log.append(Packet::data(Target::stream(name), value));
    }

    /// End the named stream for every consumer currently subscribed to it
    ///
    /// Each consumer receives `Done(value)` as its last item. Consumers
    /// created afterwards see a fresh stream.
    pub fn close(&self, name: impl Into<String>, value: Option<T>) {
        self.log.append(Packet::end(Target::stream(name), value));
    }

    /// End every stream for every current consumer
    pub fn close_all(&self, value: Option<T>) {
        self.log.append(Packet::end(Target::All, value));
    }

    /// Append a value addressed to a single consumer
    pub fn write_to_consumer(&self, id: ConsumerId, value: T) {
        self.log.append(Packet::data(Target::Consumer(id), value));
    }

    /// End a single consumer in order, after everything already queued for it
    pub fn close_consumer(&self, id: ConsumerId, value: Option<T>) {
        self.log.append(Packet::end(Target::Consumer(id), value));
    }

    /// Terminate every consumer of the named stream immediately
    ///
    /// Unlike [`close`](Self::close), queued values are not delivered first.
    /// Consumers created after this call are unaffected.
    pub fn kill(&self, name: &str, value: Option<T>) {
        for state in self.log.consumers() {
            if state.stream() == name {
                self.kill_consumer(state.id(), value.clone());
            }
        }
    }

    /// Terminate every live consumer immediately
    pub fn kill_all(&self, value: Option<T>) {
        for state in self.log.consumers() {
            self.kill_consumer(state.id(), value.clone());
        }
    }

    /// Terminate one consumer immediately; a no-op for unknown ids
    pub fn kill_consumer(&self, id: ConsumerId, value: Option<T>) {
        if let Some(state) = self.log.deregister(id) {
            if state.kill(value) {
                observe::record_consumer_destroyed("killed");
                tracing::debug!(consumer_id = id, stream = state.stream(), "Killed stream consumer");
            }
        }
    }

    /// Stats for one live consumer
    pub fn get_consumer_stats(&self, id: ConsumerId) -> Result<ConsumerStats> {
        self.log
            .consumer(id)
            .map(|state| state.stats())
            .ok_or(DemuxError::ConsumerNotFound(id))
    }

    /// Stats for every live consumer of the named stream
    pub fn get_consumer_stats_list(&self, name: &str) -> Vec<ConsumerStats> {
        self.consumers_of(name).iter().map(|s| s.stats()).collect()
    }

    /// Stats for every live consumer
    pub fn get_consumer_stats_list_all(&self) -> Vec<ConsumerStats> {
        self.log.consumers().iter().map(|s| s.stats()).collect()
    }

    /// Largest backlog among consumers of the named stream, 0 if there are none
    pub fn get_backpressure(&self, name: &str) -> u64 {
        self.consumers_of(name)
            .iter()
            .map(|s| s.backpressure())
            .max()
            .unwrap_or(0)
    }

    /// Largest backlog among all live consumers
    pub fn get_backpressure_all(&self) -> u64 {
        self.log
            .consumers()
            .iter()
            .map(|s| s.backpressure())
            .max()
            .unwrap_or(0)
    }

    /// Backlog of one consumer, 0 if it is not live
    pub fn get_consumer_backpressure(&self, id: ConsumerId) -> u64 {
        self.log
            .consumer(id)
            .map(|state| state.backpressure())
            .unwrap_or(0)
    }

    /// Whether consumer `id` is live and subscribed to `name`
    pub fn has_consumer(&self, name: &str, id: ConsumerId) -> bool {
        self.log
            .consumer(id)
            .is_some_and(|state| state.stream() == name)
    }

    pub fn get_consumer_count(&self, name: &str) -> usize {
        self.consumers_of(name).len()
    }

    pub fn get_consumer_count_all(&self) -> usize {
        self.log.consumer_count()
    }

    /// Counters for the underlying log
    pub fn log_stats(&self) -> LogStats {
        self.log.stats()
    }

    /// Create a consumer of the named stream, positioned at the current tail
    pub fn create_consumer(
        &self,
        name: impl Into<String>,
        timeout: Option<Duration>,
    ) -> StreamConsumer<T> {
        StreamConsumer::new(
            self.log.clone(),
            name.into(),
            timeout,
            self.config.backpressure_warn_threshold,
        )
    }

    /// Handle to the named stream
    ///
    /// Every iteration pass over the handle gets its own consumer, so the same
    /// name can be read concurrently by unrelated tasks.
    pub fn stream(&self, name: impl Into<String>) -> DemuxedStream<T> {
        DemuxedStream::new(self.clone(), name.into())
    }

    fn consumers_of(&self, name: &str) -> Vec<Arc<ConsumerState<T>>> {
        self.log
            .consumers()
            .into_iter()
            .filter(|state| state.stream() == name)
            .collect()
    }
}

impl<T> Default for StreamDemux<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for StreamDemux<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDemux")
            .field("config", &self.config)
            .field("log", &self.log.stats())
            .finish()
    }
}
