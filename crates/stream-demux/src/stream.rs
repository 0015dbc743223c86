//! Stream handles and `futures::Stream` adapters

use crate::{
    consumer::StreamConsumer,
    demux::{ConsumerStats, StreamDemux},
    error::Result,
};
use futures::Stream;
use std::time::Duration;
use stream_demux_core::{ConsumerId, StreamItem};

/// A view of one named stream
///
/// The handle itself holds no cursor. Each call to [`iter`](Self::iter),
/// [`consumer`](Self::consumer) or [`once`](Self::once) creates a fresh
/// consumer positioned at the current tail, so several tasks can read the
/// same name independently.
///
/// ```ignore
/// use futures::StreamExt;
///
/// let chat = demux.stream("chat");
/// let mut messages = chat.iter();
///
/// while let Some(message) = messages.next().await {
///     println!("{}", message?);
/// }
/// ```
#[derive(Clone)]
pub struct DemuxedStream<T> {
    demux: StreamDemux<T>,
    name: String,
}

impl<T> DemuxedStream<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(demux: StreamDemux<T>, name: String) -> Self {
        Self { demux, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Consumer using the demux's default timeout
    pub fn consumer(&self) -> StreamConsumer<T> {
        self.create_consumer(self.demux.config().default_timeout())
    }

    pub fn create_consumer(&self, timeout: Option<Duration>) -> StreamConsumer<T> {
        self.demux.create_consumer(self.name.clone(), timeout)
    }

    /// New iteration pass over the stream, ending at its terminal item
    pub fn iter(&self) -> impl Stream<Item = Result<T>> + Send + 'static {
        consumer_stream(self.consumer())
    }

    /// Wait for the next value written to the stream
    ///
    /// Falls back to the demux's default timeout when `timeout` is `None`.
    /// Returns the closing value (possibly `None`) if the stream ends first.
    /// After a timeout the temporary consumer is gone, so a late value is
    /// never delivered.
    pub async fn once(&self, timeout: Option<Duration>) -> Result<Option<T>> {
        let timeout = timeout.or_else(|| self.demux.config().default_timeout());
        let mut consumer = self.create_consumer(timeout);
        let item = consumer.next().await?;
        Ok(item.into_value())
    }

    pub fn write(&self, value: T) {
        self.demux.write(self.name.clone(), value);
    }

    pub fn close(&self, value: Option<T>) {
        self.demux.close(self.name.clone(), value);
    }

    pub fn kill(&self, value: Option<T>) {
        self.demux.kill(&self.name, value);
    }

    pub fn get_backpressure(&self) -> u64 {
        self.demux.get_backpressure(&self.name)
    }

    pub fn get_consumer_stats_list(&self) -> Vec<ConsumerStats> {
        self.demux.get_consumer_stats_list(&self.name)
    }

    pub fn get_consumer_count(&self) -> usize {
        self.demux.get_consumer_count(&self.name)
    }

    pub fn has_consumer(&self, id: ConsumerId) -> bool {
        self.demux.has_consumer(&self.name, id)
    }
}

impl<T> std::fmt::Debug for DemuxedStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemuxedStream")
            .field("name", &self.name)
            .finish()
    }
}

impl<T> StreamConsumer<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Convert this consumer into an async Stream
    ///
    /// Yields `Ok(value)` for each value, ends after the terminal item, and
    /// yields a single `Err` before ending if the consumer times out.
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> + Send + 'static {
        consumer_stream(self)
    }
}

/// Create an async value stream from a consumer using `futures::stream::unfold`
///
/// The value carried by the terminal item, if any, is not yielded.
pub fn consumer_stream<T>(consumer: StreamConsumer<T>) -> impl Stream<Item = Result<T>> + Send + 'static
where
    T: Clone + Send + Sync + 'static,
{
    futures::stream::unfold(Some(consumer), |consumer| async move {
        let Some(mut consumer) = consumer else {
            return None;
        };
        match consumer.next().await {
            Ok(StreamItem::Value(value)) => Some((Ok(value), Some(consumer))),
            Ok(StreamItem::Done(_)) => None,
            Err(e) => Some((Err(e), None)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DemuxConfig;
    use crate::error::DemuxError;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_iter_collects_until_close() {
        let demux: StreamDemux<u32> = StreamDemux::new();
        let numbers = demux.stream("numbers");
        let values = numbers.iter();

        for i in 0..5 {
            numbers.write(i);
        }
        numbers.close(None);

        let collected: Vec<u32> = values.map(|v| v.unwrap()).collect().await;
        assert_eq!(collected, vec![0, 1, 2, 3, 4]);
        assert_eq!(numbers.get_consumer_count(), 0);
    }

    #[tokio::test]
    async fn test_independent_passes() {
        let demux: StreamDemux<u32> = StreamDemux::new();
        let handle = demux.stream("numbers");

        let first = handle.iter();
        handle.write(1);
        let second = handle.iter();
        handle.write(2);
        handle.close(None);

        let first: Vec<u32> = first.map(|v| v.unwrap()).collect().await;
        let second: Vec<u32> = second.map(|v| v.unwrap()).collect().await;
        assert_eq!(first, vec![1, 2]);
        assert_eq!(second, vec![2]);
    }

    #[tokio::test]
    async fn test_once_resolves_with_next_value() {
        let demux: StreamDemux<String> = StreamDemux::new();
        let handle = demux.stream("greeting");

        let writer = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            writer.write("hi".to_string());
        });

        let value = handle.once(Some(Duration::from_secs(2))).await.unwrap();
        assert_eq!(value, Some("hi".to_string()));
        assert_eq!(handle.get_consumer_count(), 0);
    }

    #[tokio::test]
    async fn test_once_times_out() {
        let demux: StreamDemux<String> = StreamDemux::new();
        let handle = demux.stream("greeting");

        let err = handle.once(Some(Duration::from_millis(20))).await.unwrap_err();
        assert!(matches!(err, DemuxError::Timeout { .. }));
        assert_eq!(handle.get_consumer_count(), 0);
    }

    #[tokio::test]
    async fn test_once_uses_default_timeout() {
        let config = DemuxConfig::new().with_default_timeout(Duration::from_millis(20));
        let demux: StreamDemux<String> = StreamDemux::with_config(config);

        let err = demux.stream("quiet").once(None).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_stream_ends_after_timeout_error() {
        let demux: StreamDemux<u32> = StreamDemux::new();
        let consumer = demux.create_consumer("slow", Some(Duration::from_millis(20)));
        let mut stream = Box::pin(consumer.into_stream());

        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_handle_kill() {
        let demux: StreamDemux<u32> = StreamDemux::new();
        let handle = demux.stream("jobs");
        let mut consumer = handle.consumer();
        assert!(handle.has_consumer(consumer.id()));

        handle.write(1);
        assert_eq!(handle.get_backpressure(), 1);
        assert_eq!(handle.get_consumer_stats_list()[0].backpressure, 1);

        handle.kill(Some(99));
        assert_eq!(consumer.next().await.unwrap(), StreamItem::Done(Some(99)));
    }
}
