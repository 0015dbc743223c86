//! # Stream Demux
//!
//! Many named async streams multiplexed over one shared, append-only log.
//!
//! The demux provides:
//! - Named streams that are only tags: write, close and reuse freely
//! - Any number of independent consumers per stream, each with its own cursor
//! - Point-to-point packets addressed to a single consumer id
//! - Per-consumer backpressure and per-suspension timeouts
//! - Out-of-band kill, by consumer, by stream, or for everyone
//!
//! ## Example
//!
//! ```rust,no_run
//! use stream_demux::{StreamDemux, StreamItem};
//!
//! # #[tokio::main]
//! # async fn main() -> stream_demux::Result<()> {
//! let demux: StreamDemux<String> = StreamDemux::new();
//!
//! // Consumers only see packets appended after they were created
//! let mut consumer = demux.create_consumer("hello", None);
//!
//! demux.write("hello", "world".to_string());
//! demux.write("abc", "ignored".to_string());
//! demux.close("hello", None);
//!
//! while let StreamItem::Value(value) = consumer.next().await? {
//!     println!("Received: {}", value);
//! }
//!
//! // The consumer removed itself from the registry when the stream closed
//! assert_eq!(demux.get_consumer_count("hello"), 0);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod consumer;
pub mod demux;
pub mod error;
pub mod filter;
mod notification;
pub mod stream;

pub use config::DemuxConfig;
pub use consumer::StreamConsumer;
pub use demux::{ConsumerStats, StreamDemux};
pub use error::{DemuxError, Result};
pub use filter::Subscription;
pub use stream::{consumer_stream, DemuxedStream};
pub use stream_demux_core::{ConsumerId, LogStats, StreamItem};
