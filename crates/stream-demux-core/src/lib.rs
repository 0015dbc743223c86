//! Stream Demux Core: the shared log underneath `stream-demux`
//!
//! This crate defines the lower-level pieces every consumer reads from:
//! - Packets: immutable values addressed to a stream, a consumer id, or everyone
//! - Shared log: an append-only linked list of packets with a tail pointer
//! - Consumer registry: id → consumer, charged and woken on every append
//!
//! Readers keep an `Arc` cursor into the log, so consumed nodes are reclaimed
//! as soon as the slowest cursor moves past them.

pub mod observe;
pub mod shared_log;
pub mod traits;
pub mod types;

pub use shared_log::{LogNode, LogStats, SharedLog};
pub use traits::LogConsumer;
pub use types::{ConsumerId, Packet, StreamItem, Target};
