use std::time::Duration;
use stream_demux_core::ConsumerId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DemuxError {
    #[error("Stream consumer {consumer_id} iteration timed out after {timeout:?}")]
    Timeout {
        consumer_id: ConsumerId,
        timeout: Duration,
    },

    #[error("Consumer {0} has been destroyed")]
    ConsumerDestroyed(ConsumerId),

    #[error("Consumer not found: {0}")]
    ConsumerNotFound(ConsumerId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DemuxError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DemuxError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, DemuxError>;
