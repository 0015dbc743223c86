use crate::error::{DemuxError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`StreamDemux`](crate::StreamDemux)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemuxConfig {
    /// Timeout applied by stream handles when the caller does not give one
    /// Default: none (wait forever)
    #[serde(default)]
    pub default_timeout_ms: Option<u64>,

    /// Backlog size at which a consumer logs a warning, 0 disables
    /// Default: 10000
    #[serde(default = "default_backpressure_warn_threshold")]
    pub backpressure_warn_threshold: u64,
}

fn default_backpressure_warn_threshold() -> u64 {
    10_000
}

/// Whole milliseconds in `duration`, rounding a partial millisecond up so a
/// non-zero duration never reads as zero. Saturates at `u64::MAX`.
pub(crate) fn duration_millis(duration: Duration) -> u64 {
    let millis = duration.as_millis() + u128::from(duration.subsec_nanos() % 1_000_000 != 0);
    u64::try_from(millis).unwrap_or(u64::MAX)
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: None,
            backpressure_warn_threshold: default_backpressure_warn_threshold(),
        }
    }
}

impl DemuxConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = Some(duration_millis(timeout));
        self
    }

    pub fn with_backpressure_warn_threshold(mut self, threshold: u64) -> Self {
        self.backpressure_warn_threshold = threshold;
        self
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_timeout_ms == Some(0) {
            return Err(DemuxError::InvalidConfig(
                "default_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
