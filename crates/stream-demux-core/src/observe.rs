//! Optional metrics instrumentation.
//!
//! When the `observe` feature is enabled, key operations emit counters and
//! gauges via the [`metrics`] crate. A downstream application must install a
//! metrics recorder (e.g. `metrics-exporter-prometheus`) to collect the data.
//!
//! When the feature is **not** enabled every function in this module is a
//! zero-cost no-op.

/// Record a packet appended to the shared log.
///
/// - `stream_demux.log.appends_total` – counter with `kind` label
#[inline]
pub fn record_append(kind: &'static str) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("stream_demux.log.appends_total", "kind" => kind).increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = kind;
    }
}

/// Set the number of consumers currently registered.
///
/// - `stream_demux.consumers.live` – gauge
#[inline]
pub fn set_live_consumers(count: usize) {
    #[cfg(feature = "observe")]
    {
        metrics::gauge!("stream_demux.consumers.live").set(count as f64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = count;
    }
}

/// Record a consumer creation.
///
/// - `stream_demux.consumers.created_total` – counter
#[inline]
pub fn record_consumer_created() {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("stream_demux.consumers.created_total").increment(1);
    }
}

/// Record a consumer destruction.
///
/// - `stream_demux.consumers.destroyed_total` – counter with `reason` label
///   (`closed` / `killed` / `timeout` / `cancelled` / `dropped`)
#[inline]
pub fn record_consumer_destroyed(reason: &'static str) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("stream_demux.consumers.destroyed_total", "reason" => reason)
            .increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = reason;
    }
}

/// Record a consumer backlog reading.
///
/// - `stream_demux.consumer.backpressure` – histogram of per-consumer backlog
///   sampled when a consumer is charged
#[inline]
pub fn record_backpressure(backpressure: u64) {
    #[cfg(feature = "observe")]
    {
        metrics::histogram!("stream_demux.consumer.backpressure").record(backpressure as f64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = backpressure;
    }
}
