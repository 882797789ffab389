//! Metrics of the ingestion pipeline.

use std::time::Instant;

/// Container for the metrics emitted by the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct Metrics;

impl Metrics {
    /// Heights received from the node subscription.
    pub const HEIGHTS_RECEIVED_TOTAL: &'static str = "companion_heights_received_total";
    /// Blocks fetched from the node.
    pub const BLOCKS_FETCHED_TOTAL: &'static str = "companion_blocks_fetched_total";
    /// Heights dropped because the block could not be fetched.
    pub const FETCH_FAILURES_TOTAL: &'static str = "companion_fetch_failures_total";
    /// Blocks written to storage.
    pub const BLOCKS_PERSISTED_TOTAL: &'static str = "companion_blocks_persisted_total";
    /// Blocks that failed to persist.
    pub const PERSIST_FAILURES_TOTAL: &'static str = "companion_persist_failures_total";
    /// Latency of a single persist.
    pub const PERSIST_DURATION_SECONDS: &'static str = "companion_persist_duration_seconds";
    /// Last block retain height set on the node.
    pub const RETAIN_HEIGHT: &'static str = "companion_pruning_retain_height";

    /// Describes and zeroes every pipeline metric.
    pub fn init() {
        Self::describe();
        Self::zero();
    }

    fn describe() {
        metrics::describe_counter!(
            Self::HEIGHTS_RECEIVED_TOTAL,
            metrics::Unit::Count,
            "Heights received from the node subscription",
        );
        metrics::describe_counter!(
            Self::BLOCKS_FETCHED_TOTAL,
            metrics::Unit::Count,
            "Blocks fetched from the node",
        );
        metrics::describe_counter!(
            Self::FETCH_FAILURES_TOTAL,
            metrics::Unit::Count,
            "Heights dropped after the block could not be fetched",
        );
        metrics::describe_counter!(
            Self::BLOCKS_PERSISTED_TOTAL,
            metrics::Unit::Count,
            "Blocks written to storage",
        );
        metrics::describe_counter!(
            Self::PERSIST_FAILURES_TOTAL,
            metrics::Unit::Count,
            "Blocks that could not be written to storage",
        );
        metrics::describe_histogram!(
            Self::PERSIST_DURATION_SECONDS,
            metrics::Unit::Seconds,
            "Latency of writing a block to storage",
        );
        metrics::describe_gauge!(
            Self::RETAIN_HEIGHT,
            metrics::Unit::Count,
            "Block retain height last set on the node",
        );
    }

    fn zero() {
        metrics::counter!(Self::HEIGHTS_RECEIVED_TOTAL).increment(0);
        metrics::counter!(Self::BLOCKS_FETCHED_TOTAL).increment(0);
        metrics::counter!(Self::FETCH_FAILURES_TOTAL).increment(0);
        metrics::counter!(Self::BLOCKS_PERSISTED_TOTAL).increment(0);
        metrics::counter!(Self::PERSIST_FAILURES_TOTAL).increment(0);
        metrics::histogram!(Self::PERSIST_DURATION_SECONDS).record(0.0);
        metrics::gauge!(Self::RETAIN_HEIGHT).set(0.0);
    }

    pub(crate) fn record_height_received() {
        metrics::counter!(Self::HEIGHTS_RECEIVED_TOTAL).increment(1);
    }

    pub(crate) fn record_fetch<T, E>(result: &Result<T, E>) {
        match result {
            Ok(_) => metrics::counter!(Self::BLOCKS_FETCHED_TOTAL).increment(1),
            Err(_) => metrics::counter!(Self::FETCH_FAILURES_TOTAL).increment(1),
        }
    }

    pub(crate) fn record_persist<T, E>(started: Instant, result: &Result<T, E>) {
        metrics::histogram!(Self::PERSIST_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        match result {
            Ok(_) => metrics::counter!(Self::BLOCKS_PERSISTED_TOTAL).increment(1),
            Err(_) => metrics::counter!(Self::PERSIST_FAILURES_TOTAL).increment(1),
        }
    }

    pub(crate) fn record_retain_height(height: u64) {
        metrics::gauge!(Self::RETAIN_HEIGHT).set(height as f64);
    }
}
