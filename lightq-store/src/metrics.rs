//! Store-level metrics, enabled by the `metrics` feature.

use lazy_static::lazy_static;

lazy_static! {
    /// Durable-store operations that ran out of retries and failed.
    pub static ref STORE_RETRY_EXHAUSTED: &'static str = {
        metrics::describe_counter!(
            "lightq_store_retry_exhausted_total",
            "Durable-store operations that exhausted their bounded retry budget."
        );
        "lightq_store_retry_exhausted_total"
    };
    /// Durable-store operations retried at least once.
    pub static ref STORE_RETRIES: &'static str = {
        metrics::describe_counter!(
            "lightq_store_retries_total",
            "Total number of durable-store operation retry attempts."
        );
        "lightq_store_retries_total"
    };
}

/// Records one retry attempt for a named operation.
#[inline]
pub fn record_retry(op: &str) {
    metrics::counter!(*STORE_RETRIES, "op" => op.to_string()).increment(1);
}

/// Records that an operation exhausted its retry budget.
#[inline]
pub fn record_retry_exhausted(op: &str) {
    metrics::counter!(*STORE_RETRY_EXHAUSTED, "op" => op.to_string()).increment(1);
}
