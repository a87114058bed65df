//! Cache-level metrics, enabled by the `metrics` feature.

use lazy_static::lazy_static;

lazy_static! {
    /// Times the circuit breaker has tripped open.
    pub static ref CACHE_CIRCUIT_OPENED: &'static str = {
        metrics::describe_counter!(
            "lightq_cache_circuit_opened_total",
            "Number of times the cache circuit breaker has opened."
        );
        "lightq_cache_circuit_opened_total"
    };
    /// Calls degraded to a no-op/empty result because the circuit was open
    /// or the backend failed.
    pub static ref CACHE_DEGRADED_CALLS: &'static str = {
        metrics::describe_counter!(
            "lightq_cache_degraded_calls_total",
            "Cache calls that degraded to a no-op or empty result."
        );
        "lightq_cache_degraded_calls_total"
    };
    /// Entries dropped because a group's cache set exceeded
    /// `cache-max-entries-per-group`. The eviction policy drops the
    /// newest-scored entries, which is intentional but operator-visible.
    pub static ref CACHE_EVICTED_NEWEST: &'static str = {
        metrics::describe_counter!(
            "lightq_cache_evicted_newest_total",
            "Entries dropped from a group's cache set for exceeding the per-group capacity."
        );
        "lightq_cache_evicted_newest_total"
    };
}

/// Records one circuit-open transition.
#[inline]
pub fn record_circuit_opened() {
    metrics::counter!(*CACHE_CIRCUIT_OPENED).increment(1);
}

/// Records one degraded (no-op/empty) cache call.
#[inline]
pub fn record_degraded_call() {
    metrics::counter!(*CACHE_DEGRADED_CALLS).increment(1);
}

/// Records `count` entries evicted from `group`'s cache set for
/// exceeding the per-group capacity.
#[inline]
pub fn record_evicted_newest(group: &str, count: u64) {
    metrics::counter!(*CACHE_EVICTED_NEWEST, "group" => group.to_string()).increment(count);
}
