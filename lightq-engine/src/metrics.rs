//! Engine-level metrics, enabled by the `metrics` feature.

use lazy_static::lazy_static;

lazy_static! {
    pub static ref ENGINE_PUSH: &'static str = {
        metrics::describe_counter!("lightq_engine_push_total", "Messages accepted by the push engine.");
        "lightq_engine_push_total"
    };
    pub static ref ENGINE_PUSH_DURABILITY_LOST: &'static str = {
        metrics::describe_counter!(
            "lightq_engine_push_durability_lost_total",
            "Write-behind pushes whose durable insert never landed before the worker pool gave up."
        );
        "lightq_engine_push_durability_lost_total"
    };
    pub static ref ENGINE_WORKER_POOL_REJECTED: &'static str = {
        metrics::describe_counter!(
            "lightq_engine_worker_pool_rejected_total",
            "Write-behind submissions rejected because the worker pool queue was full."
        );
        "lightq_engine_worker_pool_rejected_total"
    };
    pub static ref ENGINE_POP_EMPTY: &'static str = {
        metrics::describe_counter!(
            "lightq_engine_pop_empty_total",
            "Pop calls that found no reservable message."
        );
        "lightq_engine_pop_empty_total"
    };
    pub static ref ENGINE_SELF_HEAL_EVICTIONS: &'static str = {
        metrics::describe_counter!(
            "lightq_engine_self_heal_evictions_total",
            "Cache entries evicted because the durable store disowned them."
        );
        "lightq_engine_self_heal_evictions_total"
    };
    pub static ref ENGINE_DLQ_MOVES: &'static str = {
        metrics::describe_counter!(
            "lightq_engine_dlq_moves_total",
            "Messages moved to the dead-letter queue, tagged by group and reason."
        );
        "lightq_engine_dlq_moves_total"
    };
    pub static ref ENGINE_PROMOTIONS: &'static str = {
        metrics::describe_counter!(
            "lightq_engine_promotions_total",
            "Scheduled messages promoted into the cache by the background promoter."
        );
        "lightq_engine_promotions_total"
    };
    pub static ref ENGINE_SWALLOWED_ERRORS: &'static str = {
        metrics::describe_counter!(
            "lightq_engine_swallowed_errors_total",
            "Errors the engine deliberately does not propagate, tagged by site."
        );
        "lightq_engine_swallowed_errors_total"
    };
}

#[inline]
pub fn record_push(group: &str, policy: &str) {
    metrics::counter!(*ENGINE_PUSH, "group" => group.to_string(), "policy" => policy.to_string()).increment(1);
}

#[inline]
pub fn record_push_durability_lost(group: &str) {
    metrics::counter!(*ENGINE_PUSH_DURABILITY_LOST, "group" => group.to_string()).increment(1);
}

#[inline]
pub fn record_worker_pool_rejected() {
    metrics::counter!(*ENGINE_WORKER_POOL_REJECTED).increment(1);
}

#[inline]
pub fn record_pop_empty(group: &str) {
    metrics::counter!(*ENGINE_POP_EMPTY, "group" => group.to_string()).increment(1);
}

#[inline]
pub fn record_self_heal_eviction(group: &str) {
    metrics::counter!(*ENGINE_SELF_HEAL_EVICTIONS, "group" => group.to_string()).increment(1);
}

#[inline]
pub fn record_dlq_move(group: &str, reason: &str) {
    metrics::counter!(*ENGINE_DLQ_MOVES, "group" => group.to_string(), "reason" => reason.to_string()).increment(1);
}

#[inline]
pub fn record_promotion(group: &str) {
    metrics::counter!(*ENGINE_PROMOTIONS, "group" => group.to_string()).increment(1);
}

#[inline]
pub fn record_swallowed_error(site: &str) {
    metrics::counter!(*ENGINE_SWALLOWED_ERRORS, "site" => site.to_string()).increment(1);
}
