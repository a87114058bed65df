//! Protected-call wrapper around a [`CacheStore`]. When the backend is
//! unhealthy, calls fail fast and degrade to no-ops (writes) or empty
//! results (reads) instead of propagating — the durable store is always
//! the fallback of record, so a cache outage must never be fatal.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lightq_core::{ConsumerGroup, Message, MessageId};
use tracing::warn;

use crate::backend::{CacheResult, CacheStore};

/// Circuit state, mirroring the classic closed/open/half-open machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through to the wrapped backend.
    Closed,
    /// The backend is presumed unhealthy; calls degrade without reaching it.
    Open,
    /// The reset timeout elapsed; the next call is allowed through as a probe.
    HalfOpen,
}

/// Tuning for [`CircuitBreakerCache`].
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long to wait before probing the backend again.
    pub reset_timeout: Duration,
    /// Consecutive probe successes required to close the circuit again.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

struct State {
    circuit: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
}

impl State {
    fn new() -> Self {
        Self {
            circuit: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            opened_at: None,
        }
    }
}

/// Wraps any [`CacheStore`] with a circuit breaker. This is the type the
/// rest of the engine depends on — it never returns a cache-originated
/// error; failures are swallowed into a degraded response after being
/// recorded against the breaker.
pub struct CircuitBreakerCache<S> {
    inner: S,
    config: CircuitBreakerConfig,
    state: Mutex<State>,
    times_opened: AtomicU32,
}

impl<S: CacheStore> CircuitBreakerCache<S> {
    /// Wraps `inner` with `config`.
    pub fn new(inner: S, config: CircuitBreakerConfig) -> Self {
        Self {
            inner,
            config,
            state: Mutex::new(State::new()),
            times_opened: AtomicU32::new(0),
        }
    }

    /// Wraps `inner` with the default breaker configuration.
    pub fn with_defaults(inner: S) -> Self {
        Self::new(inner, CircuitBreakerConfig::default())
    }

    /// Current circuit state.
    pub fn state(&self) -> CircuitState {
        self.state.lock().unwrap().circuit
    }

    /// How many times the circuit has opened since construction.
    pub fn times_opened(&self) -> u32 {
        self.times_opened.load(Ordering::Relaxed)
    }

    fn should_allow_request(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.circuit {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let Some(opened_at) = state.opened_at else {
                    return true;
                };
                if opened_at.elapsed() >= self.config.reset_timeout {
                    state.circuit = CircuitState::HalfOpen;
                    state.consecutive_successes = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&self) {
        let mut state = self.state.lock().unwrap();
        match state.circuit {
            CircuitState::Closed => state.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                state.consecutive_successes += 1;
                if state.consecutive_successes >= self.config.success_threshold {
                    state.circuit = CircuitState::Closed;
                    state.consecutive_failures = 0;
                    state.opened_at = None;
                }
            }
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut state = self.state.lock().unwrap();
        state.consecutive_successes = 0;
        match state.circuit {
            CircuitState::Closed => {
                state.consecutive_failures += 1;
                if state.consecutive_failures >= self.config.failure_threshold {
                    state.circuit = CircuitState::Open;
                    state.opened_at = Some(Instant::now());
                    self.times_opened.fetch_add(1, Ordering::Relaxed);
                    #[cfg(feature = "metrics")]
                    crate::metrics::record_circuit_opened();
                }
            }
            CircuitState::HalfOpen => {
                state.circuit = CircuitState::Open;
                state.opened_at = Some(Instant::now());
                self.times_opened.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "metrics")]
                crate::metrics::record_circuit_opened();
            }
            CircuitState::Open => {}
        }
    }

    fn degraded_write(&self) {
        #[cfg(feature = "metrics")]
        crate::metrics::record_degraded_call();
        warn!("cache call degraded to no-op: circuit open or backend failing");
    }

    fn degraded_read(&self) {
        #[cfg(feature = "metrics")]
        crate::metrics::record_degraded_call();
        warn!("cache read degraded to empty result: circuit open or backend failing");
    }
}

#[async_trait]
impl<S: CacheStore> CacheStore for CircuitBreakerCache<S> {
    async fn add(&self, group: &ConsumerGroup, msg: &Message) -> CacheResult<()> {
        if !self.should_allow_request() {
            self.degraded_write();
            return Ok(());
        }
        match self.inner.add(group, msg).await {
            Ok(()) => {
                self.record_success();
                Ok(())
            }
            Err(e) => {
                self.record_failure();
                warn!(error = %e, "cache add failed, degrading");
                Ok(())
            }
        }
    }

    async fn add_scored(&self, group: &ConsumerGroup, msg: &Message, score_millis: i64) -> CacheResult<()> {
        if !self.should_allow_request() {
            self.degraded_write();
            return Ok(());
        }
        match self.inner.add_scored(group, msg, score_millis).await {
            Ok(()) => {
                self.record_success();
                Ok(())
            }
            Err(e) => {
                self.record_failure();
                warn!(error = %e, "cache add_scored failed, degrading");
                Ok(())
            }
        }
    }

    async fn add_many(&self, group: &ConsumerGroup, msgs: &[Message]) -> CacheResult<()> {
        if !self.should_allow_request() {
            self.degraded_write();
            return Ok(());
        }
        match self.inner.add_many(group, msgs).await {
            Ok(()) => {
                self.record_success();
                Ok(())
            }
            Err(e) => {
                self.record_failure();
                warn!(error = %e, "cache add_many failed, degrading");
                Ok(())
            }
        }
    }

    async fn pop(&self, group: &ConsumerGroup) -> CacheResult<Option<Message>> {
        if !self.should_allow_request() {
            self.degraded_read();
            return Ok(None);
        }
        match self.inner.pop(group).await {
            Ok(result) => {
                self.record_success();
                Ok(result)
            }
            Err(e) => {
                self.record_failure();
                warn!(error = %e, "cache pop failed, degrading");
                Ok(None)
            }
        }
    }

    async fn peek(&self, group: &ConsumerGroup, limit: usize) -> CacheResult<Vec<Message>> {
        if !self.should_allow_request() {
            self.degraded_read();
            return Ok(Vec::new());
        }
        match self.inner.peek(group, limit).await {
            Ok(result) => {
                self.record_success();
                Ok(result)
            }
            Err(e) => {
                self.record_failure();
                warn!(error = %e, "cache peek failed, degrading");
                Ok(Vec::new())
            }
        }
    }

    async fn remove_one(&self, group: &ConsumerGroup, id: MessageId) -> CacheResult<bool> {
        if !self.should_allow_request() {
            self.degraded_write();
            return Ok(false);
        }
        match self.inner.remove_one(group, id).await {
            Ok(result) => {
                self.record_success();
                Ok(result)
            }
            Err(e) => {
                self.record_failure();
                warn!(error = %e, "cache remove_one failed, degrading");
                Ok(false)
            }
        }
    }

    async fn shutdown(&self) {
        self.inner.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::AtomicU32 as StdAtomicU32;

    struct FailingCache {
        failures_remaining: StdAtomicU32,
    }

    impl FailingCache {
        fn new(fail_count: u32) -> Self {
            Self {
                failures_remaining: StdAtomicU32::new(fail_count),
            }
        }
    }

    #[async_trait]
    impl CacheStore for FailingCache {
        async fn add(&self, _group: &ConsumerGroup, _msg: &Message) -> CacheResult<()> {
            let remaining = self.failures_remaining.fetch_sub(1, Ordering::Relaxed);
            if remaining > 0 {
                Err(CacheError::Connection(Box::new(std::io::Error::other("down"))))
            } else {
                Ok(())
            }
        }

        async fn add_scored(&self, _group: &ConsumerGroup, _msg: &Message, _score_millis: i64) -> CacheResult<()> {
            Ok(())
        }

        async fn add_many(&self, _group: &ConsumerGroup, _msgs: &[Message]) -> CacheResult<()> {
            Ok(())
        }

        async fn pop(&self, _group: &ConsumerGroup) -> CacheResult<Option<Message>> {
            Ok(None)
        }

        async fn peek(&self, _group: &ConsumerGroup, _limit: usize) -> CacheResult<Vec<Message>> {
            Ok(Vec::new())
        }

        async fn remove_one(&self, _group: &ConsumerGroup, _id: MessageId) -> CacheResult<bool> {
            Ok(false)
        }
    }

    use crate::error::CacheError;

    fn group() -> ConsumerGroup {
        ConsumerGroup::parse("g").unwrap()
    }

    #[tokio::test]
    async fn opens_after_threshold_and_degrades_instead_of_erroring() {
        let cb = CircuitBreakerCache::new(
            FailingCache::new(100),
            CircuitBreakerConfig {
                failure_threshold: 3,
                reset_timeout: Duration::from_secs(60),
                success_threshold: 1,
            },
        );
        let msg = Message::new(group(), b"x".to_vec(), Utc::now(), None);

        for _ in 0..3 {
            assert!(cb.add(&group(), &msg).await.is_ok());
        }
        assert_eq!(cb.state(), CircuitState::Open);

        // Further calls degrade without reaching the backend.
        assert!(cb.add(&group(), &msg).await.is_ok());
        assert_eq!(cb.times_opened(), 1);
    }

    #[tokio::test]
    async fn half_open_probe_recovers_circuit() {
        let cb = CircuitBreakerCache::new(
            FailingCache::new(3),
            CircuitBreakerConfig {
                failure_threshold: 3,
                reset_timeout: Duration::from_millis(5),
                success_threshold: 1,
            },
        );
        let msg = Message::new(group(), b"x".to_vec(), Utc::now(), None);

        for _ in 0..3 {
            let _ = cb.add(&group(), &msg).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(cb.add(&group(), &msg).await.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
