//! Circuit breaker keyed by provider identity
//!
//! Each identity gets its own breaker; the registry is a concurrent map so
//! updating one provider's state never blocks another's. A breaker opens
//! after `failure_threshold` consecutive failures, rejects calls for the
//! cool-down, then lets exactly one trial call through. The trial's outcome
//! closes or reopens the circuit.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::core::ProviderIdentity;

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before the circuit opens
    pub failure_threshold: u32,

    /// How long an open circuit rejects calls before allowing a trial
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Externally visible circuit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitBreakerStatus {
    /// Calls flow normally
    Closed,
    /// Calls are rejected until the cool-down elapses
    Open,
    /// Cool-down elapsed; the next caller becomes the trial
    HalfOpen,
}

impl fmt::Display for CircuitBreakerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Point-in-time view of one breaker
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitSnapshot {
    pub status: CircuitBreakerStatus,
    pub consecutive_failures: u32,
    pub is_open: bool,
    pub opened_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct CircuitState {
    consecutive_failures: u32,
    opened_at: Option<(Instant, DateTime<Utc>)>,
    trial_in_flight: bool,
    /// Bumped on every open so stale trial permits cannot touch a newer cycle
    generation: u64,
}

/// Why a call was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitRejection {
    /// Time until a trial may be attempted (zero while another trial runs)
    pub retry_after: Duration,
}

/// A thread-safe circuit breaker for one provider identity
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<CircuitState>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: Mutex::new(CircuitState::default()),
            config,
        }
    }

    fn state(&self) -> MutexGuard<'_, CircuitState> {
        // Critical sections never panic midway; recover from poisoning
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ask to make a call. The returned permit must be resolved with
    /// `record_success` or `record_failure`; dropping it unresolved
    /// releases a half-open trial without changing the state.
    pub fn acquire(self: &Arc<Self>) -> Result<CircuitPermit, CircuitRejection> {
        let mut state = self.state();

        let Some((opened_at, _)) = state.opened_at else {
            return Ok(CircuitPermit::new(Arc::clone(self), false, state.generation));
        };

        let elapsed = opened_at.elapsed();
        if elapsed < self.config.cooldown {
            return Err(CircuitRejection {
                retry_after: self.config.cooldown - elapsed,
            });
        }

        if state.trial_in_flight {
            return Err(CircuitRejection {
                retry_after: Duration::ZERO,
            });
        }

        log::info!("Circuit breaker transitioning to Half-Open state, admitting trial call");
        state.trial_in_flight = true;
        Ok(CircuitPermit::new(Arc::clone(self), true, state.generation))
    }

    fn on_success(&self, trial: bool, generation: u64) {
        let mut state = self.state();

        if state.opened_at.is_some() {
            log::info!("Circuit breaker transitioning to Closed state");
        }

        state.consecutive_failures = 0;
        state.opened_at = None;
        if trial && state.generation == generation {
            state.trial_in_flight = false;
        }
    }

    fn on_failure(&self, trial: bool, generation: u64) {
        let mut state = self.state();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);

        let reopen_trial = trial && state.generation == generation;
        let trip_closed =
            state.opened_at.is_none() && state.consecutive_failures >= self.config.failure_threshold.max(1);

        if reopen_trial || trip_closed {
            log::warn!(
                "Circuit breaker transitioning to Open state after {} consecutive failures",
                state.consecutive_failures
            );
            state.opened_at = Some((Instant::now(), Utc::now()));
            state.trial_in_flight = false;
            state.generation += 1;
        }
    }

    fn on_abandoned(&self, generation: u64) {
        let mut state = self.state();
        if state.generation == generation {
            state.trial_in_flight = false;
        }
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut state = self.state();
        state.consecutive_failures = 0;
        state.opened_at = None;
        state.trial_in_flight = false;
        state.generation += 1;
    }

    pub fn status(&self) -> CircuitBreakerStatus {
        self.snapshot().status
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let state = self.state();
        let status = match state.opened_at {
            None => CircuitBreakerStatus::Closed,
            Some((at, _)) if at.elapsed() < self.config.cooldown => CircuitBreakerStatus::Open,
            Some(_) => CircuitBreakerStatus::HalfOpen,
        };

        CircuitSnapshot {
            status,
            consecutive_failures: state.consecutive_failures,
            is_open: state.opened_at.is_some(),
            opened_at: state.opened_at.map(|(_, wall)| wall),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }
}

/// Admission to make one call through a breaker
#[must_use = "a permit must be resolved with record_success or record_failure"]
pub struct CircuitPermit {
    breaker: Arc<CircuitBreaker>,
    trial: bool,
    generation: u64,
    resolved: bool,
}

impl CircuitPermit {
    fn new(breaker: Arc<CircuitBreaker>, trial: bool, generation: u64) -> Self {
        Self {
            breaker,
            trial,
            generation,
            resolved: false,
        }
    }

    /// Whether this call is the half-open trial
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn record_success(mut self) {
        self.resolved = true;
        self.breaker.on_success(self.trial, self.generation);
    }

    pub fn record_failure(mut self) {
        self.resolved = true;
        self.breaker.on_failure(self.trial, self.generation);
    }
}

impl Drop for CircuitPermit {
    fn drop(&mut self) {
        if !self.resolved && self.trial {
            log::debug!("Half-open trial abandoned before completion, releasing trial slot");
            self.breaker.on_abandoned(self.generation);
        }
    }
}

/// Breakers for every provider identity seen so far
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<ProviderIdentity, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// The breaker for `identity`, created closed on first use
    pub fn get(&self, identity: &ProviderIdentity) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.get(identity) {
            return Arc::clone(breaker.value());
        }

        let breaker = self
            .breakers
            .entry(identity.clone())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.config.clone())));
        Arc::clone(breaker.value())
    }

    pub fn snapshot(&self, identity: &ProviderIdentity) -> Option<CircuitSnapshot> {
        self.breakers.get(identity).map(|b| b.snapshot())
    }

    pub fn snapshots(&self) -> Vec<(ProviderIdentity, CircuitSnapshot)> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect()
    }

    pub fn reset(&self, identity: &ProviderIdentity) {
        if let Some(breaker) = self.breakers.get(identity) {
            breaker.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EndpointClass, ResourceKind};

    fn breaker(threshold: u32, cooldown: Duration) -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            cooldown,
        }))
    }

    fn fail(cb: &Arc<CircuitBreaker>) {
        cb.acquire().unwrap().record_failure();
    }

    #[test]
    fn test_circuit_closed_initially() {
        let cb = breaker(3, Duration::from_secs(30));
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert!(cb.acquire().is_ok());
    }

    #[test]
    fn test_circuit_opens_after_threshold() {
        let cb = breaker(3, Duration::from_secs(30));

        fail(&cb);
        fail(&cb);
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);

        fail(&cb);
        assert_eq!(cb.status(), CircuitBreakerStatus::Open);

        let rejection = cb.acquire().err().unwrap();
        assert!(rejection.retry_after > Duration::ZERO);
    }

    #[test]
    fn test_success_resets_failure_counter() {
        let cb = breaker(3, Duration::from_secs(30));

        fail(&cb);
        fail(&cb);
        cb.acquire().unwrap().record_success();
        fail(&cb);

        let snapshot = cb.snapshot();
        assert_eq!(snapshot.consecutive_failures, 1);
        assert!(!snapshot.is_open);
    }

    #[test]
    fn test_exactly_one_trial_after_cooldown() {
        let cb = breaker(1, Duration::from_millis(20));
        fail(&cb);
        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(cb.status(), CircuitBreakerStatus::HalfOpen);
        let trial = cb.acquire().unwrap();
        assert!(trial.is_trial());

        let second = cb.acquire().err().unwrap();
        assert_eq!(second.retry_after, Duration::ZERO);

        trial.record_success();
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert!(cb.acquire().is_ok());
    }

    #[test]
    fn test_failed_trial_reopens_and_restarts_cooldown() {
        let cb = breaker(1, Duration::from_millis(20));
        fail(&cb);
        let first_opened = cb.snapshot().opened_at.unwrap();
        std::thread::sleep(Duration::from_millis(40));

        cb.acquire().unwrap().record_failure();

        let snapshot = cb.snapshot();
        assert_eq!(snapshot.status, CircuitBreakerStatus::Open);
        assert!(snapshot.opened_at.unwrap() > first_opened);
        assert!(cb.acquire().is_err());
    }

    #[test]
    fn test_abandoned_trial_releases_slot() {
        let cb = breaker(1, Duration::from_millis(10));
        fail(&cb);
        std::thread::sleep(Duration::from_millis(30));

        drop(cb.acquire().unwrap());

        let retry = cb.acquire().unwrap();
        assert!(retry.is_trial());
    }

    #[test]
    fn test_registry_isolates_identities() {
        let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_secs(30),
        });
        let tavily = ProviderIdentity::new(ResourceKind::Search, "tavily", EndpointClass::RemoteManaged);
        let e2b = ProviderIdentity::new(ResourceKind::Runtime, "e2b", EndpointClass::RemoteManaged);

        registry.get(&tavily).acquire().unwrap().record_failure();

        assert!(registry.get(&tavily).acquire().is_err());
        assert!(registry.get(&e2b).acquire().is_ok());
        assert_eq!(registry.snapshots().len(), 2);

        registry.reset(&tavily);
        assert!(registry.get(&tavily).acquire().is_ok());
    }
}
