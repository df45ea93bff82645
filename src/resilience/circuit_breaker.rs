use crate::clock::Clock;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerSnapshot {
    pub backend: String,
    pub state: CircuitState,
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
    pub consecutive_failures: u32,
    pub last_failure: Option<DateTime<Utc>>,
    /// Remaining open time in ms, if currently open.
    pub open_remaining_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    #[serde(rename = "recovery_timeout_ms", with = "duration_ms")]
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure threshold
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set how long the breaker stays open before allowing a trial
    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[derive(Debug)]
struct State {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<DateTime<Utc>>,
    /// A half-open trial has been handed out and not settled yet.
    trial_in_flight: bool,
}

/// Per-backend failure tracking state machine.
///
/// - Closed: attempts pass; `failure_threshold` consecutive failures open it
/// - Open: attempts are refused until `recovery_timeout` after the last failure
/// - HalfOpen: exactly one trial passes; its outcome closes or reopens
pub struct CircuitBreaker {
    backend: String,
    cfg: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(backend: &str, cfg: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend: backend.to_string(),
            cfg,
            clock,
            state: Mutex::new(State {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| Error::poisoned("circuit_breaker"))
    }

    fn recovery_elapsed(&self, st: &State, now: DateTime<Utc>) -> bool {
        let timeout = chrono::Duration::from_std(self.cfg.recovery_timeout)
            .unwrap_or_else(|_| chrono::Duration::max_value());
        match st.last_failure {
            Some(at) => now.signed_duration_since(at) >= timeout,
            None => true,
        }
    }

    /// Ask to make one attempt.
    ///
    /// Moves an expired open breaker to half-open and hands out its single trial.
    /// The returned permit must be settled with `success`/`failure`; dropping it
    /// unsettled gives a half-open trial back.
    pub fn try_acquire(&self) -> Result<CircuitPermit<'_>> {
        let now = self.clock.now();
        let mut st = self.lock()?;
        let trial = match st.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                if !self.recovery_elapsed(&st, now) {
                    return Err(Error::CircuitOpen {
                        backend: self.backend.clone(),
                    });
                }
                st.state = CircuitState::HalfOpen;
                st.trial_in_flight = true;
                info!(backend = self.backend.as_str(), "circuit half-open, admitting trial");
                true
            }
            CircuitState::HalfOpen => {
                if st.trial_in_flight {
                    return Err(Error::CircuitOpen {
                        backend: self.backend.clone(),
                    });
                }
                st.trial_in_flight = true;
                true
            }
        };
        Ok(CircuitPermit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    /// Whether an attempt right now would be refused.
    pub fn is_open(&self) -> bool {
        let now = self.clock.now();
        match self.lock() {
            Ok(st) => match st.state {
                CircuitState::Closed => false,
                CircuitState::Open => !self.recovery_elapsed(&st, now),
                CircuitState::HalfOpen => st.trial_in_flight,
            },
            Err(_) => true,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().map(|st| st.state).unwrap_or(CircuitState::Open)
    }

    pub fn record_success(&self) {
        if let Ok(mut st) = self.lock() {
            if st.state != CircuitState::Closed {
                info!(backend = self.backend.as_str(), from = st.state.as_str(), "circuit closed");
            }
            st.state = CircuitState::Closed;
            st.consecutive_failures = 0;
            st.trial_in_flight = false;
        }
    }

    pub fn record_failure(&self) {
        let now = self.clock.now();
        if let Ok(mut st) = self.lock() {
            st.consecutive_failures = st.consecutive_failures.saturating_add(1);
            st.last_failure = Some(now);
            match st.state {
                CircuitState::HalfOpen => {
                    st.state = CircuitState::Open;
                    st.trial_in_flight = false;
                    warn!(backend = self.backend.as_str(), "trial failed, circuit reopened");
                }
                CircuitState::Closed if st.consecutive_failures >= self.cfg.failure_threshold => {
                    st.state = CircuitState::Open;
                    warn!(
                        backend = self.backend.as_str(),
                        failures = st.consecutive_failures,
                        "circuit opened"
                    );
                }
                _ => {}
            }
        }
    }

    fn release_trial(&self) {
        if let Ok(mut st) = self.lock() {
            if st.state == CircuitState::HalfOpen {
                st.trial_in_flight = false;
            }
        }
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let now = self.clock.now();
        let recovery_timeout_ms = u64::try_from(self.cfg.recovery_timeout.as_millis()).unwrap_or(u64::MAX);
        match self.lock() {
            Ok(st) => {
                let open_remaining_ms = match (st.state, st.last_failure) {
                    (CircuitState::Open, Some(at)) => {
                        let elapsed = u64::try_from(now.signed_duration_since(at).num_milliseconds()).unwrap_or(0);
                        recovery_timeout_ms.checked_sub(elapsed).filter(|r| *r > 0)
                    }
                    _ => None,
                };
                CircuitBreakerSnapshot {
                    backend: self.backend.clone(),
                    state: st.state,
                    failure_threshold: self.cfg.failure_threshold,
                    recovery_timeout_ms,
                    consecutive_failures: st.consecutive_failures,
                    last_failure: st.last_failure,
                    open_remaining_ms,
                }
            }
            Err(_) => CircuitBreakerSnapshot {
                backend: self.backend.clone(),
                state: CircuitState::Open,
                failure_threshold: self.cfg.failure_threshold,
                recovery_timeout_ms,
                consecutive_failures: 0,
                last_failure: None,
                open_remaining_ms: None,
            },
        }
    }
}

/// Admission to make one attempt through a [`CircuitBreaker`].
#[must_use = "settle the permit with success() or failure()"]
pub struct CircuitPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl CircuitPermit<'_> {
    /// This permit is the single half-open trial.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for CircuitPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release_trial();
        }
    }
}
