use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot, CircuitState};
use crate::clock::Clock;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// One [`CircuitBreaker`] per backend, created on first use.
///
/// Breakers are independent: a transition on one never touches another.
pub struct CircuitBreakerRegistry {
    cfg: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new(cfg: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            cfg,
            clock,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.cfg
    }

    pub fn get(&self, backend: &str) -> Result<Arc<CircuitBreaker>> {
        {
            let breakers = self
                .breakers
                .read()
                .map_err(|_| Error::poisoned("circuit_breaker_registry"))?;
            if let Some(b) = breakers.get(backend) {
                return Ok(Arc::clone(b));
            }
        }
        let mut breakers = self
            .breakers
            .write()
            .map_err(|_| Error::poisoned("circuit_breaker_registry"))?;
        let breaker = breakers.entry(backend.to_string()).or_insert_with(|| {
            Arc::new(CircuitBreaker::new(backend, self.cfg.clone(), Arc::clone(&self.clock)))
        });
        Ok(Arc::clone(breaker))
    }

    /// State of `backend`; backends never seen are closed.
    pub fn state(&self, backend: &str) -> CircuitState {
        match self.breakers.read() {
            Ok(breakers) => breakers
                .get(backend)
                .map(|b| b.state())
                .unwrap_or(CircuitState::Closed),
            Err(_) => CircuitState::Open,
        }
    }

    pub fn is_open(&self, backend: &str) -> bool {
        match self.breakers.read() {
            Ok(breakers) => breakers.get(backend).map(|b| b.is_open()).unwrap_or(false),
            Err(_) => true,
        }
    }

    pub fn record_success(&self, backend: &str) -> Result<()> {
        self.get(backend)?.record_success();
        Ok(())
    }

    pub fn record_failure(&self, backend: &str) -> Result<()> {
        self.get(backend)?.record_failure();
        Ok(())
    }

    pub fn snapshot(&self, backend: &str) -> Option<CircuitBreakerSnapshot> {
        self.breakers
            .read()
            .ok()
            .and_then(|b| b.get(backend).map(|b| b.snapshot()))
    }

    /// Every known breaker, sorted by backend.
    pub fn snapshot_all(&self) -> Vec<CircuitBreakerSnapshot> {
        let mut all: Vec<CircuitBreakerSnapshot> = match self.breakers.read() {
            Ok(breakers) => breakers.values().map(|b| b.snapshot()).collect(),
            Err(_) => Vec::new(),
        };
        all.sort_by(|a, b| a.backend.cmp(&b.backend));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn registry() -> CircuitBreakerRegistry {
        let clock = ManualClock::shared(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        CircuitBreakerRegistry::new(
            CircuitBreakerConfig::new()
                .with_failure_threshold(2)
                .with_recovery_timeout(Duration::from_secs(5)),
            clock,
        )
    }

    #[test]
    fn test_breakers_are_independent() {
        let reg = registry();
        reg.record_failure("a/x").unwrap();
        reg.record_failure("a/x").unwrap();
        reg.record_failure("b/y").unwrap();
        assert_eq!(reg.state("a/x"), CircuitState::Open);
        assert_eq!(reg.state("b/y"), CircuitState::Closed);
        assert!(reg.is_open("a/x"));
        assert!(!reg.is_open("b/y"));
    }

    #[test]
    fn test_unknown_backend_is_closed() {
        let reg = registry();
        assert_eq!(reg.state("never/seen"), CircuitState::Closed);
        assert!(reg.snapshot("never/seen").is_none());
    }

    #[test]
    fn test_get_returns_same_instance() {
        let reg = registry();
        let a = reg.get("a/x").unwrap();
        let b = reg.get("a/x").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_snapshot_all_sorted() {
        let reg = registry();
        reg.record_success("z/1").unwrap();
        reg.record_failure("a/1").unwrap();
        let names: Vec<String> = reg.snapshot_all().into_iter().map(|s| s.backend).collect();
        assert_eq!(names, vec!["a/1", "z/1"]);
    }
}
