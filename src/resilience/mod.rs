//! Failure isolation primitives.
//!
//! # Circuit Breakers
//!
//! One breaker per backend, held in a [`CircuitBreakerRegistry`]:
//! - **Closed**: normal operation, attempts pass through
//! - **Open**: `failure_threshold` consecutive failures seen, attempts short-circuit
//! - **Half-Open**: `recovery_timeout` elapsed since the last failure, one trial passes
//!
//! ```rust
//! use ai_governance::clock::system_clock;
//! use ai_governance::resilience::{CircuitBreakerConfig, CircuitBreakerRegistry};
//! use std::time::Duration;
//!
//! let config = CircuitBreakerConfig::new()
//!     .with_failure_threshold(5)
//!     .with_recovery_timeout(Duration::from_secs(30));
//! let registry = CircuitBreakerRegistry::new(config, system_clock());
//!
//! let breaker = registry.get("openai/gpt-4o")?;
//! if let Ok(permit) = breaker.try_acquire() {
//!     // Make the backend call...
//!     permit.success();
//! }
//! # Ok::<(), ai_governance::Error>(())
//! ```

pub mod circuit_breaker;
mod registry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot, CircuitPermit, CircuitState,
};
pub use registry::CircuitBreakerRegistry;
