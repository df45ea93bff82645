//! # ai-governance
//!
//! Cost and reliability governance for requests fanned out to third-party AI
//! backends.
//!
//! ## Overview
//!
//! Every request passes through one pipeline: price the candidates, pick a
//! primary and a short fallback chain, reserve the estimated cost against the
//! caller's quotas, then try candidates one at a time behind per-backend circuit
//! breakers. Success commits the charge (adjusted to the real cost); exhaustion
//! or cancellation refunds it.
//!
//! ## Core Philosophy
//!
//! - **Deterministic money**: credits are `Decimal`, rounded half-up to six digits
//! - **Explicit wiring**: catalog, quotas and breakers are constructed instances, never globals
//! - **Injectable time**: quota windows and breaker recovery read a [`clock::Clock`]
//! - **Backends are a capability**: the core never talks to a network itself
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_governance::execution::{BackendRegistry, ExecutionRequest};
//! use ai_governance::pricing::Modality;
//! use ai_governance::routing::RoutingStrategy;
//! use ai_governance::{clock::system_clock, GovernanceConfig};
//!
//! #[tokio::main]
//! async fn main() -> ai_governance::Result<()> {
//!     let coordinator = GovernanceConfig::from_env()?.build(system_clock())?;
//!     let backends = BackendRegistry::new(); // register one adapter per service
//!
//!     let request = ExecutionRequest::new(Modality::Text, RoutingStrategy::CostOptimized, 800, 200)
//!         .with_scope("global");
//!     let result = coordinator.execute(request, &backends).await?;
//!     println!("{:?}", result);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`pricing`] | Pricing catalog and cost estimation |
//! | [`routing`] | Strategy-based candidate ranking and routing decisions |
//! | [`quota`] | Windowed spend quotas with atomic reservations |
//! | [`resilience`] | Per-backend circuit breakers |
//! | [`execution`] | The coordinator and the backend invoker capability |
//! | [`ledger`] | Spend ledger entries and sinks |
//! | [`config`] | YAML/JSON configuration and wiring |
//! | [`clock`] | Injectable time |

pub mod clock;
pub mod config;
pub mod execution;
pub mod ledger;
pub mod pricing;
pub mod quota;
pub mod resilience;
pub mod routing;

// Re-export main types for convenience
pub use config::GovernanceConfig;
pub use execution::{BackendInvoker, ExecutionCoordinator, ExecutionRequest, ExecutionResult};
pub use ledger::{SpendLedgerEntry, SpendSink};
pub use pricing::{CostEstimate, Modality, PricingEngine};
pub use routing::{IntelligentRouter, RoutingDecision, RoutingStrategy};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
