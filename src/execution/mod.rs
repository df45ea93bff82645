//! Execution coordination.
//!
//! [`ExecutionCoordinator`] ties the other components together for one request:
//!
//! 1. route the request ([`crate::routing`])
//! 2. reserve the primary's estimate against the request's quota scopes
//! 3. try the primary, then each fallback, one at a time; candidates whose
//!    breaker is open are skipped without contacting the backend
//! 4. on success, commit (or adjust to the actual cost); on exhaustion or
//!    cancellation, refund the whole reservation
//!
//! Backends are reached through the [`BackendInvoker`] capability. A
//! [`BackendRegistry`] maps backend names to adapters; [`FnInvoker`] wraps a
//! closure, which is handy in tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use ai_governance::execution::{BackendResponse, ExecutionRequest, FnInvoker};
//! use ai_governance::pricing::Modality;
//! use ai_governance::routing::RoutingStrategy;
//! use ai_governance::{clock::system_clock, GovernanceConfig};
//! use futures::FutureExt;
//!
//! # async fn run() -> ai_governance::Result<()> {
//! let coordinator = GovernanceConfig::load("governance.yaml")?.build(system_clock())?;
//! let invoker = FnInvoker::new(|candidate, _req| {
//!     async move { Ok(BackendResponse::new(serde_json::json!({ "served_by": candidate }))) }.boxed()
//! });
//! let request = ExecutionRequest::new(Modality::Text, RoutingStrategy::Balanced, 1200, 300)
//!     .with_scope("global")
//!     .with_scope("caller:alice");
//! let result = coordinator.execute(request, &invoker).await?;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```

mod coordinator;
mod invoker;
mod types;

pub use coordinator::ExecutionCoordinator;
pub use invoker::{
    BackendFailure, BackendInvoker, BackendRegistry, BackendResponse, FailureKind, FnInvoker,
    InvocationRequest, InvokeResult,
};
pub use types::{AttemptOutcome, AttemptRecord, ExecutionRequest, ExecutionResult, GovernanceStatus};
