use crate::pricing::{backend_of, Modality};
use async_trait::async_trait;
use futures::future::BoxFuture;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// What the adapter layer receives for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub modality: Modality,
    pub input_units: i64,
    pub output_units: i64,
    /// Opaque prompt/parameters, forwarded untouched.
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendResponse {
    pub payload: serde_json::Value,
    /// Cost reported by the backend. `None` means "price it from the catalog".
    pub actual_cost: Option<Decimal>,
}

impl BackendResponse {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            actual_cost: None,
        }
    }

    pub fn with_actual_cost(mut self, cost: Decimal) -> Self {
        self.actual_cost = Some(cost);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The backend answered with an error or a malformed response.
    Failed,
    TimedOut,
    Cancelled,
    /// No adapter is registered for the candidate's backend.
    NoAdapter,
}

/// A failed attempt. This is a value for the coordinator, not a crate [`Error`](crate::Error).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendFailure {
    pub kind: FailureKind,
    pub reason: String,
}

impl BackendFailure {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Failed,
            reason: reason.into(),
        }
    }

    pub fn timed_out(after: Duration) -> Self {
        Self {
            kind: FailureKind::TimedOut,
            reason: format!("attempt timed out after {}ms", after.as_millis()),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            kind: FailureKind::Cancelled,
            reason: "request cancelled".to_string(),
        }
    }

    pub fn no_adapter(backend: &str) -> Self {
        Self {
            kind: FailureKind::NoAdapter,
            reason: format!("no adapter registered for backend '{}'", backend),
        }
    }
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

pub type InvokeResult = std::result::Result<BackendResponse, BackendFailure>;

/// Capability to run one attempt against a candidate (`"backend/model"`).
///
/// Implementations may be slow or hang; the coordinator bounds every call.
#[async_trait]
pub trait BackendInvoker: Send + Sync {
    async fn invoke(&self, candidate: &str, request: &InvocationRequest) -> InvokeResult;
}

/// Adapts a closure into a [`BackendInvoker`].
pub struct FnInvoker<F> {
    f: F,
}

impl<F> FnInvoker<F>
where
    F: Fn(String, InvocationRequest) -> BoxFuture<'static, InvokeResult> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> BackendInvoker for FnInvoker<F>
where
    F: Fn(String, InvocationRequest) -> BoxFuture<'static, InvokeResult> + Send + Sync,
{
    async fn invoke(&self, candidate: &str, request: &InvocationRequest) -> InvokeResult {
        (self.f)(candidate.to_string(), request.clone()).await
    }
}

/// Backend name to adapter, resolved once at startup.
///
/// Dispatch is by the `backend` part of the candidate id, so one adapter serves
/// every model of its service.
#[derive(Default, Clone)]
pub struct BackendRegistry {
    adapters: HashMap<String, Arc<dyn BackendInvoker>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_adapter(mut self, backend: &str, adapter: Arc<dyn BackendInvoker>) -> Self {
        self.register(backend, adapter);
        self
    }

    pub fn register(&mut self, backend: &str, adapter: Arc<dyn BackendInvoker>) {
        self.adapters.insert(backend.to_string(), adapter);
    }

    pub fn contains(&self, backend: &str) -> bool {
        self.adapters.contains_key(backend)
    }

    pub fn backends(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.adapters.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}

#[async_trait]
impl BackendInvoker for BackendRegistry {
    async fn invoke(&self, candidate: &str, request: &InvocationRequest) -> InvokeResult {
        let backend = backend_of(candidate);
        match self.adapters.get(backend) {
            Some(adapter) => adapter.invoke(candidate, request).await,
            None => Err(BackendFailure::no_adapter(backend)),
        }
    }
}
