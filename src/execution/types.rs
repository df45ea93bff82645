use crate::pricing::Modality;
use crate::quota::{BreachAction, QuotaRejection, QuotaScope, QuotaStatus};
use crate::resilience::CircuitBreakerSnapshot;
use crate::routing::RoutingStrategy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One governed request.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub modality: Modality,
    pub strategy: RoutingStrategy,
    pub input_units: i64,
    pub output_units: i64,
    /// Quota names to charge, e.g. `global`, `caller:alice`.
    pub scopes: Vec<String>,
    pub payload: serde_json::Value,
    /// Overrides the coordinator's default per-attempt timeout.
    pub attempt_timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl ExecutionRequest {
    pub fn new(
        modality: Modality,
        strategy: RoutingStrategy,
        input_units: i64,
        output_units: i64,
    ) -> Self {
        Self {
            modality,
            strategy,
            input_units,
            output_units,
            scopes: Vec::new(),
            payload: serde_json::Value::Null,
            attempt_timeout: None,
            cancel: None,
        }
    }

    pub fn with_scope(mut self, key: impl Into<String>) -> Self {
        self.scopes.push(key.into());
        self
    }

    pub fn with_quota_scope(self, scope: &QuotaScope) -> Self {
        self.with_scope(scope.key())
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
    NoAdapter,
    /// Breaker open; the backend was not contacted.
    SkippedCircuitOpen,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub candidate: String,
    pub outcome: AttemptOutcome,
    pub reason: Option<String>,
    pub duration_ms: u64,
}

/// Result handed to the API layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResult {
    Success {
        backend_used: String,
        primary: String,
        payload: serde_json::Value,
        cost_charged: Decimal,
        estimated_cost: Decimal,
        /// Credits charged beyond the held estimate that no quota reflects,
        /// when a blocking quota could not absorb the overrun.
        unbilled_variance: Option<Decimal>,
        /// Warn-only quotas exceeded by this request.
        quota_warnings: Vec<QuotaRejection>,
        attempts: Vec<AttemptRecord>,
    },
    BudgetDenied {
        quota_name: String,
        action: BreachAction,
        reason: String,
    },
    AllProvidersFailed {
        attempts: Vec<AttemptRecord>,
        last_reason: String,
    },
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }

    pub fn backend_used(&self) -> Option<&str> {
        match self {
            ExecutionResult::Success { backend_used, .. } => Some(backend_used),
            _ => None,
        }
    }

    /// Zero unless the request succeeded.
    pub fn cost_charged(&self) -> Decimal {
        match self {
            ExecutionResult::Success { cost_charged, .. } => *cost_charged,
            _ => Decimal::ZERO,
        }
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            ExecutionResult::Success { attempts, .. }
            | ExecutionResult::AllProvidersFailed { attempts, .. } => attempts,
            ExecutionResult::BudgetDenied { .. } => &[],
        }
    }
}

/// Read-only view for status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceStatus {
    pub quotas: Vec<QuotaStatus>,
    pub breakers: Vec<CircuitBreakerSnapshot>,
}
