use super::invoker::{BackendFailure, BackendInvoker, BackendResponse, FailureKind, InvocationRequest};
use super::types::{AttemptOutcome, AttemptRecord, ExecutionRequest, ExecutionResult, GovernanceStatus};
use crate::clock::Clock;
use crate::ledger::{noop_sink, SpendLedgerEntry, SpendSink, SpendStatus};
use crate::pricing::{backend_of, round_credits};
use crate::quota::{QuotaManager, ReservationGuard, ReservationOutcome};
use crate::resilience::CircuitBreakerRegistry;
use crate::routing::{IntelligentRouter, RoutingDecision};
use crate::{Error, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Runs the governance pipeline for one request at a time; share it behind an
/// `Arc` to serve many concurrently.
///
/// route → reserve → try candidates in order behind their breakers → commit,
/// adjust or refund.
pub struct ExecutionCoordinator {
    router: IntelligentRouter,
    quotas: Arc<QuotaManager>,
    breakers: Arc<CircuitBreakerRegistry>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn SpendSink>,
    attempt_timeout: Option<Duration>,
}

impl ExecutionCoordinator {
    pub fn new(
        router: IntelligentRouter,
        quotas: Arc<QuotaManager>,
        breakers: Arc<CircuitBreakerRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            router,
            quotas,
            breakers,
            clock,
            sink: noop_sink(),
            attempt_timeout: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn SpendSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Default per-attempt timeout for requests that set none.
    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn router(&self) -> &IntelligentRouter {
        &self.router
    }

    pub fn quotas(&self) -> &Arc<QuotaManager> {
        &self.quotas
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    pub fn status(&self) -> Result<GovernanceStatus> {
        Ok(GovernanceStatus {
            quotas: self.quotas.status_all()?,
            breakers: self.breakers.snapshot_all(),
        })
    }

    /// Govern one request end to end.
    ///
    /// Configuration problems (`UnknownModel`, `InvalidUnits`, `NoCandidates`)
    /// return `Err` before anything is reserved. Budget denials and exhausted
    /// chains are `Ok` results; neither leaves quota charged. Dropping the
    /// returned future before it completes refunds the reservation.
    pub async fn execute(
        &self,
        request: ExecutionRequest,
        invoker: &dyn BackendInvoker,
    ) -> Result<ExecutionResult> {
        let decision = self.router.route(
            request.modality,
            request.strategy,
            request.input_units,
            request.output_units,
        )?;
        info!(
            primary = decision.primary.as_str(),
            fallbacks = decision.fallback_chain.len(),
            estimate = %decision.estimated_cost.total_cost,
            strategy = decision.strategy.as_str(),
            "routed"
        );

        let reservation = match self
            .quotas
            .check_and_reserve(decision.estimated_cost.total_cost, &request.scopes)?
        {
            ReservationOutcome::Reserved(r) => ReservationGuard::new(self.quotas.clone(), r),
            ReservationOutcome::Rejected(rejection) => {
                info!(quota = rejection.quota.as_str(), action = rejection.action.as_str(), "budget denied");
                return Ok(ExecutionResult::BudgetDenied {
                    reason: rejection.reason(),
                    quota_name: rejection.quota,
                    action: rejection.action,
                });
            }
        };

        let request_id = reservation.reservation().id;
        let timeout = request.attempt_timeout.or(self.attempt_timeout);
        let invocation = InvocationRequest {
            modality: request.modality,
            input_units: request.input_units,
            output_units: request.output_units,
            payload: request.payload,
        };

        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut last_reason: Option<String> = None;

        for candidate in decision.candidates() {
            if request.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                last_reason = Some(BackendFailure::cancelled().reason);
                break;
            }

            let breaker = match self.breakers.get(candidate) {
                Ok(b) => b,
                Err(e) => return self.abort(reservation, e),
            };
            let permit = match breaker.try_acquire() {
                Ok(p) => p,
                Err(Error::CircuitOpen { .. }) => {
                    debug!(candidate, "breaker open, skipping");
                    attempts.push(AttemptRecord {
                        candidate: candidate.to_string(),
                        outcome: AttemptOutcome::SkippedCircuitOpen,
                        reason: Some("circuit open".to_string()),
                        duration_ms: 0,
                    });
                    continue;
                }
                Err(e) => return self.abort(reservation, e),
            };

            let started = Instant::now();
            let outcome =
                attempt(invoker, candidate, &invocation, timeout, request.cancel.as_ref()).await;
            let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            match outcome {
                Ok(response) => {
                    permit.success();
                    attempts.push(AttemptRecord {
                        candidate: candidate.to_string(),
                        outcome: AttemptOutcome::Succeeded,
                        reason: None,
                        duration_ms,
                    });
                    return self
                        .settle_success(
                            request_id,
                            &decision,
                            candidate,
                            response,
                            reservation,
                            &invocation,
                            attempts,
                        )
                        .await;
                }
                Err(failure) if failure.kind == FailureKind::Cancelled => {
                    // the permit is dropped unsettled; nothing lands on the breaker
                    drop(permit);
                    info!(candidate, "request cancelled mid-attempt");
                    attempts.push(record(candidate, &failure, duration_ms));
                    self.emit(request_id, candidate, Decimal::ZERO, SpendStatus::Cancelled).await;
                    last_reason = Some(failure.reason);
                    break;
                }
                Err(failure) => {
                    permit.failure();
                    warn!(candidate, kind = ?failure.kind, reason = failure.reason.as_str(), "attempt failed");
                    let status = if failure.kind == FailureKind::TimedOut {
                        SpendStatus::TimedOut
                    } else {
                        SpendStatus::Failed
                    };
                    attempts.push(record(candidate, &failure, duration_ms));
                    self.emit(request_id, candidate, Decimal::ZERO, status).await;
                    last_reason = Some(failure.reason);
                }
            }
        }

        reservation.rollback()?;
        let last_reason = last_reason.unwrap_or_else(|| "every candidate's circuit is open".to_string());
        info!(attempts = attempts.len(), reason = last_reason.as_str(), "all providers failed");
        Ok(ExecutionResult::AllProvidersFailed {
            attempts,
            last_reason,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn settle_success(
        &self,
        request_id: Uuid,
        decision: &RoutingDecision,
        candidate: &str,
        response: BackendResponse,
        reservation: ReservationGuard,
        invocation: &InvocationRequest,
        attempts: Vec<AttemptRecord>,
    ) -> Result<ExecutionResult> {
        let actual = match response.actual_cost {
            Some(cost) => round_credits(cost.max(Decimal::ZERO)),
            None if candidate == decision.primary => decision.estimated_cost.total_cost,
            None => match self
                .router
                .engine()
                .estimate(candidate, invocation.input_units, invocation.output_units)
            {
                Ok(estimate) => estimate.total_cost,
                Err(e) => {
                    warn!(candidate, error = %e, "could not price fallback, keeping estimate");
                    reservation.reservation().cost
                }
            },
        };

        let mut unbilled_variance = None;
        let warnings = if actual == reservation.reservation().cost {
            reservation.commit().warnings
        } else {
            let (held, rejection) = reservation.adjust(actual)?;
            match rejection {
                None => debug!(to = %actual, "reservation adjusted to actual cost"),
                Some(rejection) => {
                    warn!(
                        candidate,
                        quota = rejection.quota.as_str(),
                        actual = %actual,
                        held = %held.cost,
                        "actual cost overruns the quota, unbilled variance"
                    );
                    unbilled_variance = Some(actual - held.cost);
                }
            }
            held.warnings
        };

        self.emit(request_id, candidate, actual, SpendStatus::Succeeded).await;
        info!(
            backend_used = candidate,
            primary = decision.primary.as_str(),
            cost = %actual,
            "request succeeded"
        );
        Ok(ExecutionResult::Success {
            backend_used: candidate.to_string(),
            primary: decision.primary.clone(),
            payload: response.payload,
            cost_charged: actual,
            estimated_cost: decision.estimated_cost.total_cost,
            unbilled_variance,
            quota_warnings: warnings,
            attempts,
        })
    }

    /// Refund and surface an internal error.
    fn abort(&self, reservation: ReservationGuard, error: Error) -> Result<ExecutionResult> {
        if let Err(e) = reservation.rollback() {
            warn!(error = %e, "rollback failed while aborting");
        }
        Err(error)
    }

    async fn emit(&self, request_id: Uuid, candidate: &str, cost: Decimal, status: SpendStatus) {
        let backend = backend_of(candidate);
        let model = candidate
            .strip_prefix(backend)
            .and_then(|m| m.strip_prefix('/'))
            .unwrap_or(candidate);
        let entry = SpendLedgerEntry {
            request_id,
            backend: backend.to_string(),
            model: model.to_string(),
            cost_charged: cost,
            status,
            timestamp: self.clock.now(),
        };
        if let Err(e) = self.sink.record(entry).await {
            warn!(error = %e, "spend sink rejected entry");
        }
    }
}

/// One bounded attempt: the invoker call raced against the timeout and the
/// cancellation token.
async fn attempt(
    invoker: &dyn BackendInvoker,
    candidate: &str,
    request: &InvocationRequest,
    timeout: Option<Duration>,
    cancel: Option<&CancellationToken>,
) -> std::result::Result<BackendResponse, BackendFailure> {
    let call = async {
        match timeout {
            Some(t) => match tokio::time::timeout(t, invoker.invoke(candidate, request)).await {
                Ok(r) => r,
                Err(_) => Err(BackendFailure::timed_out(t)),
            },
            None => invoker.invoke(candidate, request).await,
        }
    };
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(BackendFailure::cancelled()),
            r = call => r,
        },
        None => call.await,
    }
}

fn record(candidate: &str, failure: &BackendFailure, duration_ms: u64) -> AttemptRecord {
    let outcome = match failure.kind {
        FailureKind::Failed => AttemptOutcome::Failed,
        FailureKind::TimedOut => AttemptOutcome::TimedOut,
        FailureKind::Cancelled => AttemptOutcome::Cancelled,
        FailureKind::NoAdapter => AttemptOutcome::NoAdapter,
    };
    AttemptRecord {
        candidate: candidate.to_string(),
        outcome,
        reason: Some(failure.reason.clone()),
        duration_ms,
    }
}
