use super::types::{BreachAction, Quota, QuotaConfig, QuotaStatus};
use crate::clock::Clock;
use crate::{Error, ErrorContext, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Why a quota refused (or, for warn-only quotas, flagged) a reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaRejection {
    pub quota: String,
    pub action: BreachAction,
    pub usage: Decimal,
    pub limit: Decimal,
    pub requested: Decimal,
}

impl QuotaRejection {
    pub fn reason(&self) -> String {
        format!(
            "quota '{}' would reach {} of limit {}",
            self.quota,
            (self.usage + self.requested).normalize(),
            self.limit.normalize()
        )
    }

    pub fn into_error(self) -> Error {
        Error::QuotaExceeded {
            quota: self.quota,
            action: self.action,
            usage: self.usage,
            limit: self.limit,
            requested: self.requested,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ReservedEntry {
    quota: String,
    /// Window the charge landed in.
    reset_at: DateTime<Utc>,
}

/// Provisional charge held against a set of quotas.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub id: Uuid,
    pub cost: Decimal,
    entries: Vec<ReservedEntry>,
    /// Warn-only quotas that were exceeded but still charged.
    pub warnings: Vec<QuotaRejection>,
}

impl Reservation {
    pub fn quotas(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.quota.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReservationOutcome {
    Reserved(Reservation),
    Rejected(QuotaRejection),
}

impl ReservationOutcome {
    pub fn is_reserved(&self) -> bool {
        matches!(self, ReservationOutcome::Reserved(_))
    }

    pub fn into_result(self) -> Result<Reservation> {
        match self {
            ReservationOutcome::Reserved(r) => Ok(r),
            ReservationOutcome::Rejected(r) => Err(r.into_error()),
        }
    }
}

/// Owner of every quota counter.
///
/// All operations take one internal lock, so a check-then-reserve is
/// indivisible with respect to every other reservation and rollback.
pub struct QuotaManager {
    quotas: Mutex<HashMap<String, Quota>>,
    clock: Arc<dyn Clock>,
}

impl QuotaManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            quotas: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn with_quotas(configs: Vec<QuotaConfig>, clock: Arc<dyn Clock>) -> Result<Self> {
        let manager = Self::new(clock);
        for config in configs {
            manager.register(config)?;
        }
        Ok(manager)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Quota>>> {
        self.quotas.lock().map_err(|_| Error::poisoned("quota_manager"))
    }

    /// Add a quota. Names are unique.
    pub fn register(&self, config: QuotaConfig) -> Result<()> {
        if let Some(limit) = config.limit {
            if limit.is_sign_negative() && !limit.is_zero() {
                return Err(Error::configuration_with_context(
                    "quota limit must be >= 0",
                    ErrorContext::new()
                        .with_field_path(format!("quotas.{}.limit", config.name))
                        .with_source("quota_manager"),
                ));
            }
        }
        let now = self.clock.now();
        let mut quotas = self.lock()?;
        if quotas.contains_key(&config.name) {
            return Err(Error::configuration_with_context(
                format!("duplicate quota '{}'", config.name),
                ErrorContext::new()
                    .with_field_path("quotas")
                    .with_source("quota_manager"),
            ));
        }
        quotas.insert(config.name.clone(), Quota::new(config, now));
        Ok(())
    }

    /// Charge `cost` against every quota named in `scope_keys`, or none of them.
    ///
    /// Overdue quotas roll over before the comparison. The first blocking quota in
    /// `scope_keys` order is reported. Warn-only quotas never block.
    pub fn check_and_reserve(
        &self,
        cost: Decimal,
        scope_keys: &[String],
    ) -> Result<ReservationOutcome> {
        if cost.is_sign_negative() && !cost.is_zero() {
            return Err(Error::validation_with_context(
                "reservation cost must be >= 0",
                ErrorContext::new()
                    .with_details(cost.to_string())
                    .with_source("quota_manager"),
            ));
        }

        let now = self.clock.now();
        let mut quotas = self.lock()?;

        let mut matched: Vec<&str> = Vec::with_capacity(scope_keys.len());
        for key in scope_keys {
            if quotas.contains_key(key) && !matched.contains(&key.as_str()) {
                matched.push(key.as_str());
            }
        }

        let mut warnings = Vec::new();
        for name in &matched {
            let Some(quota) = quotas.get_mut(*name) else {
                continue;
            };
            if quota.roll_over_if_due(now) {
                debug!(quota = *name, reset_at = %quota.reset_at, "quota window rolled over");
            }
            if !quota.would_exceed(cost) {
                continue;
            }
            let rejection = QuotaRejection {
                quota: quota.name.clone(),
                action: quota.action,
                usage: quota.usage,
                limit: quota.limit.unwrap_or(Decimal::ZERO),
                requested: cost,
            };
            if quota.action.blocks() {
                info!(
                    quota = *name,
                    action = quota.action.as_str(),
                    usage = %quota.usage,
                    requested = %cost,
                    "reservation rejected"
                );
                return Ok(ReservationOutcome::Rejected(rejection));
            }
            warnings.push(rejection);
        }

        let mut entries = Vec::with_capacity(matched.len());
        for name in &matched {
            if let Some(quota) = quotas.get_mut(*name) {
                quota.usage += cost;
                entries.push(ReservedEntry {
                    quota: quota.name.clone(),
                    reset_at: quota.reset_at,
                });
            }
        }
        for w in &warnings {
            warn!(quota = w.quota.as_str(), reason = %w.reason(), "warn-only quota exceeded");
        }

        let reservation = Reservation {
            id: Uuid::new_v4(),
            cost,
            entries,
            warnings,
        };
        debug!(
            reservation = %reservation.id,
            cost = %cost,
            quotas = reservation.entries.len(),
            "reserved"
        );
        Ok(ReservationOutcome::Reserved(reservation))
    }

    /// The charge already landed at reserve time; kept so callers pair every
    /// reservation with exactly one `commit` or `rollback`.
    pub fn commit(&self, reservation: &Reservation) {
        debug!(reservation = %reservation.id, cost = %reservation.cost, "committed");
    }

    /// Refund a reservation, floor-clamped at zero.
    ///
    /// Quotas whose window rolled over since the reservation are left alone.
    pub fn rollback(&self, reservation: &Reservation) -> Result<()> {
        let now = self.clock.now();
        let mut quotas = self.lock()?;
        for entry in &reservation.entries {
            let Some(quota) = quotas.get_mut(&entry.quota) else {
                continue;
            };
            quota.roll_over_if_due(now);
            if quota.reset_at != entry.reset_at {
                continue;
            }
            quota.usage = (quota.usage - reservation.cost).max(Decimal::ZERO);
        }
        debug!(reservation = %reservation.id, cost = %reservation.cost, "rolled back");
        Ok(())
    }

    /// Swap a reservation's charge for `actual` in one step.
    ///
    /// A smaller charge always fits. A larger one is checked against the
    /// headroom left right now; a blocking quota that cannot absorb the
    /// difference leaves the original reservation untouched and is returned as
    /// the rejection. Quotas whose window rolled over since the reservation
    /// are left alone, as in [`QuotaManager::rollback`].
    pub fn adjust(&self, reservation: &Reservation, actual: Decimal) -> Result<ReservationOutcome> {
        if actual.is_sign_negative() && !actual.is_zero() {
            return Err(Error::validation_with_context(
                "adjusted cost must be >= 0",
                ErrorContext::new()
                    .with_details(actual.to_string())
                    .with_source("quota_manager"),
            ));
        }

        let delta = actual - reservation.cost;
        let now = self.clock.now();
        let mut quotas = self.lock()?;

        let mut live: Vec<&str> = Vec::with_capacity(reservation.entries.len());
        for entry in &reservation.entries {
            let Some(quota) = quotas.get_mut(&entry.quota) else {
                continue;
            };
            quota.roll_over_if_due(now);
            if quota.reset_at == entry.reset_at {
                live.push(entry.quota.as_str());
            }
        }

        let mut warnings = reservation.warnings.clone();
        if delta > Decimal::ZERO {
            for name in &live {
                let Some(quota) = quotas.get(*name) else {
                    continue;
                };
                if !quota.would_exceed(delta) {
                    continue;
                }
                let rejection = QuotaRejection {
                    quota: quota.name.clone(),
                    action: quota.action,
                    usage: quota.usage,
                    limit: quota.limit.unwrap_or(Decimal::ZERO),
                    requested: delta,
                };
                if quota.action.blocks() {
                    info!(
                        quota = *name,
                        reservation = %reservation.id,
                        usage = %quota.usage,
                        requested = %delta,
                        "adjustment rejected"
                    );
                    return Ok(ReservationOutcome::Rejected(rejection));
                }
                if !warnings.iter().any(|w| w.quota == rejection.quota) {
                    warn!(quota = *name, reason = %rejection.reason(), "warn-only quota exceeded");
                    warnings.push(rejection);
                }
            }
        }

        for name in &live {
            if let Some(quota) = quotas.get_mut(*name) {
                quota.usage = (quota.usage + delta).max(Decimal::ZERO);
            }
        }
        debug!(
            reservation = %reservation.id,
            from = %reservation.cost,
            to = %actual,
            "adjusted"
        );
        Ok(ReservationOutcome::Reserved(Reservation {
            id: reservation.id,
            cost: actual,
            entries: reservation.entries.clone(),
            warnings,
        }))
    }

    pub fn status(&self, name: &str) -> Result<Option<QuotaStatus>> {
        let now = self.clock.now();
        Ok(self.lock()?.get(name).map(|q| q.status_at(now)))
    }

    /// Every quota, sorted by name.
    pub fn status_all(&self) -> Result<Vec<QuotaStatus>> {
        let now = self.clock.now();
        let mut all: Vec<QuotaStatus> = self.lock()?.values().map(|q| q.status_at(now)).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}

/// A reservation that refunds itself when dropped unsettled.
///
/// Settle it with [`ReservationGuard::commit`], [`ReservationGuard::adjust`]
/// or [`ReservationGuard::rollback`]. Dropping it without settling, e.g. when
/// the future holding it is dropped, rolls the charge back.
pub struct ReservationGuard {
    manager: Arc<QuotaManager>,
    reservation: Reservation,
    settled: bool,
}

impl ReservationGuard {
    pub fn new(manager: Arc<QuotaManager>, reservation: Reservation) -> Self {
        Self {
            manager,
            reservation,
            settled: false,
        }
    }

    pub fn reservation(&self) -> &Reservation {
        &self.reservation
    }

    /// Keep the charge.
    pub fn commit(mut self) -> Reservation {
        self.settled = true;
        self.manager.commit(&self.reservation);
        self.reservation.clone()
    }

    /// Refund the charge.
    pub fn rollback(mut self) -> Result<()> {
        self.settled = true;
        self.manager.rollback(&self.reservation)
    }

    /// Re-price the charge to `actual`.
    ///
    /// On rejection the original charge is kept and committed, and the
    /// rejection is returned alongside it. An error leaves the guard unsettled,
    /// so it refunds on drop.
    pub fn adjust(mut self, actual: Decimal) -> Result<(Reservation, Option<QuotaRejection>)> {
        match self.manager.adjust(&self.reservation, actual)? {
            ReservationOutcome::Reserved(adjusted) => {
                self.settled = true;
                self.manager.commit(&adjusted);
                Ok((adjusted, None))
            }
            ReservationOutcome::Rejected(rejection) => {
                self.settled = true;
                self.manager.commit(&self.reservation);
                Ok((self.reservation.clone(), Some(rejection)))
            }
        }
    }
}

impl Drop for ReservationGuard {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        debug!(reservation = %self.reservation.id, "reservation dropped unsettled");
        if let Err(e) = self.manager.rollback(&self.reservation) {
            warn!(reservation = %self.reservation.id, error = %e, "rollback on drop failed");
        }
    }
}
