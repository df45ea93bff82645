use super::window::QuotaWindow;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happens when a reservation would push a quota past its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachAction {
    /// Reject the request.
    HardStop,
    /// Reject the reservation; the caller decides how to degrade.
    SoftDegrade,
    /// Log, charge anyway, and proceed.
    WarnOnly,
}

impl BreachAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreachAction::HardStop => "hard_stop",
            BreachAction::SoftDegrade => "soft_degrade",
            BreachAction::WarnOnly => "warn_only",
        }
    }

    pub fn blocks(&self) -> bool {
        !matches!(self, BreachAction::WarnOnly)
    }
}

impl Default for BreachAction {
    fn default() -> Self {
        BreachAction::HardStop
    }
}

impl fmt::Display for BreachAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dimension a quota applies to. [`QuotaScope::key`] is the quota name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QuotaScope {
    Global,
    Backend(String),
    Caller(String),
    Project(String),
}

impl QuotaScope {
    pub fn key(&self) -> String {
        match self {
            QuotaScope::Global => "global".to_string(),
            QuotaScope::Backend(id) => format!("backend:{}", id),
            QuotaScope::Caller(id) => format!("caller:{}", id),
            QuotaScope::Project(id) => format!("project:{}", id),
        }
    }

    /// Inverse of [`QuotaScope::key`].
    pub fn parse(key: &str) -> Option<Self> {
        if key == "global" {
            return Some(QuotaScope::Global);
        }
        let (kind, id) = key.split_once(':')?;
        if id.is_empty() {
            return None;
        }
        match kind {
            "backend" => Some(QuotaScope::Backend(id.to_string())),
            "caller" => Some(QuotaScope::Caller(id.to_string())),
            "project" => Some(QuotaScope::Project(id.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for QuotaScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Declarative quota definition, as loaded from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaConfig {
    pub name: String,
    /// `None` means unlimited; usage is still tracked.
    #[serde(default)]
    pub limit: Option<Decimal>,
    pub window: QuotaWindow,
    #[serde(default)]
    pub action: BreachAction,
}

impl QuotaConfig {
    pub fn new(name: &str, limit: Option<Decimal>, window: QuotaWindow, action: BreachAction) -> Self {
        Self {
            name: name.to_string(),
            limit,
            window,
            action,
        }
    }
}

/// A live counter. Only the quota manager mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct Quota {
    pub name: String,
    pub limit: Option<Decimal>,
    pub window: QuotaWindow,
    pub usage: Decimal,
    pub reset_at: DateTime<Utc>,
    pub action: BreachAction,
}

impl Quota {
    pub fn new(config: QuotaConfig, now: DateTime<Utc>) -> Self {
        Self {
            reset_at: config.window.next_reset(now),
            name: config.name,
            limit: config.limit,
            window: config.window,
            usage: Decimal::ZERO,
            action: config.action,
        }
    }

    /// Reset usage if `now` has reached `reset_at`. Returns whether it rolled.
    pub(crate) fn roll_over_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if now < self.reset_at {
            return false;
        }
        self.usage = Decimal::ZERO;
        self.reset_at = self.window.next_reset(now);
        true
    }

    pub fn would_exceed(&self, cost: Decimal) -> bool {
        match self.limit {
            Some(limit) => self.usage + cost > limit,
            None => false,
        }
    }

    pub fn remaining(&self) -> Option<Decimal> {
        self.limit.map(|l| (l - self.usage).max(Decimal::ZERO))
    }

    /// Read-only view as of `now`, without mutating an overdue counter.
    pub fn status_at(&self, now: DateTime<Utc>) -> QuotaStatus {
        let mut view = self.clone();
        view.roll_over_if_due(now);
        QuotaStatus {
            remaining: view.remaining(),
            name: view.name,
            usage: view.usage,
            limit: view.limit,
            window: view.window,
            reset_at: view.reset_at,
            action: view.action,
        }
    }
}

/// Snapshot of one quota for status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub name: String,
    pub usage: Decimal,
    pub limit: Option<Decimal>,
    pub remaining: Option<Decimal>,
    pub window: QuotaWindow,
    pub reset_at: DateTime<Utc>,
    pub action: BreachAction,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_scope_keys_round_trip() {
        for scope in [
            QuotaScope::Global,
            QuotaScope::Backend("openai".into()),
            QuotaScope::Caller("u-1".into()),
            QuotaScope::Project("p:9".into()),
        ] {
            assert_eq!(QuotaScope::parse(&scope.key()), Some(scope));
        }
        assert_eq!(QuotaScope::parse("team:x"), None);
        assert_eq!(QuotaScope::parse("caller:"), None);
    }

    #[test]
    fn test_roll_over_exactly_at_reset() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 15, 0).unwrap();
        let mut q = Quota::new(
            QuotaConfig::new("global", Some(dec!(5)), QuotaWindow::Hour, BreachAction::HardStop),
            t0,
        );
        q.usage = dec!(4);
        let reset = Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap();
        assert_eq!(q.reset_at, reset);

        assert!(!q.roll_over_if_due(reset - chrono::Duration::seconds(1)));
        assert_eq!(q.usage, dec!(4));

        assert!(q.roll_over_if_due(reset));
        assert_eq!(q.usage, Decimal::ZERO);
        assert_eq!(q.reset_at, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_overdue_roll_over_lands_in_current_window() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let mut q = Quota::new(
            QuotaConfig::new("global", None, QuotaWindow::Day, BreachAction::HardStop),
            t0,
        );
        let much_later = Utc.with_ymd_and_hms(2024, 5, 9, 8, 0, 0).unwrap();
        assert!(q.roll_over_if_due(much_later));
        assert_eq!(q.reset_at, Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_would_exceed_and_remaining() {
        let now = Utc::now();
        let mut q = Quota::new(
            QuotaConfig::new("caller:a", Some(dec!(10)), QuotaWindow::Month, BreachAction::WarnOnly),
            now,
        );
        q.usage = dec!(7);
        assert!(!q.would_exceed(dec!(3)));
        assert!(q.would_exceed(dec!(3.000001)));
        assert_eq!(q.remaining(), Some(dec!(3)));

        let unlimited = Quota::new(
            QuotaConfig::new("global", None, QuotaWindow::Month, BreachAction::HardStop),
            now,
        );
        assert!(!unlimited.would_exceed(dec!(1000000)));
        assert_eq!(unlimited.remaining(), None);
    }

    #[test]
    fn test_status_does_not_mutate() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let mut q = Quota::new(
            QuotaConfig::new("global", Some(dec!(10)), QuotaWindow::Hour, BreachAction::HardStop),
            t0,
        );
        q.usage = dec!(6);
        let status = q.status_at(t0 + chrono::Duration::hours(2));
        assert_eq!(status.usage, Decimal::ZERO);
        assert_eq!(status.remaining, Some(dec!(10)));
        assert_eq!(q.usage, dec!(6));
    }

    #[test]
    fn test_breach_action_serde() {
        let action: BreachAction = serde_json::from_str("\"soft_degrade\"").unwrap();
        assert_eq!(action, BreachAction::SoftDegrade);
        assert!(action.blocks());
        assert!(!BreachAction::WarnOnly.blocks());
    }
}
