//! Governance configuration.
//!
//! One YAML or JSON document describes the catalog, the router tables, breaker
//! tuning, quotas and execution defaults. [`GovernanceConfig::build`] turns it
//! into a wired [`ExecutionCoordinator`]; nothing is kept in globals.
//!
//! ```yaml
//! catalog:
//!   - { backend: openai, model: gpt-4o-mini, modality: text,
//!       input_price_per_million: "0.15", output_price_per_million: "0.6",
//!       context_limit: 128000, expected_latency_ms: 600, quality_score: 7.5 }
//! router:
//!   chain_depth: 2
//! circuit_breaker:
//!   failure_threshold: 5
//!   recovery_timeout_ms: 30000
//! quotas:
//!   - { name: global, limit: "500", window: month, action: hard_stop }
//! execution:
//!   attempt_timeout_ms: 20000
//! ```

use crate::clock::Clock;
use crate::execution::ExecutionCoordinator;
use crate::pricing::{Modality, ModelPricing, PricingCatalog, PricingEngine};
use crate::quota::{QuotaConfig, QuotaManager};
use crate::resilience::{CircuitBreakerConfig, CircuitBreakerRegistry};
use crate::routing::{IntelligentRouter, ModelProfile, RouterConfig};
use crate::{Error, ErrorContext, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Environment variable naming the config file when no path is given.
pub const CONFIG_ENV_VAR: &str = "AI_GOVERNANCE_CONFIG";

/// One catalog row: pricing plus the optional static routing profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub backend: String,
    pub model: String,
    pub modality: Modality,
    pub input_price_per_million: Decimal,
    pub output_price_per_million: Decimal,
    #[serde(default = "unbounded_context")]
    pub context_limit: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
}

fn unbounded_context() -> u64 {
    u64::MAX
}

impl CatalogEntry {
    pub fn pricing(&self) -> ModelPricing {
        ModelPricing::new(
            &self.backend,
            &self.model,
            self.modality,
            self.input_price_per_million,
            self.output_price_per_million,
        )
        .with_context_limit(self.context_limit)
    }

    /// Profile for the router, if either field is set. Missing halves take the
    /// router defaults.
    pub fn profile(&self, router: &RouterConfig) -> Option<ModelProfile> {
        if self.expected_latency_ms.is_none() && self.quality_score.is_none() {
            return None;
        }
        Some(ModelProfile::new(
            self.expected_latency_ms.unwrap_or(router.default_latency_ms),
            self.quality_score.unwrap_or(router.default_quality),
        ))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    pub attempt_timeout_ms: Option<u64>,
}

impl ExecutionSettings {
    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    pub catalog: Vec<CatalogEntry>,
    pub router: RouterConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub quotas: Vec<QuotaConfig>,
    pub execution: ExecutionSettings,
}

impl GovernanceConfig {
    /// Load from a file; `.json` is parsed as JSON, anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read config: {}", e),
                ErrorContext::new()
                    .with_field_path(path.display().to_string())
                    .with_source("governance_config"),
            )
        })?;
        let is_json = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let config = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_yaml_str(&content)?
        };
        info!(
            path = %path.display(),
            models = config.catalog.len(),
            quotas = config.quotas.len(),
            "governance config loaded"
        );
        Ok(config)
    }

    /// Load from the file named by `AI_GOVERNANCE_CONFIG`.
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::load(path.trim()),
            _ => Err(Error::configuration_with_context(
                format!("{} is not set", CONFIG_ENV_VAR),
                ErrorContext::new()
                    .with_field_path(CONFIG_ENV_VAR)
                    .with_source("governance_config"),
            )),
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.pricing_catalog()?;
        self.router.validate()?;

        for (i, entry) in self.catalog.iter().enumerate() {
            if let Some(q) = entry.quality_score {
                if !q.is_finite() {
                    return Err(Error::configuration_with_context(
                        "quality score must be finite",
                        ErrorContext::new()
                            .with_field_path(format!("catalog[{}].quality_score", i))
                            .with_source("governance_config"),
                    ));
                }
            }
        }

        if self.circuit_breaker.failure_threshold == 0 {
            return Err(Error::configuration_with_context(
                "failure threshold must be >= 1",
                ErrorContext::new()
                    .with_field_path("circuit_breaker.failure_threshold")
                    .with_source("governance_config"),
            ));
        }

        let mut names = HashSet::new();
        for (i, quota) in self.quotas.iter().enumerate() {
            if quota.name.trim().is_empty() || !names.insert(quota.name.as_str()) {
                return Err(Error::configuration_with_context(
                    format!("quota name '{}' is empty or duplicated", quota.name),
                    ErrorContext::new()
                        .with_field_path(format!("quotas[{}].name", i))
                        .with_source("governance_config"),
                ));
            }
            if quota.limit.is_some_and(|l| l.is_sign_negative() && !l.is_zero()) {
                return Err(Error::configuration_with_context(
                    "quota limit must be >= 0",
                    ErrorContext::new()
                        .with_field_path(format!("quotas[{}].limit", i))
                        .with_source("governance_config"),
                ));
            }
        }
        Ok(())
    }

    pub fn pricing_catalog(&self) -> Result<PricingCatalog> {
        PricingCatalog::new(self.catalog.iter().map(CatalogEntry::pricing).collect())
    }

    pub fn profiles(&self) -> HashMap<String, ModelProfile> {
        self.catalog
            .iter()
            .filter_map(|e| e.profile(&self.router).map(|p| (e.pricing().id(), p)))
            .collect()
    }

    pub fn build_router(&self) -> Result<IntelligentRouter> {
        let engine = PricingEngine::new(Arc::new(self.pricing_catalog()?));
        Ok(IntelligentRouter::new(engine, self.router.clone()).with_profiles(self.profiles()))
    }

    /// Wire every component into a coordinator. The spend sink defaults to a no-op.
    pub fn build(&self, clock: Arc<dyn Clock>) -> Result<ExecutionCoordinator> {
        self.validate()?;
        let router = self.build_router()?;
        let quotas = Arc::new(QuotaManager::with_quotas(self.quotas.clone(), Arc::clone(&clock))?);
        let breakers = Arc::new(CircuitBreakerRegistry::new(
            self.circuit_breaker.clone(),
            Arc::clone(&clock),
        ));
        Ok(ExecutionCoordinator::new(router, quotas, breakers, clock)
            .with_attempt_timeout(self.execution.attempt_timeout()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::system_clock;
    use crate::quota::{BreachAction, QuotaWindow};
    use rust_decimal_macros::dec;

    const YAML: &str = r#"
catalog:
  - backend: acme
    model: small
    modality: text
    input_price_per_million: "0.5"
    output_price_per_million: 2
    context_limit: 8000
    expected_latency_ms: 300
  - backend: acme
    model: draw
    modality: image
    input_price_per_million: 10
    output_price_per_million: 10
circuit_breaker:
  failure_threshold: 3
quotas:
  - name: global
    limit: "100"
    window: month
  - name: "caller:bob"
    window: day
    action: warn_only
execution:
  attempt_timeout_ms: 1500
"#;

    #[test]
    fn test_yaml_defaults_and_values() {
        let cfg = GovernanceConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(cfg.catalog.len(), 2);
        assert_eq!(cfg.catalog[0].input_price_per_million, dec!(0.5));
        assert_eq!(cfg.catalog[1].context_limit, u64::MAX);
        assert_eq!(cfg.router.chain_depth, 2);
        assert_eq!(cfg.circuit_breaker.failure_threshold, 3);
        assert_eq!(cfg.circuit_breaker.recovery_timeout, Duration::from_secs(30));
        assert_eq!(cfg.quotas[0].action, BreachAction::HardStop);
        assert_eq!(cfg.quotas[0].window, QuotaWindow::Month);
        assert_eq!(cfg.quotas[1].limit, None);
        assert_eq!(cfg.execution.attempt_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_profiles_fill_from_router_defaults() {
        let cfg = GovernanceConfig::from_yaml_str(YAML).unwrap();
        let profiles = cfg.profiles();
        assert_eq!(profiles.len(), 1);
        let p = profiles["acme/small"];
        assert_eq!(p.expected_latency_ms, 300);
        assert_eq!(p.quality_score, 5.0);
    }

    #[test]
    fn test_build_wires_components() {
        let cfg = GovernanceConfig::from_yaml_str(YAML).unwrap();
        let coordinator = cfg.build(system_clock()).unwrap();
        let status = coordinator.status().unwrap();
        assert_eq!(status.quotas.len(), 2);
        assert!(status.breakers.is_empty());
        assert_eq!(coordinator.router().engine().catalog().len(), 2);
    }

    #[test]
    fn test_rejects_zero_threshold() {
        let err = GovernanceConfig::from_yaml_str("circuit_breaker:\n  failure_threshold: 0\n").unwrap_err();
        assert!(err.is_configuration_error());
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("circuit_breaker.failure_threshold")
        );
    }

    #[test]
    fn test_rejects_duplicate_quota_names() {
        let yaml = "quotas:\n  - { name: global, window: day }\n  - { name: global, window: hour }\n";
        let err = GovernanceConfig::from_yaml_str(yaml).unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("quotas[1].name")
        );
    }

    #[test]
    fn test_json_round_trip() {
        let cfg = GovernanceConfig::from_yaml_str(YAML).unwrap();
        let json = serde_json::to_string(&cfg).unwrap();
        let back = GovernanceConfig::from_json_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
