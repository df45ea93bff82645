//! Selection strategies and the static tables they rank by.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Model selection strategies. Each is a total order over candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// Ascending estimated cost.
    CostOptimized,
    /// Ascending configured latency.
    LatencyOptimized,
    /// Descending configured quality.
    QualityOptimized,
    /// Descending weighted blend of the three.
    Balanced,
}

impl RoutingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingStrategy::CostOptimized => "cost_optimized",
            RoutingStrategy::LatencyOptimized => "latency_optimized",
            RoutingStrategy::QualityOptimized => "quality_optimized",
            RoutingStrategy::Balanced => "balanced",
        }
    }
}

impl Default for RoutingStrategy {
    fn default() -> Self {
        RoutingStrategy::Balanced
    }
}

impl fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutingStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "cost" | "cost_optimized" | "cheapest" => Ok(RoutingStrategy::CostOptimized),
            "latency" | "latency_optimized" | "fastest" => Ok(RoutingStrategy::LatencyOptimized),
            "quality" | "quality_optimized" | "best" => Ok(RoutingStrategy::QualityOptimized),
            "balanced" => Ok(RoutingStrategy::Balanced),
            other => Err(Error::validation_with_context(
                format!("unknown routing strategy '{}'", other),
                ErrorContext::new()
                    .with_details("expected one of: cost, latency, quality, balanced")
                    .with_source("routing_strategy"),
            )),
        }
    }
}

/// Static latency/quality profile for one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Expected end-to-end latency in milliseconds.
    pub expected_latency_ms: u64,
    /// Quality on a 0..=10 scale.
    pub quality_score: f64,
}

impl ModelProfile {
    pub fn new(expected_latency_ms: u64, quality_score: f64) -> Self {
        Self {
            expected_latency_ms,
            quality_score,
        }
    }

    /// Latency in seconds, floored at one millisecond.
    pub fn latency_secs(&self) -> f64 {
        self.expected_latency_ms.max(1) as f64 / 1000.0
    }
}

/// Weights of the balanced score
/// `cost * 1/(credits+1) + latency * 1/secs + quality * score/10`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancedWeights {
    pub cost: f64,
    pub latency: f64,
    pub quality: f64,
}

impl Default for BalancedWeights {
    fn default() -> Self {
        Self {
            cost: 0.4,
            latency: 0.3,
            quality: 0.3,
        }
    }
}

impl BalancedWeights {
    pub fn score(&self, cost_credits: f64, profile: &ModelProfile) -> f64 {
        self.cost * (1.0 / (cost_credits.max(0.0) + 1.0))
            + self.latency * (1.0 / profile.latency_secs())
            + self.quality * (profile.quality_score / 10.0)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for (name, w) in [
            ("cost", self.cost),
            ("latency", self.latency),
            ("quality", self.quality),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::configuration_with_context(
                    "balanced weight must be finite and >= 0",
                    ErrorContext::new()
                        .with_field_path(format!("router.weights.{}", name))
                        .with_details(w.to_string())
                        .with_source("router_config"),
                ));
            }
        }
        Ok(())
    }
}
