use super::strategy::{BalancedWeights, ModelProfile, RoutingStrategy};
use crate::pricing::{CostEstimate, Modality, PricingEngine};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

pub const DEFAULT_CHAIN_DEPTH: usize = 2;

/// Router configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Maximum fallback candidates after the primary.
    pub chain_depth: usize,
    pub weights: BalancedWeights,
    /// Latency assumed for models without a profile.
    pub default_latency_ms: u64,
    /// Quality assumed for models without a profile.
    pub default_quality: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            chain_depth: DEFAULT_CHAIN_DEPTH,
            weights: BalancedWeights::default(),
            default_latency_ms: 1000,
            default_quality: 5.0,
        }
    }
}

impl RouterConfig {
    pub fn with_chain_depth(mut self, depth: usize) -> Self {
        self.chain_depth = depth;
        self
    }

    pub fn with_weights(mut self, weights: BalancedWeights) -> Self {
        self.weights = weights;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        if !self.default_quality.is_finite() {
            return Err(Error::configuration_with_context(
                "default quality must be finite",
                ErrorContext::new()
                    .with_field_path("router.default_quality")
                    .with_source("router_config"),
            ));
        }
        Ok(())
    }
}

/// Outcome of routing one request. Created per request, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub primary: String,
    /// Ordered fallbacks; never contains the primary or duplicates.
    pub fallback_chain: Vec<String>,
    /// Estimate for the primary only.
    pub estimated_cost: CostEstimate,
    pub strategy: RoutingStrategy,
    pub reasoning: String,
}

impl RoutingDecision {
    /// Primary followed by the fallback chain.
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.fallback_chain.iter().map(|s| s.as_str()))
    }
}

/// Ranks catalog entries by strategy and produces [`RoutingDecision`]s.
#[derive(Debug, Clone)]
pub struct IntelligentRouter {
    engine: PricingEngine,
    profiles: HashMap<String, ModelProfile>,
    config: RouterConfig,
}

impl IntelligentRouter {
    pub fn new(engine: PricingEngine, config: RouterConfig) -> Self {
        Self {
            engine,
            profiles: HashMap::new(),
            config,
        }
    }

    pub fn with_profile(mut self, model_id: &str, profile: ModelProfile) -> Self {
        self.profiles.insert(model_id.to_string(), profile);
        self
    }

    pub fn with_profiles(mut self, profiles: HashMap<String, ModelProfile>) -> Self {
        self.profiles.extend(profiles);
        self
    }

    pub fn engine(&self) -> &PricingEngine {
        &self.engine
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Effective profile: configured, or the defaults.
    pub fn profile(&self, model_id: &str) -> ModelProfile {
        self.profiles.get(model_id).copied().unwrap_or(ModelProfile {
            expected_latency_ms: self.config.default_latency_ms,
            quality_score: self.config.default_quality,
        })
    }

    /// Full ranking of `modality` candidates under `strategy`, best first.
    pub fn rank(
        &self,
        modality: Modality,
        strategy: RoutingStrategy,
        input_units: i64,
        output_units: i64,
    ) -> Result<Vec<String>> {
        let ranked: Vec<String> = match strategy {
            RoutingStrategy::CostOptimized => self
                .engine
                .compare(modality, input_units, output_units, None)?
                .into_iter()
                .map(|e| e.model_id)
                .collect(),
            RoutingStrategy::LatencyOptimized => {
                let mut ids = self.ids(modality);
                ids.sort_by_key(|id| self.profile(id).expected_latency_ms);
                ids
            }
            RoutingStrategy::QualityOptimized => {
                let mut ids = self.ids(modality);
                ids.sort_by(|a, b| {
                    self.profile(b)
                        .quality_score
                        .partial_cmp(&self.profile(a).quality_score)
                        .unwrap_or(Ordering::Equal)
                });
                ids
            }
            RoutingStrategy::Balanced => {
                let mut scored = self
                    .ids(modality)
                    .into_iter()
                    .map(|id| {
                        let cost = self.engine.estimate(&id, input_units, output_units)?;
                        let score = self
                            .config
                            .weights
                            .score(cost.total_as_f64(), &self.profile(&id));
                        Ok((id, score))
                    })
                    .collect::<Result<Vec<(String, f64)>>>()?;
                scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
                scored.into_iter().map(|(id, _)| id).collect()
            }
        };
        Ok(ranked)
    }

    /// Route one request.
    pub fn route(
        &self,
        modality: Modality,
        strategy: RoutingStrategy,
        input_units: i64,
        output_units: i64,
    ) -> Result<RoutingDecision> {
        let ranked = self.rank(modality, strategy, input_units, output_units)?;
        let mut iter = ranked.into_iter();
        let primary = iter.next().ok_or_else(|| Error::NoCandidates {
            modality: modality.to_string(),
        })?;

        let mut fallback_chain: Vec<String> = Vec::with_capacity(self.config.chain_depth);
        for id in iter {
            if fallback_chain.len() >= self.config.chain_depth {
                break;
            }
            if id != primary && !fallback_chain.contains(&id) {
                fallback_chain.push(id);
            }
        }

        let estimated_cost = self.engine.estimate(&primary, input_units, output_units)?;
        let reasoning = format!(
            "{} picked {} for {} at {} credits; fallbacks [{}]",
            strategy,
            primary,
            modality,
            estimated_cost.total_cost.normalize(),
            fallback_chain.join(", ")
        );
        debug!(
            primary = primary.as_str(),
            strategy = strategy.as_str(),
            fallbacks = fallback_chain.len(),
            "routing decision"
        );

        Ok(RoutingDecision {
            primary,
            fallback_chain,
            estimated_cost,
            strategy,
            reasoning,
        })
    }

    fn ids(&self, modality: Modality) -> Vec<String> {
        self.engine
            .catalog()
            .by_modality(modality)
            .map(|p| p.id())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{ModelPricing, PricingCatalog};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn router(depth: usize) -> IntelligentRouter {
        let catalog = PricingCatalog::new(vec![
            ModelPricing::new("a", "mid", Modality::Text, dec!(2000), dec!(2000)),
            ModelPricing::new("b", "cheap", Modality::Text, dec!(1000), dec!(1000)),
            ModelPricing::new("c", "premium", Modality::Text, dec!(9000), dec!(9000)),
            ModelPricing::new("d", "fast", Modality::Text, dec!(5000), dec!(5000)),
            ModelPricing::new("e", "img", Modality::Image, dec!(1), dec!(1)),
        ])
        .unwrap();
        IntelligentRouter::new(
            PricingEngine::new(Arc::new(catalog)),
            RouterConfig::default().with_chain_depth(depth),
        )
        .with_profile("a/mid", ModelProfile::new(1500, 7.0))
        .with_profile("b/cheap", ModelProfile::new(3000, 5.0))
        .with_profile("c/premium", ModelProfile::new(4000, 9.5))
        .with_profile("d/fast", ModelProfile::new(200, 6.0))
    }

    #[test]
    fn test_cost_optimized() {
        let d = router(2)
            .route(Modality::Text, RoutingStrategy::CostOptimized, 1000, 0)
            .unwrap();
        assert_eq!(d.primary, "b/cheap");
        assert_eq!(d.fallback_chain, vec!["a/mid", "d/fast"]);
        assert_eq!(d.estimated_cost.total_cost, dec!(1));
        assert!(d.reasoning.contains("cost_optimized"));
    }

    #[test]
    fn test_latency_optimized() {
        let d = router(3)
            .route(Modality::Text, RoutingStrategy::LatencyOptimized, 10, 10)
            .unwrap();
        assert_eq!(d.primary, "d/fast");
        assert_eq!(d.fallback_chain, vec!["a/mid", "b/cheap", "c/premium"]);
    }

    #[test]
    fn test_quality_optimized() {
        let d = router(1)
            .route(Modality::Text, RoutingStrategy::QualityOptimized, 10, 10)
            .unwrap();
        assert_eq!(d.primary, "c/premium");
        assert_eq!(d.fallback_chain, vec!["a/mid"]);
    }

    #[test]
    fn test_balanced_prefers_fast_cheap_models() {
        // d/fast: 1/0.2 latency term dominates
        let d = router(2)
            .route(Modality::Text, RoutingStrategy::Balanced, 1000, 1000)
            .unwrap();
        assert_eq!(d.primary, "d/fast");
    }

    #[test]
    fn test_short_chain_not_padded() {
        let d = router(2)
            .route(Modality::Image, RoutingStrategy::CostOptimized, 1, 1)
            .unwrap();
        assert_eq!(d.primary, "e/img");
        assert!(d.fallback_chain.is_empty());
        assert_eq!(d.candidates().count(), 1);
    }

    #[test]
    fn test_no_candidates() {
        let err = router(2)
            .route(Modality::Audio, RoutingStrategy::Balanced, 1, 1)
            .unwrap_err();
        assert!(matches!(err, Error::NoCandidates { ref modality } if modality == "audio"));
    }

    #[test]
    fn test_invalid_units_propagate() {
        let err = router(2)
            .route(Modality::Text, RoutingStrategy::LatencyOptimized, -1, 0)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUnits { .. }));
    }

    #[test]
    fn test_unprofiled_model_uses_defaults() {
        let r = router(2);
        let p = r.profile("e/img");
        assert_eq!(p.expected_latency_ms, 1000);
        assert_eq!(p.quality_score, 5.0);
    }
}
