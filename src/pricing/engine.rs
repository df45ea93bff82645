//! Cost estimation over a [`PricingCatalog`].

use super::catalog::{Modality, ModelPricing, PricingCatalog};
use crate::{Error, ErrorContext, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Fractional digits kept on every credit amount.
pub const COST_SCALE: u32 = 6;

/// Prices are quoted per this many units.
pub const UNITS_PER_PRICE: i64 = 1_000_000;

/// Round half-up to [`COST_SCALE`] digits.
pub fn round_credits(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(COST_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Estimated cost for one model and unit count, in credits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub model_id: String,
    pub input_units: u64,
    pub output_units: u64,
    pub input_cost: Decimal,
    pub output_cost: Decimal,
    pub total_cost: Decimal,
}

impl CostEstimate {
    /// Lossy view used by scoring formulas.
    pub fn total_as_f64(&self) -> f64 {
        self.total_cost.to_f64().unwrap_or(f64::MAX)
    }
}

impl fmt::Display for CostEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} credits ({})", self.total_cost.normalize(), self.model_id)
    }
}

/// Pure pricing functions over an immutable catalog.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    catalog: Arc<PricingCatalog>,
}

impl PricingEngine {
    pub fn new(catalog: Arc<PricingCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &PricingCatalog {
        &self.catalog
    }

    /// Estimate the cost of `input_units` in and `output_units` out on `model_id`.
    pub fn estimate(
        &self,
        model_id: &str,
        input_units: i64,
        output_units: i64,
    ) -> Result<CostEstimate> {
        let pricing = self
            .catalog
            .get(model_id)
            .ok_or_else(|| Error::UnknownModel {
                model_id: model_id.to_string(),
            })?;
        let (input, output) = check_units(input_units, output_units)?;
        price(pricing, input, output)
    }

    /// Estimates for candidates of `modality`, ascending by total cost.
    ///
    /// Without `candidates`, every catalog entry of that modality is considered.
    /// Named candidates of another modality are skipped; unknown ones are an error.
    /// Ties keep catalog order (or the caller's order when candidates are given).
    pub fn compare(
        &self,
        modality: Modality,
        input_units: i64,
        output_units: i64,
        candidates: Option<&[&str]>,
    ) -> Result<Vec<CostEstimate>> {
        let (input, output) = check_units(input_units, output_units)?;
        let pool: Vec<&ModelPricing> = match candidates {
            Some(ids) => {
                let mut pool = Vec::with_capacity(ids.len());
                for id in ids {
                    let pricing = self.catalog.get(id).ok_or_else(|| Error::UnknownModel {
                        model_id: id.to_string(),
                    })?;
                    if pricing.modality == modality
                        && !pool.iter().any(|p: &&ModelPricing| p.id() == pricing.id())
                    {
                        pool.push(pricing);
                    }
                }
                pool
            }
            None => self.catalog.by_modality(modality).collect(),
        };

        let mut estimates = pool
            .into_iter()
            .map(|p| price(p, input, output))
            .collect::<Result<Vec<_>>>()?;
        // stable: equal costs keep pool order
        estimates.sort_by(|a, b| a.total_cost.cmp(&b.total_cost));
        Ok(estimates)
    }

    /// The cheapest model for `modality`.
    pub fn cheapest(
        &self,
        modality: Modality,
        input_units: i64,
        output_units: i64,
    ) -> Result<CostEstimate> {
        self.compare(modality, input_units, output_units, None)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NoCandidates {
                modality: modality.to_string(),
            })
    }

    /// Whether the combined units fit the model's context limit.
    pub fn fits_context(&self, model_id: &str, input_units: i64, output_units: i64) -> Result<bool> {
        let pricing = self
            .catalog
            .get(model_id)
            .ok_or_else(|| Error::UnknownModel {
                model_id: model_id.to_string(),
            })?;
        let (input, output) = check_units(input_units, output_units)?;
        Ok(input.saturating_add(output) <= pricing.context_limit)
    }
}

fn check_units(input: i64, output: i64) -> Result<(u64, u64)> {
    if input < 0 || output < 0 {
        return Err(Error::InvalidUnits { input, output });
    }
    Ok((input as u64, output as u64))
}

fn price(pricing: &ModelPricing, input: u64, output: u64) -> Result<CostEstimate> {
    let per = Decimal::from(UNITS_PER_PRICE);
    let component = |units: u64, unit_price: Decimal| -> Result<Decimal> {
        Decimal::from(units)
            .checked_mul(unit_price)
            .map(|v| v / per)
            .ok_or_else(|| {
                Error::validation_with_context(
                    "cost overflow",
                    ErrorContext::new()
                        .with_details(format!("{} units on {}", units, pricing.id()))
                        .with_source("pricing_engine"),
                )
            })
    };
    let input_raw = component(input, pricing.input_price_per_million)?;
    let output_raw = component(output, pricing.output_price_per_million)?;

    Ok(CostEstimate {
        model_id: pricing.id(),
        input_units: input,
        output_units: output,
        input_cost: round_credits(input_raw),
        output_cost: round_credits(output_raw),
        total_cost: round_credits(input_raw + output_raw),
    })
}
