//! Pricing catalog and cost estimation.
//!
//! # Pricing Module
//!
//! Converts unit counts (tokens, images, audio seconds...) into a normalized cost
//! denominated in *credits*, using an immutable catalog loaded at process start.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ModelPricing`] | Per-million input/output prices, modality and context limit for one model |
//! | [`PricingCatalog`] | Ordered, immutable set of [`ModelPricing`] entries |
//! | [`PricingEngine`] | `estimate` / `compare` / `cheapest` over the catalog |
//! | [`CostEstimate`] | Rounded cost breakdown for one (model, units) pair |
//!
//! ## Example
//!
//! ```rust
//! use ai_governance::pricing::{Modality, ModelPricing, PricingCatalog, PricingEngine};
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! let catalog = PricingCatalog::new(vec![
//!     ModelPricing::new("acme", "small", Modality::Text, dec!(1000), dec!(2000)),
//!     ModelPricing::new("acme", "large", Modality::Text, dec!(3000), dec!(6000)),
//! ])?;
//! let engine = PricingEngine::new(Arc::new(catalog));
//!
//! let est = engine.estimate("acme/small", 1000, 0)?;
//! assert_eq!(est.total_cost, dec!(1));
//!
//! let cheapest = engine.cheapest(Modality::Text, 1000, 500)?;
//! assert_eq!(cheapest.model_id, "acme/small");
//! # Ok::<(), ai_governance::Error>(())
//! ```
//!
//! ## Rounding
//!
//! Costs are rounded half-up to [`COST_SCALE`] fractional digits, once, on the
//! total. Estimates are therefore additive and linear within `10^-COST_SCALE`.

mod catalog;
mod engine;

pub use catalog::{backend_of, Modality, ModelPricing, PricingCatalog};
pub use engine::{round_credits, CostEstimate, PricingEngine, COST_SCALE, UNITS_PER_PRICE};
