//! Strategy-driven backend selection.
//!
//! This module is **pure logic**: it performs no network calls and holds no
//! mutable state. Given a modality, unit counts and a [`RoutingStrategy`], the
//! [`IntelligentRouter`] ranks every catalog entry of that modality and returns a
//! [`RoutingDecision`]: one primary candidate plus a short, duplicate-free
//! fallback chain.
//!
//! Design note:
//! - Latency and quality come from a static [`ModelProfile`] table loaded with the
//!   catalog; nothing here is measured live.
//! - The balanced weights are configuration ([`BalancedWeights`]), not constants.

mod router;
mod strategy;

pub use router::{IntelligentRouter, RouterConfig, RoutingDecision, DEFAULT_CHAIN_DEPTH};
pub use strategy::{BalancedWeights, ModelProfile, RoutingStrategy};
