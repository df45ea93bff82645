//! Algebraic properties of cost estimates over deterministic unit grids.

use ai_governance::pricing::{Modality, ModelPricing, PricingCatalog, PricingEngine, COST_SCALE};
use ai_governance::Error;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

const MODELS: [&str; 4] = ["acme/tiny", "acme/odd", "zeta/big", "zeta/free"];

fn engine() -> PricingEngine {
    let catalog = PricingCatalog::new(vec![
        ModelPricing::new("acme", "tiny", Modality::Text, dec!(0.15), dec!(0.6)),
        ModelPricing::new("acme", "odd", Modality::Text, dec!(0.333333), dec!(1.7)),
        ModelPricing::new("zeta", "big", Modality::Text, dec!(15), dec!(75)),
        ModelPricing::new("zeta", "free", Modality::Text, Decimal::ZERO, Decimal::ZERO),
        ModelPricing::new("pix", "draw", Modality::Image, dec!(40), dec!(40)),
    ])
    .unwrap();
    PricingEngine::new(Arc::new(catalog))
}

fn grid() -> Vec<i64> {
    vec![0, 1, 2, 3, 7, 10, 99, 128, 1000, 4096, 33_333, 1_000_000, 7_777_777]
}

fn tolerance(steps: i64) -> Decimal {
    Decimal::new(steps, COST_SCALE)
}

fn cost(e: &PricingEngine, model: &str, i: i64, o: i64) -> Decimal {
    e.estimate(model, i, o).unwrap().total_cost
}

#[test]
fn cost_is_never_negative() {
    let e = engine();
    for m in MODELS {
        for &i in &grid() {
            for &o in &grid() {
                assert!(cost(&e, m, i, o) >= Decimal::ZERO, "{m} {i} {o}");
            }
        }
    }
}

#[test]
fn cost_is_monotone_in_each_unit_count() {
    let e = engine();
    let g = grid();
    for m in MODELS {
        for &fixed in &g {
            for pair in g.windows(2) {
                let (lo, hi) = (pair[0], pair[1]);
                assert!(cost(&e, m, lo, fixed) <= cost(&e, m, hi, fixed), "{m} input {lo}->{hi}");
                assert!(cost(&e, m, fixed, lo) <= cost(&e, m, fixed, hi), "{m} output {lo}->{hi}");
            }
        }
    }
}

#[test]
fn cost_is_additive_when_a_request_is_split() {
    let e = engine();
    for m in MODELS {
        for &i in &grid() {
            for &o in &grid() {
                let (i1, o1) = (i / 3, o / 2);
                let (i2, o2) = (i - i1, o - o1);
                let whole = cost(&e, m, i, o);
                let parts = cost(&e, m, i1, o1) + cost(&e, m, i2, o2);
                assert!((whole - parts).abs() <= tolerance(2), "{m} {i} {o}: {whole} vs {parts}");
            }
        }
    }
}

#[test]
fn cost_scales_linearly() {
    let e = engine();
    for m in MODELS {
        for &i in &[0, 1, 3, 250, 4096] {
            for &o in &[0, 1, 5, 999] {
                let base = cost(&e, m, i, o);
                for n in [1i64, 2, 3, 10, 97] {
                    let scaled = cost(&e, m, n * i, n * o);
                    let expected = base * Decimal::from(n);
                    assert!(
                        (scaled - expected).abs() <= tolerance(n),
                        "{m} x{n}: {scaled} vs {expected}"
                    );
                }
            }
        }
    }
}

#[test]
fn estimate_matches_hand_computation() {
    let e = engine();
    // 1000 * 0.15 / 1e6 + 2000 * 0.6 / 1e6
    assert_eq!(cost(&e, "acme/tiny", 1000, 2000), dec!(0.00135));
    assert_eq!(cost(&e, "zeta/big", 1_000_000, 1_000_000), dec!(90));
}

#[test]
fn cheapest_is_head_of_compare() {
    let e = engine();
    for &i in &grid() {
        for &o in &grid() {
            let ranked = e.compare(Modality::Text, i, o, None).unwrap();
            assert_eq!(ranked.len(), 4);
            assert!(ranked.windows(2).all(|w| w[0].total_cost <= w[1].total_cost));
            assert_eq!(e.cheapest(Modality::Text, i, o).unwrap(), ranked[0]);
        }
    }
}

#[test]
fn errors_are_typed() {
    let e = engine();
    assert!(matches!(
        e.estimate("nope/none", 1, 1),
        Err(Error::UnknownModel { model_id }) if model_id == "nope/none"
    ));
    assert!(matches!(
        e.estimate("acme/tiny", -1, 0),
        Err(Error::InvalidUnits { input: -1, output: 0 })
    ));
    assert!(matches!(
        e.cheapest(Modality::Video, 1, 1),
        Err(Error::NoCandidates { .. })
    ));
}

#[test]
fn compare_with_candidates_filters_modality() {
    let e = engine();
    let ranked = e
        .compare(Modality::Text, 1000, 0, Some(&["zeta/big", "pix/draw", "acme/tiny"]))
        .unwrap();
    let ids: Vec<&str> = ranked.iter().map(|r| r.model_id.as_str()).collect();
    assert_eq!(ids, vec!["acme/tiny", "zeta/big"]);
}
