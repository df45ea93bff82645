//! Benchmarks for the governance hot path
//!
//! This benchmark measures:
//! - Routing decisions per strategy over catalogs of increasing size
//! - Quota reservation and rollback
//! - One full coordinated execution against an in-process backend

use ai_governance::clock::system_clock;
use ai_governance::execution::{BackendResponse, ExecutionRequest, FnInvoker};
use ai_governance::pricing::{Modality, ModelPricing, PricingCatalog, PricingEngine};
use ai_governance::quota::{BreachAction, QuotaConfig, QuotaManager, QuotaWindow};
use ai_governance::routing::{IntelligentRouter, ModelProfile, RouterConfig, RoutingStrategy};
use ai_governance::GovernanceConfig;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use futures::FutureExt;
use rust_decimal::Decimal;
use std::sync::Arc;

fn router(models: usize) -> IntelligentRouter {
    let entries = (0..models)
        .map(|i| {
            ModelPricing::new(
                &format!("backend{}", i % 7),
                &format!("model{}", i),
                Modality::Text,
                Decimal::new((i as i64 % 13) * 25 + 10, 2),
                Decimal::new((i as i64 % 11) * 100 + 40, 2),
            )
        })
        .collect();
    let catalog = PricingCatalog::new(entries).expect("catalog");
    let mut router = IntelligentRouter::new(PricingEngine::new(Arc::new(catalog)), RouterConfig::default());
    for i in 0..models {
        router = router.with_profile(
            &format!("backend{}/model{}", i % 7, i),
            ModelProfile::new(200 + (i as u64 * 37) % 3000, (i % 10) as f64),
        );
    }
    router
}

fn bench_route(c: &mut Criterion) {
    let mut group = c.benchmark_group("route");
    for models in [4usize, 32, 256] {
        let r = router(models);
        group.throughput(Throughput::Elements(models as u64));
        for strategy in [RoutingStrategy::CostOptimized, RoutingStrategy::Balanced] {
            group.bench_with_input(BenchmarkId::new(strategy.as_str(), models), &r, |b, r| {
                b.iter(|| {
                    r.route(Modality::Text, strategy, black_box(12_000), black_box(800))
                        .expect("route")
                })
            });
        }
    }
    group.finish();
}

fn bench_reserve(c: &mut Criterion) {
    let mut group = c.benchmark_group("quota");
    let manager = QuotaManager::with_quotas(
        vec![
            QuotaConfig::new("global", None, QuotaWindow::Month, BreachAction::HardStop),
            QuotaConfig::new("caller:bench", None, QuotaWindow::Day, BreachAction::HardStop),
            QuotaConfig::new("project:bench", None, QuotaWindow::Hour, BreachAction::WarnOnly),
        ],
        system_clock(),
    )
    .expect("quotas");
    let scopes: Vec<String> = ["global", "caller:bench", "project:bench"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    group.bench_function("check_and_reserve_then_rollback", |b| {
        b.iter(|| {
            let reservation = manager
                .check_and_reserve(black_box(Decimal::new(125, 3)), &scopes)
                .expect("reserve")
                .into_result()
                .expect("reserved");
            manager.rollback(&reservation).expect("rollback");
        })
    });
    group.finish();
}

fn bench_execute(c: &mut Criterion) {
    let yaml = r#"
catalog:
  - { backend: a, model: small, modality: text, input_price_per_million: 1, output_price_per_million: 2 }
  - { backend: b, model: large, modality: text, input_price_per_million: 5, output_price_per_million: 9 }
quotas:
  - { name: global, window: month }
"#;
    let coordinator = GovernanceConfig::from_yaml_str(yaml)
        .expect("config")
        .build(system_clock())
        .expect("build");
    let invoker = FnInvoker::new(|_, _| async { Ok(BackendResponse::new(serde_json::Value::Null)) }.boxed());
    let rt = tokio::runtime::Runtime::new().expect("runtime");

    c.bench_function("execute_success", |b| {
        b.to_async(&rt).iter(|| async {
            let request = ExecutionRequest::new(Modality::Text, RoutingStrategy::CostOptimized, 1000, 100)
                .with_scope("global");
            coordinator.execute(request, &invoker).await.expect("execute")
        })
    });
}

criterion_group!(benches, bench_route, bench_reserve, bench_execute);
criterion_main!(benches);
