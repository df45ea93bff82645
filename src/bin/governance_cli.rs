//! governance-cli: inspect a governance config offline.
//!
//! Usage:
//!   governance-cli validate [<config>]
//!   governance-cli estimate <config> <model_id> <input_units> <output_units>
//!   governance-cli compare <config> <modality> <input_units> <output_units>
//!   governance-cli route <config> <modality> <strategy> <input_units> <output_units>

use ai_governance::pricing::Modality;
use ai_governance::routing::RoutingStrategy;
use ai_governance::GovernanceConfig;
use anyhow::{bail, Context};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "validate" => cmd_validate(&args[2..]),
        "estimate" => cmd_estimate(&args[2..]),
        "compare" => cmd_compare(&args[2..]),
        "route" => cmd_route(&args[2..]),
        "version" | "--version" | "-V" => {
            println!("governance-cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"governance-cli: inspect pricing, routing and quota configuration

USAGE:
    governance-cli <COMMAND> [ARGS]

COMMANDS:
    validate [<config>]                                   Load and validate a config file
    estimate <config> <model_id> <in> <out>               Cost of one model
    compare <config> <modality> <in> <out>                All models of a modality, cheapest first
    route <config> <modality> <strategy> <in> <out>       Routing decision for a request
    version                                               Show version information
    help                                                  Show this help message

ENVIRONMENT:
    AI_GOVERNANCE_CONFIG        Config file used by `validate` when no path is given
    RUST_LOG                    Log filter, e.g. ai_governance=debug"#
    );
}

fn load(path: &str) -> anyhow::Result<GovernanceConfig> {
    GovernanceConfig::load(path).with_context(|| format!("loading {path}"))
}

fn units(arg: &str, name: &str) -> anyhow::Result<i64> {
    arg.parse::<i64>()
        .with_context(|| format!("{name} must be an integer, got '{arg}'"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_validate(args: &[String]) -> anyhow::Result<()> {
    let config = match args.first() {
        Some(path) => load(path)?,
        None => GovernanceConfig::from_env()?,
    };
    let catalog = config.pricing_catalog()?;
    println!(
        "OK: {} models, {} quotas, chain depth {}, breaker threshold {}",
        catalog.len(),
        config.quotas.len(),
        config.router.chain_depth,
        config.circuit_breaker.failure_threshold
    );
    Ok(())
}

fn cmd_estimate(args: &[String]) -> anyhow::Result<()> {
    let [path, model, input, output] = args else {
        bail!("usage: governance-cli estimate <config> <model_id> <input_units> <output_units>");
    };
    let router = load(path)?.build_router()?;
    let estimate = router
        .engine()
        .estimate(model, units(input, "input_units")?, units(output, "output_units")?)?;
    print_json(&estimate)
}

fn cmd_compare(args: &[String]) -> anyhow::Result<()> {
    let [path, modality, input, output] = args else {
        bail!("usage: governance-cli compare <config> <modality> <input_units> <output_units>");
    };
    let modality: Modality = modality.parse()?;
    let router = load(path)?.build_router()?;
    let estimates = router.engine().compare(
        modality,
        units(input, "input_units")?,
        units(output, "output_units")?,
        None,
    )?;
    print_json(&estimates)
}

fn cmd_route(args: &[String]) -> anyhow::Result<()> {
    let [path, modality, strategy, input, output] = args else {
        bail!("usage: governance-cli route <config> <modality> <strategy> <input_units> <output_units>");
    };
    let modality: Modality = modality.parse()?;
    let strategy: RoutingStrategy = strategy.parse()?;
    let router = load(path)?.build_router()?;
    let decision = router.route(
        modality,
        strategy,
        units(input, "input_units")?,
        units(output, "output_units")?,
    )?;
    print_json(&decision)
}
