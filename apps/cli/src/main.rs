#![deny(warnings)]

//! Headless harness: loads bonus definitions and a state fixture, runs
//! verified turns, and prints the dashboard report.

use anyhow::{Context, Result};
use bonus_core::{validate_snapshot, StateSnapshot};
use bonus_engine::{dashboard, BonusEngine};
use bonus_registry::Registry;
use bonus_verify::{legacy::HardcodedRules, ParallelVerifier};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

struct Args {
    config: PathBuf,
    state: PathBuf,
    tolerance: Decimal,
    turns: u32,
    json: bool,
    promote_engine: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config: PathBuf::from("assets/bonuses/definitions.yaml"),
        state: PathBuf::from("assets/fixtures/state.json"),
        tolerance: Decimal::ZERO,
        turns: 1,
        json: false,
        promote_engine: false,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => {
                args.config = it.next().map(PathBuf::from).context("--config needs a path")?
            }
            "--state" => {
                args.state = it.next().map(PathBuf::from).context("--state needs a path")?
            }
            "--tolerance" => {
                args.tolerance = it
                    .next()
                    .context("--tolerance needs a value")?
                    .parse()
                    .context("--tolerance must be a number")?
            }
            "--turns" => {
                args.turns = it
                    .next()
                    .context("--turns needs a value")?
                    .parse()
                    .context("--turns must be an integer")?
            }
            "--json" => args.json = true,
            "--promote-engine" => args.promote_engine = true,
            _ => {}
        }
    }
    Ok(args)
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args()?;
    info!(
        git_sha = env!("GIT_SHA"),
        config = %args.config.display(),
        state = %args.state.display(),
        "starting bonus report harness"
    );

    let registry = Registry::load_path(&args.config)
        .with_context(|| format!("loading bonus definitions from {}", args.config.display()))?;
    let text = std::fs::read_to_string(&args.state)
        .with_context(|| format!("reading state fixture {}", args.state.display()))?;
    let mut snapshot: StateSnapshot =
        serde_json::from_str(&text).context("parsing state fixture")?;
    validate_snapshot(&snapshot)?;

    println!(
        "Registry OK | definitions: {} | bonus types: {} | tolerance: {}",
        registry.len(),
        registry.bonus_types().len(),
        args.tolerance
    );

    let engine = BonusEngine::new(Arc::new(registry));
    let mut verifier = ParallelVerifier::new(engine.clone(), HardcodedRules);
    if args.promote_engine {
        verifier.promote_engine();
    }

    let first_turn = snapshot.turn;
    for i in 0..args.turns {
        snapshot.turn = first_turn + u64::from(i);
        let result = verifier.verify_turn(&snapshot, args.tolerance);
        let committed: Vec<String> = result
            .committed
            .iter()
            .map(|(ty, value)| format!("{ty}={value}"))
            .collect();
        println!(
            "Turn {} | {:?} | authority: {:?} | {}",
            result.turn,
            result.status,
            result.authority,
            committed.join(" ")
        );
        for record in &result.mismatches {
            println!(
                "  mismatch {} | legacy: {} | engine: {} | delta: {}",
                record.bonus_type, record.legacy_value, record.engine_value, record.delta
            );
        }
    }

    let report = engine.all_bonuses(&snapshot);
    if args.json {
        println!("{}", dashboard::json_report(&report)?);
    } else {
        dashboard::render_text(&report, &mut std::io::stdout())?;
        let upkeep = engine.upkeep(&snapshot);
        if !upkeep.is_empty() {
            let parts: Vec<String> = upkeep
                .iter()
                .map(|(resource, value)| format!("{resource}: {value}"))
                .collect();
            println!("Upkeep | {}", parts.join(" | "));
        }
    }
    println!(
        "Verification | turns: {} | mismatch records: {}",
        args.turns,
        verifier.log().len()
    );

    Ok(())
}
