//! Cobuy: service recommendations from monthly customer baskets
//!
//! This is the main entrypoint that orchestrates loading, basket building,
//! rule mining, and the recommendation lookup.

use anyhow::{Context, Result};
use clap::Parser;
use cobuy::config::LogFormat;
use cobuy::{
    build_occurrence_matrix, load_events, recommend, report, Apriori, Args, CobuyConfig, ItemKey,
    RuleMiner,
};
use std::time::Instant;
use tracing::{info, Level};

/// Configured log level; anything unparseable falls back to `INFO`
fn log_level(config: &CobuyConfig) -> Level {
    config.logging.level.parse::<Level>().unwrap_or(Level::INFO)
}

fn init_logging(config: &CobuyConfig) {
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level(config))
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.count == 0 {
        anyhow::bail!("--count must be at least 1");
    }

    let config = CobuyConfig::load(args.load_options()).context("loading configuration")?;
    init_logging(&config);

    run(&args, &config)
}

fn run(args: &Args, config: &CobuyConfig) -> Result<()> {
    let start_time = Instant::now();

    // Step 1: Load purchases and bucket them into monthly baskets
    let events = load_events(&args.input)
        .with_context(|| format!("loading purchases from {}", args.input.display()))?;
    let matrix = build_occurrence_matrix(&events);

    // Step 2: Mine association rules
    let thresholds = config.mining.thresholds();
    info!(
        min_support = thresholds.min_support,
        metric = %thresholds.metric,
        min_threshold = thresholds.min_threshold,
        max_len = ?config.mining.max_len,
        "mining rules"
    );
    let miner = Apriori::with_max_len(config.mining.max_len);
    let rules = miner.mine(&matrix, &thresholds)?;

    report::print_mining_report(&matrix, &rules, args.show_rules);

    if let Some(user) = &args.user {
        println!("\n=== Baskets for customer {user} ===");
        let baskets = matrix.baskets_for_user(user);
        if baskets.is_empty() {
            println!("  (no purchases)");
        }
        for basket in baskets {
            let items: Vec<&str> = matrix.basket_items(basket).into_iter().map(ItemKey::as_str).collect();
            println!("  {basket}: {}", items.join(", "));
        }
    }

    // Step 3: Recommendation lookup
    if let Some(item) = &args.item {
        let item = ItemKey::new(item.as_str());
        let recommendations = recommend(&rules, &item, args.count);

        println!("\n=== Recommendations for {item} ===");
        if recommendations.is_empty() {
            println!("  (no rule has {item} among its antecedents)");
        }
        for (rank, recommended) in recommendations.iter().enumerate() {
            println!("  {}. {recommended}", rank + 1);
        }
    }

    info!(elapsed_secs = start_time.elapsed().as_secs_f64(), "pipeline complete");
    Ok(())
}
