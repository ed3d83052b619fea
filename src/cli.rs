//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;

use crate::config::{ConfigOverrides, LoadOptions};
use crate::miner::Metric;

/// Service recommendations from association rules over monthly customer baskets
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the purchase CSV (UserId, ServiceId, CategoryId, CreateDate)
    #[arg(short, long, default_value = "armut_data.csv")]
    pub input: PathBuf,

    /// Item to recommend for, as serviceId_categoryId (e.g. 2_0)
    #[arg(short = 'q', long)]
    pub item: Option<String>,

    /// Number of recommendations to return
    #[arg(short = 'n', long, default_value = "1")]
    pub count: usize,

    /// Minimum fraction of baskets an itemset must appear in
    #[arg(long)]
    pub min_support: Option<f64>,

    /// Metric the rule threshold applies to
    /// (support, confidence, lift, leverage, conviction)
    #[arg(long, value_parser = parse_metric)]
    pub metric: Option<Metric>,

    /// Minimum metric value for a rule to be kept
    #[arg(long)]
    pub min_threshold: Option<f64>,

    /// Largest itemset size to mine
    #[arg(long)]
    pub max_len: Option<usize>,

    /// Print the N highest-lift rules
    #[arg(long, default_value = "0")]
    pub show_rules: usize,

    /// Show the monthly baskets of one customer
    #[arg(long)]
    pub user: Option<String>,

    /// Configuration file (defaults to ./cobuy.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_metric(value: &str) -> Result<Metric, String> {
    value.parse::<Metric>().map_err(|error| error.to_string())
}

impl Args {
    /// Configuration load options carrying the flags given on the command line
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                min_support: self.min_support,
                metric: self.metric,
                min_threshold: self.min_threshold,
                max_len: self.max_len,
                log_level: self.verbose.then(|| "debug".to_string()),
            },
        }
    }
}
