//! Cobuy: "customers who bought X also bought Y" recommendations
//!
//! Purchases are bucketed into one basket per customer per calendar month,
//! mined for association rules, and queried by item.

pub mod basket;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod miner;
pub mod recommend;
pub mod report;

// Re-export public items for easier access
pub use basket::{build_occurrence_matrix, BasketKey, ItemKey, OccurrenceMatrix};
pub use cli::Args;
pub use config::{CobuyConfig, LoadOptions};
pub use data::{load_events, Event};
pub use error::{Error, Result};
pub use miner::{Apriori, Metric, Rule, RuleMiner, RuleTable, Thresholds};
pub use recommend::{recommend, recommend_from_frame};
