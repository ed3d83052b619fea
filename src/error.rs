use polars::prelude::PolarsError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not read transaction table: {0}")]
    Csv(#[from] PolarsError),
    #[error("row {row}: missing value in column `{column}`")]
    MissingField { column: &'static str, row: usize },
    #[error("row {row}: unrecognised timestamp `{value}`")]
    InvalidTimestamp { row: usize, value: String },
    #[error("rule table is missing required column `{0}`")]
    MissingColumn(&'static str),
    #[error("rule table column `{column}` must be {expected}")]
    InvalidColumn { column: &'static str, expected: &'static str },
    #[error("invalid threshold: {0}")]
    InvalidThreshold(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;
