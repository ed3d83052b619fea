//! Mining and logging configuration
//!
//! Values are resolved in order: built-in defaults, then a TOML file, then
//! `COBUY_*` environment variables, then explicit overrides from the CLI.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::miner::{Metric, Thresholds};

pub const DEFAULT_CONFIG_FILE: &str = "cobuy.toml";

#[derive(Clone, Debug, PartialEq)]
pub struct CobuyConfig {
    pub mining: MiningConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MiningConfig {
    /// Minimum fraction of baskets an itemset must appear in
    pub min_support: f64,
    /// Metric the rule filter is applied to
    pub metric: Metric,
    /// Minimum value of `metric` for a rule to be kept
    pub min_threshold: f64,
    /// Largest itemset size to enumerate; unbounded when `None`
    pub max_len: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub min_support: Option<f64>,
    pub metric: Option<Metric>,
    pub min_threshold: Option<f64>,
    pub max_len: Option<usize>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigPatch {
    mining: Option<MiningPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MiningPatch {
    min_support: Option<f64>,
    metric: Option<Metric>,
    min_threshold: Option<f64>,
    max_len: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl Default for CobuyConfig {
    fn default() -> Self {
        Self {
            mining: MiningConfig {
                min_support: 0.01,
                metric: Metric::Support,
                min_threshold: 0.01,
                max_len: None,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl MiningConfig {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            min_support: self.min_support,
            metric: self.metric,
            min_threshold: self.min_threshold,
        }
    }
}

impl CobuyConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        Self::load_with_env(options, |key| env::var(key).ok())
    }

    /// Same as [`CobuyConfig::load`] with environment lookups routed through `lookup`.
    pub fn load_with_env<F>(options: LoadOptions, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = resolve_config_path(options.config_path.as_deref()) {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides(&lookup)?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(mining) = patch.mining {
            if let Some(min_support) = mining.min_support {
                self.mining.min_support = min_support;
            }
            if let Some(metric) = mining.metric {
                self.mining.metric = metric;
            }
            if let Some(min_threshold) = mining.min_threshold {
                self.mining.min_threshold = min_threshold;
            }
            if let Some(max_len) = mining.max_len {
                self.mining.max_len = Some(max_len);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides<F>(&mut self, lookup: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("COBUY_MIN_SUPPORT") {
            self.mining.min_support = parse_f64("COBUY_MIN_SUPPORT", &value)?;
        }
        if let Some(value) = lookup("COBUY_METRIC") {
            self.mining.metric = value.parse()?;
        }
        if let Some(value) = lookup("COBUY_MIN_THRESHOLD") {
            self.mining.min_threshold = parse_f64("COBUY_MIN_THRESHOLD", &value)?;
        }
        if let Some(value) = lookup("COBUY_MAX_LEN") {
            self.mining.max_len = Some(parse_usize("COBUY_MAX_LEN", &value)?);
        }
        if let Some(value) = lookup("COBUY_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = lookup("COBUY_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(min_support) = overrides.min_support {
            self.mining.min_support = min_support;
        }
        if let Some(metric) = overrides.metric {
            self.mining.metric = metric;
        }
        if let Some(min_threshold) = overrides.min_threshold {
            self.mining.min_threshold = min_threshold;
        }
        if let Some(max_len) = overrides.max_len {
            self.mining.max_len = Some(max_len);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_mining(&self.mining)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    toml::from_str::<ConfigPatch>(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn validate_mining(mining: &MiningConfig) -> Result<(), ConfigError> {
    if !(mining.min_support > 0.0 && mining.min_support <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "mining.min_support must be in (0, 1], got {}",
            mining.min_support
        )));
    }

    if !mining.min_threshold.is_finite() {
        return Err(ConfigError::Validation(
            "mining.min_threshold must be a finite number".to_string(),
        ));
    }

    if mining.max_len == Some(0) {
        return Err(ConfigError::Validation(
            "mining.max_len must be at least 1 when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    if !["trace", "debug", "info", "warn", "error"].contains(&level.as_str()) {
        return Err(ConfigError::Validation(format!(
            "logging.level must be one of trace|debug|info|warn|error, got `{}`",
            logging.level
        )));
    }
    Ok(())
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file
    }

    fn options_for(file: &NamedTempFile) -> LoadOptions {
        LoadOptions { config_path: Some(file.path().to_path_buf()), ..LoadOptions::default() }
    }

    #[test]
    fn defaults_match_reference_thresholds() {
        let config = CobuyConfig::default();
        assert_eq!(config.mining.min_support, 0.01);
        assert_eq!(config.mining.metric, Metric::Support);
        assert_eq!(config.mining.min_threshold, 0.01);
        assert_eq!(config.mining.max_len, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn precedence_defaults_file_env_overrides() {
        let file = write_config(
            "[mining]\nmin_support = 0.05\nmetric = \"lift\"\nmin_threshold = 1.2\n\n[logging]\nformat = \"json\"\n",
        );

        let from_file = CobuyConfig::load_with_env(options_for(&file), env_from(&[])).unwrap();
        assert_eq!(from_file.mining.min_support, 0.05);
        assert_eq!(from_file.mining.metric, Metric::Lift);
        assert_eq!(from_file.mining.min_threshold, 1.2);
        assert_eq!(from_file.logging.format, LogFormat::Json);

        let with_env = CobuyConfig::load_with_env(
            options_for(&file),
            env_from(&[("COBUY_MIN_SUPPORT", "0.2"), ("COBUY_METRIC", "confidence")]),
        )
        .unwrap();
        assert_eq!(with_env.mining.min_support, 0.2);
        assert_eq!(with_env.mining.metric, Metric::Confidence);

        let mut options = options_for(&file);
        options.overrides.min_support = Some(0.3);
        options.overrides.max_len = Some(2);
        let with_cli =
            CobuyConfig::load_with_env(options, env_from(&[("COBUY_MIN_SUPPORT", "0.2")]))
                .unwrap();
        assert_eq!(with_cli.mining.min_support, 0.3);
        assert_eq!(with_cli.mining.max_len, Some(2));
        assert_eq!(with_cli.mining.metric, Metric::Lift);
    }

    #[test]
    fn missing_required_file_is_reported() {
        let options = LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/cobuy.toml")),
            require_file: true,
            overrides: ConfigOverrides::default(),
        };
        let error = CobuyConfig::load_with_env(options, env_from(&[])).unwrap_err();
        assert!(matches!(error, ConfigError::MissingConfigFile(_)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = write_config("[mining]\nminimum_support = 0.5\n");
        let error = CobuyConfig::load_with_env(options_for(&file), env_from(&[])).unwrap_err();
        assert!(matches!(error, ConfigError::ParseFile { .. }));
    }

    #[test]
    fn invalid_env_values_fail() {
        let error = CobuyConfig::load_with_env(
            LoadOptions::default(),
            env_from(&[("COBUY_MIN_SUPPORT", "often")]),
        )
        .unwrap_err();
        assert!(matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "COBUY_MIN_SUPPORT"));

        let error = CobuyConfig::load_with_env(
            LoadOptions::default(),
            env_from(&[("COBUY_METRIC", "zeal")]),
        )
        .unwrap_err();
        assert!(matches!(error, ConfigError::Validation(_)));
    }

    #[test]
    fn validation_rejects_out_of_range_support() {
        for bad in [0.0, -0.1, 1.5] {
            let mut options = LoadOptions::default();
            options.overrides.min_support = Some(bad);
            let error = CobuyConfig::load_with_env(options, env_from(&[])).unwrap_err();
            assert!(matches!(error, ConfigError::Validation(_)), "min_support {bad} accepted");
        }
    }

    #[test]
    fn validation_rejects_zero_max_len_and_bad_level() {
        let mut options = LoadOptions::default();
        options.overrides.max_len = Some(0);
        assert!(CobuyConfig::load_with_env(options, env_from(&[])).is_err());

        let mut options = LoadOptions::default();
        options.overrides.log_level = Some("chatty".to_string());
        assert!(CobuyConfig::load_with_env(options, env_from(&[])).is_err());
    }

    #[test]
    fn thresholds_mirror_mining_section() {
        let mut config = CobuyConfig::default();
        config.mining.metric = Metric::Lift;
        config.mining.min_threshold = 1.5;
        let thresholds = config.mining.thresholds();
        assert_eq!(thresholds.metric, Metric::Lift);
        assert_eq!(thresholds.min_threshold, 1.5);
        assert_eq!(thresholds.min_support, 0.01);
    }
}
