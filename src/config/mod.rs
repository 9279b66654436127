//! Configuration module - environment variable parsing

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Runner configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Level description to load (built-in demo level when unset)
    pub level_path: Option<PathBuf>,
    /// Hard stop for the headless runner
    pub max_ticks: u64,
    /// Seed for the scripted autopilot input
    pub autopilot_seed: u64,

    /// Overrides `SessionTuning::rewind_budget`
    pub rewind_budget: Option<u32>,
    /// Overrides `SessionTuning::spawn_energy`
    pub spawn_energy: Option<f32>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            level_path: env::var("LEVEL_PATH").ok().map(PathBuf::from),
            max_ticks: parse_or("MAX_TICKS", 3000)?,
            autopilot_seed: parse_or("AUTOPILOT_SEED", 7)?,

            rewind_budget: parse_optional("REWIND_BUDGET")?,
            spawn_energy: parse_optional("SPAWN_ENERGY")?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            level_path: None,
            max_ticks: 3000,
            autopilot_seed: 7,
            rewind_budget: None,
            spawn_energy: None,
        }
    }
}

fn parse_optional<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(None),
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    Ok(parse_optional(name)?.unwrap_or(default))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
