//! Server configuration
//!
//! Bind address comes from the first command line argument, tuning knobs
//! from environment variables. Everything has a default.

use std::time::Duration;

use thiserror::Error;

use crate::code::DEFAULT_MAX_ATTEMPTS;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Seconds an empty room stays reserved
pub const DEFAULT_GRACE_SECS: u64 = 300;

/// Seconds between eviction sweeps
pub const DEFAULT_SWEEP_SECS: u64 = 30;

pub const GRACE_ENV: &str = "ROOM_GRACE_SECS";
pub const SWEEP_ENV: &str = "ROOM_SWEEP_SECS";
pub const ATTEMPTS_ENV: &str = "ROOM_CODE_ATTEMPTS";

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Value is not a positive integer
    #[error("{key} must be a positive integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address the WebSocket listener binds to
    pub bind_addr: String,
    /// How long an empty room keeps its code
    pub grace_period: Duration,
    /// Interval of the background eviction sweep
    pub sweep_interval: Duration,
    /// Code generation retry budget
    pub code_attempts: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
            grace_period: Duration::from_secs(DEFAULT_GRACE_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_SECS),
            code_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl Config {
    /// Load from process arguments and environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(std::env::args().nth(1), |key| std::env::var(key).ok())
    }

    /// Load from an explicit address and variable lookup
    pub fn load(
        addr: Option<String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let grace = positive(GRACE_ENV, lookup(GRACE_ENV))?;
        let sweep = positive(SWEEP_ENV, lookup(SWEEP_ENV))?;
        let attempts = positive(ATTEMPTS_ENV, lookup(ATTEMPTS_ENV))?;

        Ok(Self {
            bind_addr: addr.unwrap_or(defaults.bind_addr),
            grace_period: grace.map(Duration::from_secs).unwrap_or(defaults.grace_period),
            sweep_interval: sweep.map(Duration::from_secs).unwrap_or(defaults.sweep_interval),
            code_attempts: attempts
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(defaults.code_attempts),
        })
    }
}

fn positive(key: &'static str, value: Option<String>) -> Result<Option<u64>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };

    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(ConfigError::InvalidNumber { key, value }),
    }
}
