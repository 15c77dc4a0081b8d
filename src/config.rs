//! Run configuration from environment variables
//!
//! - `GWCONFORM_REQUEST_TIMEOUT_SECS`: per round trip deadline (default 10)
//! - `GWCONFORM_MAX_TIME_TO_CONSISTENCY_SECS`: how long a scenario may wait to converge (default 30)
//! - `GWCONFORM_REQUIRED_CONSECUTIVE_SUCCESSES`: successes in a row that count as converged (default 3)
//! - `GWCONFORM_DEBUG`: "true" to dump every request and response
//! - `GWCONFORM_CATALOG`: path of the TOML test catalog (default `conformance.toml`)
//! - `E2E_SHARD_TOTAL`, `E2E_SHARD_INDEX`: split the suite across workers
//! - `E2E_RUN_TEST`: run a single test by short name, ignoring shards

use crate::suite::shard::ShardSettings;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const REQUEST_TIMEOUT_ENV: &str = "GWCONFORM_REQUEST_TIMEOUT_SECS";
pub const MAX_TIME_TO_CONSISTENCY_ENV: &str = "GWCONFORM_MAX_TIME_TO_CONSISTENCY_SECS";
pub const REQUIRED_CONSECUTIVE_SUCCESSES_ENV: &str = "GWCONFORM_REQUIRED_CONSECUTIVE_SUCCESSES";
pub const DEBUG_ENV: &str = "GWCONFORM_DEBUG";
pub const CATALOG_ENV: &str = "GWCONFORM_CATALOG";
pub const SHARD_TOTAL_ENV: &str = "E2E_SHARD_TOTAL";
pub const SHARD_INDEX_ENV: &str = "E2E_SHARD_INDEX";
pub const RUN_TEST_ENV: &str = "E2E_RUN_TEST";

const DEFAULT_CATALOG: &str = "conformance.toml";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a non-negative integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} must be at least 1")]
    MustBePositive { name: &'static str },
}

/// Timing knobs shared by every round trip and convergence wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub request_timeout: Duration,
    pub max_time_to_consistency: Duration,
    pub required_consecutive_successes: u32,
    /// Pause between convergence attempts
    pub poll_interval: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_time_to_consistency: Duration::from_secs(30),
            required_consecutive_successes: 3,
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Everything a conformance run reads from its environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub timeouts: TimeoutConfig,
    pub debug: bool,
    pub catalog_path: PathBuf,
    pub shard: ShardSettings,
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, which returns a variable's value if set
    ///
    /// Shard values are passed through unparsed; the shard planner validates them.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = TimeoutConfig::default();

        let request_timeout = seconds(&lookup, REQUEST_TIMEOUT_ENV)?.unwrap_or(defaults.request_timeout);
        let max_time_to_consistency = seconds(&lookup, MAX_TIME_TO_CONSISTENCY_ENV)?
            .unwrap_or(defaults.max_time_to_consistency);
        let required_consecutive_successes = number(&lookup, REQUIRED_CONSECUTIVE_SUCCESSES_ENV)?
            .map(u32::try_from)
            .transpose()
            .map_err(|_| ConfigError::InvalidNumber {
                name: REQUIRED_CONSECUTIVE_SUCCESSES_ENV,
                value: lookup(REQUIRED_CONSECUTIVE_SUCCESSES_ENV).unwrap_or_default(),
            })?
            .unwrap_or(defaults.required_consecutive_successes);

        if request_timeout.is_zero() {
            return Err(ConfigError::MustBePositive {
                name: REQUEST_TIMEOUT_ENV,
            });
        }
        if required_consecutive_successes == 0 {
            return Err(ConfigError::MustBePositive {
                name: REQUIRED_CONSECUTIVE_SUCCESSES_ENV,
            });
        }

        let debug = lookup(DEBUG_ENV).unwrap_or_else(|| "false".to_string()) == "true";
        let catalog_path = lookup(CATALOG_ENV)
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| DEFAULT_CATALOG.to_string())
            .into();

        Ok(Config {
            timeouts: TimeoutConfig {
                request_timeout,
                max_time_to_consistency,
                required_consecutive_successes,
                poll_interval: defaults.poll_interval,
            },
            debug,
            catalog_path,
            shard: ShardSettings {
                total: lookup(SHARD_TOTAL_ENV),
                index: lookup(SHARD_INDEX_ENV),
                run_test: lookup(RUN_TEST_ENV),
            },
        })
    }
}

fn number<F>(lookup: &F, name: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
    }
}

fn seconds<F>(lookup: &F, name: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(number(lookup, name)?.map(Duration::from_secs))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
