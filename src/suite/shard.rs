//! Shard planning
//!
//! Splits the registered tests across `total` workers. Tests are sorted by
//! short name first so every worker computes the same partition regardless
//! of registration order, then worker `index` takes every test whose sorted
//! position modulo `total` equals `index`.
//!
//! Planning is skipped entirely when a single test is requested by name, or
//! when no shard total is configured.

use super::ConformanceTest;
use thiserror::Error;
use tracing::info;

/// Fatal shard misconfiguration; no tests should run with it
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShardError {
    #[error("invalid shard total {0:?}: must be a positive integer")]
    InvalidTotal(String),

    #[error("invalid shard index {index:?}: must be an integer in [0, {total})")]
    InvalidIndex { index: String, total: usize },
}

/// Raw shard inputs, as read from the environment
///
/// Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardSettings {
    pub total: Option<String>,
    pub index: Option<String>,
    /// Short name of a single test to run instead of a shard
    pub run_test: Option<String>,
}

impl ShardSettings {
    fn run_test(&self) -> Option<&str> {
        non_empty(&self.run_test)
    }

    fn total(&self) -> Option<&str> {
        non_empty(&self.total)
    }

    fn index(&self) -> Option<&str> {
        non_empty(&self.index)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// A validated shard position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shard {
    pub total: usize,
    pub index: usize,
}

/// How the plan was reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanMode {
    /// A single test was requested; sharding was not consulted
    RunTest(String),
    /// No shard total configured
    Unsharded,
    Sharded(Shard),
}

/// The tests one worker runs, in execution order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPlan<'a> {
    pub mode: PlanMode,
    pub tests: Vec<&'a ConformanceTest>,
}

impl<'a> ShardPlan<'a> {
    pub fn short_names(&self) -> Vec<&'a str> {
        self.tests.iter().map(|t| t.short_name.as_str()).collect()
    }

    pub fn shard(&self) -> Option<Shard> {
        match self.mode {
            PlanMode::Sharded(shard) => Some(shard),
            _ => None,
        }
    }
}

/// Compute the tests this worker should run
///
/// Returns every test, in registration order, when `run_test` is set or no
/// total is configured. Otherwise returns this worker's slice of the sorted
/// list.
///
/// # Errors
/// * `InvalidTotal` - total is not an integer greater than zero
/// * `InvalidIndex` - index is missing, not an integer, or not below total
pub fn plan<'a>(
    tests: &'a [ConformanceTest],
    settings: &ShardSettings,
) -> Result<ShardPlan<'a>, ShardError> {
    if let Some(run_test) = settings.run_test() {
        info!(test = %run_test, "Single test requested, sharding skipped");
        return Ok(ShardPlan {
            mode: PlanMode::RunTest(run_test.to_string()),
            tests: tests.iter().collect(),
        });
    }

    let Some(total) = settings.total() else {
        return Ok(ShardPlan {
            mode: PlanMode::Unsharded,
            tests: tests.iter().collect(),
        });
    };

    let mut sorted: Vec<&ConformanceTest> = tests.iter().collect();
    sorted.sort_by(|a, b| a.short_name.cmp(&b.short_name));

    let shard = parse_shard(total, settings.index())?;

    let selected: Vec<&ConformanceTest> = sorted
        .into_iter()
        .enumerate()
        .filter(|(position, _)| position % shard.total == shard.index)
        .map(|(_, test)| test)
        .collect();

    info!(
        total = shard.total,
        index = shard.index,
        selected = selected.len(),
        registered = tests.len(),
        "Shard planned"
    );

    Ok(ShardPlan {
        mode: PlanMode::Sharded(shard),
        tests: selected,
    })
}

fn parse_shard(total: &str, index: Option<&str>) -> Result<Shard, ShardError> {
    let parsed_total = total
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|t| *t > 0)
        .ok_or_else(|| ShardError::InvalidTotal(total.to_string()))?;

    let index_value = index.unwrap_or_default();
    let parsed_index = index_value
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|i| *i < parsed_total)
        .ok_or_else(|| ShardError::InvalidIndex {
            index: index_value.to_string(),
            total: parsed_total,
        })?;

    Ok(Shard {
        total: parsed_total,
        index: parsed_index,
    })
}

#[cfg(test)]
#[path = "shard_test.rs"]
mod tests;
