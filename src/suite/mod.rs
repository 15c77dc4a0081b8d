//! Registered conformance tests
//!
//! Tests are registered explicitly at startup, either in code or from a TOML
//! catalog, and the registry is handed to the shard planner.

pub mod shard;

pub use shard::{plan, PlanMode, Shard, ShardError, ShardPlan, ShardSettings};

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("test {0:?} is already registered")]
    DuplicateTest(String),

    #[error("test short name must not be empty")]
    EmptyShortName,

    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog: {0}")]
    Catalog(#[from] toml::de::Error),
}

/// One named conformance test
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConformanceTest {
    /// Unique name used for sharding and single-test runs
    pub short_name: String,
    #[serde(default)]
    pub description: String,
    /// Manifests applied before the test runs
    #[serde(default)]
    pub manifests: Vec<String>,
}

impl ConformanceTest {
    pub fn new(short_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            short_name: short_name.into(),
            description: description.into(),
            manifests: Vec::new(),
        }
    }

    pub fn with_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.manifests.push(manifest.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct Catalog {
    #[serde(default)]
    tests: Vec<ConformanceTest>,
}

/// All tests known to this run, in registration order
#[derive(Debug, Clone, Default)]
pub struct TestRegistry {
    tests: Vec<ConformanceTest>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a test, rejecting empty or duplicate short names
    pub fn register(&mut self, test: ConformanceTest) -> Result<(), RegistryError> {
        if test.short_name.is_empty() {
            return Err(RegistryError::EmptyShortName);
        }
        if self.get(&test.short_name).is_some() {
            return Err(RegistryError::DuplicateTest(test.short_name));
        }
        self.tests.push(test);
        Ok(())
    }

    /// Build a registry from a TOML catalog of `[[tests]]` tables
    ///
    /// ```toml
    /// [[tests]]
    /// short_name = "Compression"
    /// description = "Test response compression on HTTPRoute"
    /// manifests = ["testdata/compression.yaml"]
    /// ```
    pub fn from_catalog_str(content: &str) -> Result<Self, RegistryError> {
        let catalog: Catalog = toml::from_str(content)?;
        let mut registry = Self::new();
        for test in catalog.tests {
            registry.register(test)?;
        }
        Ok(registry)
    }

    /// Load a catalog file
    pub fn load_catalog(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let registry = Self::from_catalog_str(&content)?;
        info!(path = %path.display(), tests = registry.len(), "Loaded test catalog");
        Ok(registry)
    }

    pub fn get(&self, short_name: &str) -> Option<&ConformanceTest> {
        self.tests.iter().find(|t| t.short_name == short_name)
    }

    pub fn tests(&self) -> &[ConformanceTest] {
        &self.tests
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Tests this worker should run under `settings`
    pub fn plan(&self, settings: &ShardSettings) -> Result<ShardPlan<'_>, ShardError> {
        plan(&self.tests, settings)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
