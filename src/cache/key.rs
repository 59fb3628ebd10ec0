//! Result cache key
//!
//! Everything that can change the outcome of a run for an unchanged file: the
//! strict flag, the baseline document, the active rules and their settings,
//! the project's dependency manifests and the analyzer version.

use crate::baseline::BaselineSet;
use crate::hash::sha256_hex;
use crate::paths;
use crate::rule::Rule;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Baseline hash recorded when no baseline is configured
pub const NO_BASELINE: &str = "none";

/// Manifest hash recorded when a manifest exists but cannot be read
pub const UNREADABLE: &str = "unreadable";

/// Composite fingerprint a cached state was produced under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultCacheKey {
    strict: bool,
    baseline_hash: String,
    /// Rule id -> configuration fingerprint
    rules: BTreeMap<String, String>,
    /// Manifest path -> content hash
    dependencies: BTreeMap<String, String>,
    runtime_version: String,
}

impl ResultCacheKey {
    pub fn new(
        strict: bool,
        baseline_hash: &str,
        rules: BTreeMap<String, String>,
        dependencies: BTreeMap<String, String>,
        runtime_version: &str,
    ) -> Self {
        Self {
            strict,
            baseline_hash: baseline_hash.to_string(),
            rules,
            dependencies,
            runtime_version: runtime_version.to_string(),
        }
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    pub fn baseline_hash(&self) -> &str {
        &self.baseline_hash
    }

    pub fn rules(&self) -> &BTreeMap<String, String> {
        &self.rules
    }

    pub fn dependencies(&self) -> &BTreeMap<String, String> {
        &self.dependencies
    }

    pub fn runtime_version(&self) -> &str {
        &self.runtime_version
    }
}

/// Inputs of [`compute_key`]
pub struct CacheKeyInputs<'a> {
    pub strict: bool,
    pub baseline: Option<&'a BaselineSet>,
    pub rules: &'a [Arc<dyn Rule>],
    /// Manifest files, relative paths resolve against `base_dir`
    pub dependencies: &'a [PathBuf],
    pub base_dir: &'a Path,
    pub runtime_version: &'a str,
}

/// Identifier of this analyzer build
pub fn runtime_version() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Compute the key for the current run
pub fn compute_key(inputs: &CacheKeyInputs<'_>) -> ResultCacheKey {
    let baseline_hash = inputs
        .baseline
        .map(|baseline| baseline.content_hash().to_string())
        .unwrap_or_else(|| NO_BASELINE.to_string());

    let rules = inputs
        .rules
        .iter()
        .map(|rule| (rule.id().to_string(), rule.fingerprint()))
        .collect();

    let mut dependencies = BTreeMap::new();
    for manifest in inputs.dependencies {
        let path = paths::absolutize(inputs.base_dir, manifest);
        let hash = match fs::read(&path) {
            Ok(bytes) => sha256_hex(&bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                warn!("Unable to read dependency manifest {}: {}", path.display(), e);
                UNREADABLE.to_string()
            }
        };
        dependencies.insert(path.to_string_lossy().to_string(), hash);
    }

    ResultCacheKey {
        strict: inputs.strict,
        baseline_hash,
        rules,
        dependencies,
        runtime_version: inputs.runtime_version.to_string(),
    }
}
