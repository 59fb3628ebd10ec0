//! Configuration system
//!
//! Reads configuration from the first of `.messcheck.yaml`,
//! `.messcheck.yml` or `.messcheck.json` found in the project base directory,
//! or from an explicit path. Relative paths in the configuration resolve
//! against the base directory of the run.

use crate::cache::{default_cache_path, FreshnessStrategy};
use crate::paths;
use crate::rule::RuleSettings;
use globset::{Glob, GlobSet, GlobSetBuilder};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Names probed by [`Config::discover`], in order
pub const CONFIG_FILE_NAMES: &[&str] = &[".messcheck.yaml", ".messcheck.yml", ".messcheck.json"];

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Enable parallel processing
    pub parallel: bool,

    /// Number of parallel jobs (0 = auto-detect)
    pub jobs: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            jobs: 0,
        }
    }
}

/// Result cache settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,

    /// Cache document, defaults to the user cache directory
    pub file: Option<PathBuf>,

    pub strategy: FreshnessStrategy,
}

/// File handling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Patterns selecting files inside directory arguments
    pub include: Vec<String>,

    /// Patterns removing files from the run
    pub exclude: Vec<String>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            include: vec!["**/*.ast.json".to_string()],
            exclude: Vec::new(),
        }
    }
}

impl FilesConfig {
    /// Compiled exclude patterns
    pub fn exclude_matcher(&self) -> Result<GlobSet, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude {
            let glob = Glob::new(pattern).map_err(|e| ConfigError::Pattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|e| ConfigError::Pattern {
            pattern: self.exclude.join(", "),
            message: e.to_string(),
        })
    }

    /// Expand `targets` into the sorted, deduplicated list of files to analyze.
    ///
    /// Files are taken as is, directories are searched with the include
    /// patterns and anything else is treated as a glob pattern. Exclude
    /// patterns match against the path relative to `base_dir`.
    pub fn collect(&self, base_dir: &Path, targets: &[PathBuf]) -> Result<Vec<PathBuf>, ConfigError> {
        let exclude = self.exclude_matcher()?;
        let mut files = BTreeSet::new();

        for target in targets {
            let target = paths::absolutize(base_dir, target);
            if target.is_file() {
                files.insert(target);
                continue;
            }

            let patterns: Vec<String> = if target.is_dir() {
                self.include
                    .iter()
                    .map(|include| {
                        format!(
                            "{}/{}",
                            glob::Pattern::escape(&target.to_string_lossy()),
                            include
                        )
                    })
                    .collect()
            } else {
                vec![target.to_string_lossy().to_string()]
            };

            for pattern in patterns {
                let entries = glob::glob(&pattern).map_err(|e| ConfigError::Pattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                for entry in entries.flatten() {
                    if entry.is_file() {
                        files.insert(paths::normalize(&entry));
                    }
                }
            }
        }

        Ok(files
            .into_iter()
            .filter(|file| {
                let relative = paths::relative_to(file, base_dir);
                let excluded = exclude.is_match(&relative) || exclude.is_match(file);
                if excluded {
                    debug!("Excluded {}", relative);
                }
                !excluded
            })
            .collect())
    }
}

/// Rule configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Disabled rules
    pub disabled: Vec<String>,

    /// Per-rule settings (rule_id -> settings)
    pub settings: BTreeMap<String, RuleSettings>,
}

impl RulesConfig {
    pub fn is_enabled(&self, rule_id: &str) -> bool {
        !self.disabled.iter().any(|id| id == rule_id)
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine settings
    pub engine: EngineConfig,

    /// Result cache settings
    pub cache: CacheConfig,

    /// Baseline document
    pub baseline: Option<PathBuf>,

    /// Ignore suppression annotations
    pub strict: bool,

    /// Rule configuration
    pub rules: RulesConfig,

    /// File handling settings
    pub files: FilesConfig,

    /// Manifests whose content is part of the cache key
    pub dependencies: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            cache: CacheConfig::default(),
            baseline: None,
            strict: false,
            rules: RulesConfig::default(),
            files: FilesConfig::default(),
            dependencies: vec![
                PathBuf::from("composer.json"),
                PathBuf::from("composer.lock"),
            ],
        }
    }
}

impl Config {
    /// Create default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config: Self = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown config file format: {}",
                    ext
                )))
            }
        };

        config.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => config.anchored_to(dir),
            _ => config,
        })
    }

    /// Resolve the relative paths of a config file against its directory
    fn anchored_to(mut self, dir: &Path) -> Self {
        let anchor = |path: &mut PathBuf| *path = paths::absolutize(dir, path);
        if let Some(baseline) = self.baseline.as_mut() {
            anchor(baseline);
        }
        if let Some(file) = self.cache.file.as_mut() {
            anchor(file);
        }
        self.dependencies.iter_mut().for_each(anchor);
        self
    }

    /// Path of the first default config file present in `base_dir`
    pub fn find(base_dir: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| base_dir.join(name))
            .find(|path| path.is_file())
    }

    /// Load the project configuration of `base_dir`, or the defaults
    pub fn discover(base_dir: &Path) -> Result<Self, ConfigError> {
        match Self::find(base_dir) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Check settings that deserialization alone cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.files.exclude_matcher()?;
        for pattern in &self.files.include {
            glob::Pattern::new(pattern).map_err(|e| ConfigError::Pattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        }
        for (rule, settings) in &self.rules.settings {
            if !(1..=5).contains(&settings.priority) {
                return Err(ConfigError::Invalid(format!(
                    "priority of {} must be between 1 and 5, got {}",
                    rule, settings.priority
                )));
            }
        }
        Ok(())
    }

    /// Resolved cache document, `None` when caching is disabled or no
    /// location is available
    pub fn cache_file(&self, base_dir: &Path) -> Option<PathBuf> {
        if !self.cache.enabled {
            return None;
        }
        match &self.cache.file {
            Some(file) => Some(paths::absolutize(base_dir, file)),
            None => default_cache_path(),
        }
    }

    /// Resolved baseline document
    pub fn baseline_file(&self, base_dir: &Path) -> Option<PathBuf> {
        self.baseline
            .as_ref()
            .map(|baseline| paths::absolutize(base_dir, baseline))
    }
}
