//! Run pipeline
//!
//! One run loads the baseline, opens the result cache under the key of the
//! current configuration and processes every source unit independently on a
//! rayon pool. Each unit goes through signature, cache lookup, parse, rule
//! dispatch and baseline filtering. Workers only read the cache; their
//! outcomes are merged into it by the calling thread before a single persist.

use crate::baseline::{self, BaselineError, BaselineSet};
use crate::cache::{
    compute_key, runtime_version, CacheEntry, CacheKeyInputs, FreshnessStrategy, ResultCache,
};
use crate::config::{Config, ConfigError};
use crate::engine::{Engine, RuleFailure};
use crate::parser::{JsonTreeParser, Parser};
use crate::paths;
use crate::report::{ProcessingError, Report, ReportBuilder};
use crate::rule::Rule;
use crate::rules;
use crate::source::SourceUnit;
use crate::violation::Violation;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Fatal error, raised before any file is analyzed
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error(transparent)]
    Baseline(#[from] BaselineError),

    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("Unable to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// What processing one unit produced
#[derive(Debug)]
enum FileOutcome {
    /// Served from the cache
    Reused {
        violations: Vec<Violation>,
        suppressed: usize,
    },

    Analyzed {
        /// Post-baseline violations
        violations: Vec<Violation>,
        suppressed: usize,
        failures: Vec<RuleFailure>,
        /// `None` when the file could not be signed
        signature: Option<String>,
    },

    /// The unit could not be parsed
    Failed(ProcessingError),
}

/// Ties configuration, rules, parser, baseline and cache together
pub struct Analyzer {
    config: Config,
    base_dir: PathBuf,
    engine: Engine,
    parser: Arc<dyn Parser>,
}

impl Analyzer {
    /// Analyzer for the built-in rules enabled in `config`. Relative paths
    /// resolve against `base_dir`.
    pub fn new(config: Config, base_dir: impl Into<PathBuf>) -> Self {
        let rules = rules::builtin_rules(&config.rules);
        let engine = Engine::new(rules).with_strict(config.strict);
        Self {
            config,
            base_dir: base_dir.into(),
            engine,
            parser: Arc::new(JsonTreeParser::new()),
        }
    }

    /// Replace the rule set
    pub fn with_rules(mut self, rules: Vec<Arc<dyn Rule>>) -> Self {
        self.engine = Engine::new(rules).with_strict(self.config.strict);
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn Parser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Expand files, directories and glob patterns into the units of a run
    pub fn collect_files(&self, targets: &[PathBuf]) -> Result<Vec<PathBuf>, AnalyzerError> {
        Ok(self.config.files.collect(&self.base_dir, targets)?)
    }

    /// Analyze `files` and report the violations the baseline does not accept
    pub fn run(&self, files: &[PathBuf]) -> Result<Report, AnalyzerError> {
        self.config.validate()?;
        let baseline = match self.config.baseline_file(&self.base_dir) {
            Some(path) => Some(BaselineSet::load(&path, &self.base_dir)?),
            None => None,
        };
        self.execute(files, baseline.as_ref())
    }

    /// Analyze `files` without a baseline and write every violation found to
    /// a new baseline document at `path`
    pub fn generate_baseline(
        &self,
        files: &[PathBuf],
        path: &Path,
    ) -> Result<(Report, usize), AnalyzerError> {
        self.config.validate()?;
        let report = self.execute(files, None)?;
        let path = paths::absolutize(&self.base_dir, path);
        let written = baseline::write(&path, &report.violations)?;
        Ok((report, written))
    }

    fn execute(
        &self,
        files: &[PathBuf],
        baseline: Option<&BaselineSet>,
    ) -> Result<Report, AnalyzerError> {
        let start = Instant::now();

        let mut cache = self.config.cache_file(&self.base_dir).map(|path| {
            let key = compute_key(&CacheKeyInputs {
                strict: self.engine.is_strict(),
                baseline,
                rules: self.engine.rules(),
                dependencies: &self.config.dependencies,
                base_dir: &self.base_dir,
                runtime_version: &runtime_version(),
            });
            ResultCache::open(&path, key, self.config.cache.strategy)
        });

        let mut seen = HashSet::new();
        let units: Vec<SourceUnit> = files
            .iter()
            .map(|file| paths::absolutize(&self.base_dir, file))
            .filter(|file| seen.insert(file.clone()))
            .map(SourceUnit::new)
            .collect();

        // Units are consumed so that each file's contents are released once
        // it has been processed
        let keys: Vec<(PathBuf, String)> = units
            .iter()
            .map(|unit| (unit.path().to_path_buf(), unit.cache_key()))
            .collect();

        let outcomes: Vec<FileOutcome> = {
            let cache = cache.as_ref();
            let process = |unit: SourceUnit| self.process(&unit, cache, baseline);

            if self.config.engine.parallel && units.len() > 1 {
                let jobs = match self.config.engine.jobs {
                    0 => num_cpus::get(),
                    jobs => jobs,
                };
                let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
                debug!("Analyzing {} files on {} threads", units.len(), jobs);
                pool.install(|| units.into_par_iter().map(process).collect())
            } else {
                units.into_iter().map(process).collect()
            }
        };

        let mut builder = ReportBuilder::new();
        for ((path, key), outcome) in keys.iter().zip(outcomes) {
            builder.file_processed();
            match outcome {
                FileOutcome::Reused {
                    violations,
                    suppressed,
                } => {
                    if let Some(cache) = cache.as_mut() {
                        cache.note_hit();
                    }
                    builder.baseline_suppressed(suppressed);
                    builder.add_violations(violations);
                }
                FileOutcome::Analyzed {
                    violations,
                    suppressed,
                    failures,
                    signature,
                } => {
                    builder.baseline_suppressed(suppressed);
                    for failure in &failures {
                        builder.add_error(
                            ProcessingError::new(failure.error.to_string())
                                .in_file(path)
                                .for_rule(&failure.rule_id),
                        );
                    }
                    if let Some(cache) = cache.as_mut() {
                        cache.note_miss();
                        match signature {
                            Some(signature) if failures.is_empty() => cache.record(
                                key.clone(),
                                CacheEntry::new(signature, violations.clone())
                                    .with_suppressed(suppressed),
                            ),
                            _ => cache.forget(key),
                        }
                    }
                    builder.add_violations(violations);
                }
                FileOutcome::Failed(error) => {
                    if let Some(cache) = cache.as_mut() {
                        cache.note_miss();
                        cache.forget(key);
                    }
                    builder.add_error(error);
                }
            }
        }

        if let Some(cache) = cache.as_mut() {
            let analyzed: HashSet<String> = keys.into_iter().map(|(_, key)| key).collect();
            cache.prune(&analyzed);
            if let Some(warning) = cache.load_warning() {
                builder.add_warning(warning);
            }
            if let Err(e) = cache.persist() {
                warn!("{}", e);
                builder.add_warning(e.to_string());
            }
            let stats = cache.stats();
            info!(
                "Cache: {} hit(s), {} miss(es), {} recorded",
                stats.hits, stats.misses, stats.recorded
            );
            builder.cache_stats(stats);
        }

        let report = builder.build(start.elapsed());
        info!(
            "Analyzed {} file(s): {} violation(s), {} error(s) in {:?}",
            report.files_processed,
            report.violations.len(),
            report.errors.len(),
            report.duration
        );
        Ok(report)
    }

    /// Process one unit; runs on a worker
    fn process(
        &self,
        unit: &SourceUnit,
        cache: Option<&ResultCache>,
        baseline: Option<&BaselineSet>,
    ) -> FileOutcome {
        let signature = match cache {
            Some(cache) => match self.signature(unit, cache.strategy()) {
                Some(signature) => {
                    if let Some(entry) = cache.try_reuse(&unit.cache_key(), signature) {
                        debug!("Cache hit: {}", unit.path().display());
                        return FileOutcome::Reused {
                            violations: entry.violations.clone(),
                            suppressed: entry.suppressed,
                        };
                    }
                    debug!("Cache miss: {}", unit.path().display());
                    Some(signature.to_string())
                }
                None => None,
            },
            None => None,
        };

        let tree = match self.parser.parse(unit) {
            Ok(tree) => tree,
            Err(e) => {
                return FileOutcome::Failed(
                    ProcessingError::new(format!("Unable to parse: {}", e)).in_file(unit.path()),
                )
            }
        };

        let analysis = self.engine.analyze(tree.as_ref(), unit.path());
        let found = analysis.violations.len();
        let violations = match baseline {
            Some(baseline) => baseline.filter(analysis.violations),
            None => analysis.violations,
        };

        FileOutcome::Analyzed {
            suppressed: found - violations.len(),
            violations,
            failures: analysis.failures,
            signature,
        }
    }

    fn signature<'u>(&self, unit: &'u SourceUnit, strategy: FreshnessStrategy) -> Option<&'u str> {
        match unit.signature(strategy) {
            Ok(signature) => Some(signature),
            Err(e) => {
                debug!("Unable to sign {}: {}", unit.path().display(), e);
                None
            }
        }
    }
}
