//! Incremental result cache
//!
//! Stores the post-baseline violations of every analyzed file together with
//! the file's freshness signature. A persisted state is reused only when its
//! [`ResultCacheKey`] equals the key of the current run; any other state is
//! discarded as a whole.
//!
//! The cache is owned by a single thread. Workers read from it through
//! [`ResultCache::try_reuse`] and return their outcomes, which are recorded
//! after the parallel phase.
//!
//! Concurrent runs sharing one cache file are not coordinated; the last run to
//! persist wins.

pub mod freshness;
pub mod key;
pub mod state;

pub use freshness::FreshnessStrategy;
pub use key::{compute_key, runtime_version, CacheKeyInputs, ResultCacheKey};
pub use state::{CacheEntry, CacheError, ResultCacheState};

use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Files served from the cache
    pub hits: usize,
    /// Files that required analysis
    pub misses: usize,
    /// Files whose results were stored
    pub recorded: usize,
    /// A persisted state was discarded because its key changed
    pub invalidated: bool,
}

/// Default cache location: `<user cache dir>/messcheck/result-cache.json`
pub fn default_cache_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("messcheck").join("result-cache.json"))
}

/// Cache handle for one run
#[derive(Debug)]
pub struct ResultCache {
    path: PathBuf,
    strategy: FreshnessStrategy,
    state: ResultCacheState,
    stats: CacheStats,
    load_warning: Option<String>,
}

impl ResultCache {
    /// Open the cache at `path` for a run computed under `key`.
    ///
    /// A missing, unreadable, corrupt or outdated document yields an empty
    /// cache. Anything other than a missing document is reported through
    /// [`ResultCache::load_warning`].
    pub fn open(path: &Path, key: ResultCacheKey, strategy: FreshnessStrategy) -> Self {
        let mut stats = CacheStats::default();
        let mut load_warning = None;

        let state = match ResultCacheState::load(path) {
            Ok(state) if state.is_valid(&key) => {
                debug!("Loaded {} cache entries from {}", state.len(), path.display());
                state
            }
            Ok(state) => {
                info!(
                    "Cache key changed, discarding {} entries from {}",
                    state.len(),
                    path.display()
                );
                stats.invalidated = true;
                ResultCacheState::new(key)
            }
            Err(CacheError::Io { ref source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                debug!("No cache at {}, starting cold", path.display());
                ResultCacheState::new(key)
            }
            Err(e @ CacheError::Version { .. }) => {
                info!("{}, starting cold", e);
                stats.invalidated = true;
                load_warning = Some(e.to_string());
                ResultCacheState::new(key)
            }
            Err(e) => {
                warn!("{}, starting cold", e);
                load_warning = Some(e.to_string());
                ResultCacheState::new(key)
            }
        };

        Self {
            path: path.to_path_buf(),
            strategy,
            state,
            stats,
            load_warning,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn strategy(&self) -> FreshnessStrategy {
        self.strategy
    }

    pub fn state(&self) -> &ResultCacheState {
        &self.state
    }

    /// Cached outcome for `file` if its signature is unchanged
    pub fn try_reuse(&self, file: &str, signature: &str) -> Option<&CacheEntry> {
        self.state.try_reuse(file, signature)
    }

    pub fn note_hit(&mut self) {
        self.stats.hits += 1;
    }

    pub fn note_miss(&mut self) {
        self.stats.misses += 1;
    }

    /// Store the final outcome of a freshly analyzed file
    pub fn record(&mut self, file: String, entry: CacheEntry) {
        self.stats.recorded += 1;
        self.state.record(file, entry);
    }

    /// Drop the entry of a file whose analysis was incomplete
    pub fn forget(&mut self, file: &str) {
        self.state.forget(file);
    }

    /// Drop entries for files outside `analyzed` that no longer exist
    pub fn prune(&mut self, analyzed: &HashSet<String>) {
        let before = self.state.len();
        self.state
            .retain(|file| analyzed.contains(file) || Path::new(file).exists());
        let pruned = before - self.state.len();
        if pruned > 0 {
            debug!("Pruned {} stale cache entries", pruned);
        }
    }

    /// Write the cache to its path
    pub fn persist(&self) -> Result<(), CacheError> {
        self.state.persist(&self.path)?;
        debug!(
            "Persisted {} cache entries to {}",
            self.state.len(),
            self.path.display()
        );
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Problem encountered while loading, if any
    pub fn load_warning(&self) -> Option<&str> {
        self.load_warning.as_deref()
    }
}
