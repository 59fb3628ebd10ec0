//! Persisted result cache document

use super::key::ResultCacheKey;
use crate::violation::Violation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 2;

/// Cache read/write error. Never fatal for a run.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Unable to access cache file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Corrupt cache file {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cache file {} has format version {found}, expected {expected}", path.display())]
    Version {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("Unable to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Cached outcome for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub signature: String,
    /// Post-baseline violations in report order
    pub violations: Vec<Violation>,
    /// Violations the baseline removed
    #[serde(default)]
    pub suppressed: usize,
}

impl CacheEntry {
    pub fn new(signature: impl Into<String>, violations: Vec<Violation>) -> Self {
        Self {
            signature: signature.into(),
            violations,
            suppressed: 0,
        }
    }

    pub fn with_suppressed(mut self, suppressed: usize) -> Self {
        self.suppressed = suppressed;
        self
    }
}

#[derive(Deserialize)]
struct VersionProbe {
    #[serde(default)]
    version: u32,
}

#[derive(Serialize)]
struct Document<'a> {
    version: u32,
    key: &'a ResultCacheKey,
    files: &'a BTreeMap<String, CacheEntry>,
}

#[derive(Deserialize)]
struct OwnedDocument {
    key: ResultCacheKey,
    #[serde(default)]
    files: BTreeMap<String, CacheEntry>,
}

/// Key plus per-file entries, as loaded from or persisted to disk
#[derive(Debug, Clone, PartialEq)]
pub struct ResultCacheState {
    key: ResultCacheKey,
    files: BTreeMap<String, CacheEntry>,
}

impl ResultCacheState {
    /// Empty state produced under `key`
    pub fn new(key: ResultCacheKey) -> Self {
        Self {
            key,
            files: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> &ResultCacheKey {
        &self.key
    }

    /// Load a persisted state
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        let content = fs::read(path).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let corrupt = |source| CacheError::Corrupt {
            path: path.to_path_buf(),
            source,
        };

        let probe: VersionProbe = serde_json::from_slice(&content).map_err(corrupt)?;
        if probe.version != FORMAT_VERSION {
            return Err(CacheError::Version {
                path: path.to_path_buf(),
                found: probe.version,
                expected: FORMAT_VERSION,
            });
        }

        let document: OwnedDocument = serde_json::from_slice(&content).map_err(corrupt)?;
        Ok(Self {
            key: document.key,
            files: document.files,
        })
    }

    /// Write the state to `path` through a sibling temporary file
    pub fn persist(&self, path: &Path) -> Result<(), CacheError> {
        let io_error = |source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let content = serde_json::to_vec(&Document {
            version: FORMAT_VERSION,
            key: &self.key,
            files: &self.files,
        })?;

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(format!(".{}.tmp", std::process::id()));
        let tmp = path.with_file_name(tmp_name);

        let written = fs::File::create(&tmp).and_then(|mut file| {
            file.write_all(&content)?;
            file.sync_all()
        });
        if let Err(source) = written.and_then(|()| fs::rename(&tmp, path)) {
            let _ = fs::remove_file(&tmp);
            return Err(io_error(source));
        }
        Ok(())
    }

    /// Whether this state was produced under `key`
    pub fn is_valid(&self, key: &ResultCacheKey) -> bool {
        self.key == *key
    }

    /// Cached entry for `file` if its signature is unchanged
    pub fn try_reuse(&self, file: &str, signature: &str) -> Option<&CacheEntry> {
        self.files
            .get(file)
            .filter(|entry| entry.signature == signature)
    }

    pub fn record(&mut self, file: String, entry: CacheEntry) {
        self.files.insert(file, entry);
    }

    pub fn forget(&mut self, file: &str) -> bool {
        self.files.remove(file).is_some()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.files.retain(|file, _| keep(file));
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
