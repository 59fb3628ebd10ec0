//! Source units handed to the parser and the result cache

use crate::cache::freshness::{self, FreshnessStrategy};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// A file to analyze during one run.
///
/// The file is read at most once: the content signature and the parser both
/// see the same bytes, even if the file changes on disk mid-run. The
/// signature is memoized too, so a unit must only ever be queried with the
/// run's single strategy.
#[derive(Debug)]
pub struct SourceUnit {
    path: PathBuf,
    contents: OnceLock<Vec<u8>>,
    signature: OnceLock<String>,
}

impl SourceUnit {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            contents: OnceLock::new(),
            signature: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Key under which this unit is stored in the result cache
    pub fn cache_key(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    /// File contents, read on first use
    pub fn contents(&self) -> io::Result<&[u8]> {
        if let Some(contents) = self.contents.get() {
            return Ok(contents);
        }
        let read = fs::read(&self.path)?;
        Ok(self.contents.get_or_init(|| read))
    }

    /// File contents as UTF-8
    pub fn text(&self) -> io::Result<&str> {
        std::str::from_utf8(self.contents()?)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Freshness signature under `strategy`
    pub fn signature(&self, strategy: FreshnessStrategy) -> io::Result<&str> {
        if let Some(signature) = self.signature.get() {
            return Ok(signature);
        }
        let computed = match strategy {
            FreshnessStrategy::Content => freshness::content_signature(self.contents()?),
            FreshnessStrategy::Timestamp => freshness::signature(&self.path, strategy)?,
        };
        Ok(self.signature.get_or_init(|| computed))
    }
}
