//! Per-file freshness signatures

use crate::hash::sha256_hex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// How a file's cache signature is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreshnessStrategy {
    /// SHA-256 of the full file contents
    #[default]
    Content,
    /// Last modification time of the file
    Timestamp,
}

impl fmt::Display for FreshnessStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FreshnessStrategy::Content => write!(f, "content"),
            FreshnessStrategy::Timestamp => write!(f, "timestamp"),
        }
    }
}

impl std::str::FromStr for FreshnessStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "content" | "hash" => Ok(FreshnessStrategy::Content),
            "timestamp" | "mtime" => Ok(FreshnessStrategy::Timestamp),
            _ => Err(format!("Unknown cache strategy: {}", s)),
        }
    }
}

/// Signature of already-read file contents under [`FreshnessStrategy::Content`]
pub fn content_signature(contents: &[u8]) -> String {
    sha256_hex(contents)
}

/// Compute the signature of `path` under `strategy`
pub fn signature(path: &Path, strategy: FreshnessStrategy) -> io::Result<String> {
    match strategy {
        FreshnessStrategy::Content => Ok(content_signature(&fs::read(path)?)),
        FreshnessStrategy::Timestamp => {
            let modified = fs::metadata(path)?.modified()?;
            let since_epoch = modified.duration_since(UNIX_EPOCH).unwrap_or_default();
            Ok(format!(
                "{}.{:09}",
                since_epoch.as_secs(),
                since_epoch.subsec_nanos()
            ))
        }
    }
}
