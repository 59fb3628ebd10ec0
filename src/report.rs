//! Run report

use crate::cache::CacheStats;
use crate::violation::{sort_violations, Violation};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A problem that kept part of a file from being analyzed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

impl ProcessingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: None,
            rule: None,
        }
    }

    pub fn in_file(mut self, file: &Path) -> Self {
        self.file = Some(file.to_path_buf());
        self
    }

    pub fn for_rule(mut self, rule: &str) -> Self {
        self.rule = Some(rule.to_string());
        self
    }
}

impl fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}: ", file.display())?;
        }
        if let Some(rule) = &self.rule {
            write!(f, "[{}] ", rule)?;
        }
        write!(f, "{}", self.message)
    }
}

/// Result of an analyzer run
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Surviving violations in report order
    pub violations: Vec<Violation>,

    /// Run errors, ordered by file
    pub errors: Vec<ProcessingError>,

    /// Recoverable problems (cache load/persist)
    pub warnings: Vec<String>,

    pub files_processed: usize,

    /// Violations removed by the baseline in this run
    pub baseline_suppressed: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,

    #[serde(rename = "durationMs", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl Report {
    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Process exit code: 2 on run errors, 1 on violations, 0 when clean
    pub fn exit_code(&self) -> i32 {
        if self.has_errors() {
            2
        } else if self.has_violations() {
            1
        } else {
            0
        }
    }

    /// Number of distinct files with at least one violation
    pub fn files_with_violations(&self) -> usize {
        let mut files: Vec<&Path> = self.violations.iter().map(Violation::file).collect();
        files.dedup();
        files.len()
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Collects per-file outcomes in any order and produces a sorted [`Report`]
#[derive(Debug, Default)]
pub struct ReportBuilder {
    report: Report,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_violations(&mut self, violations: impl IntoIterator<Item = Violation>) {
        self.report.violations.extend(violations);
    }

    pub fn add_error(&mut self, error: ProcessingError) {
        self.report.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.report.warnings.push(warning.into());
    }

    pub fn file_processed(&mut self) {
        self.report.files_processed += 1;
    }

    pub fn baseline_suppressed(&mut self, count: usize) {
        self.report.baseline_suppressed += count;
    }

    pub fn cache_stats(&mut self, stats: CacheStats) {
        self.report.cache = Some(stats);
    }

    pub fn build(mut self, duration: Duration) -> Report {
        sort_violations(&mut self.report.violations);
        self.report.errors.sort_by(|a, b| {
            a.file
                .cmp(&b.file)
                .then_with(|| a.rule.cmp(&b.rule))
                .then_with(|| a.message.cmp(&b.message))
        });
        self.report.duration = duration;
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn violation(file: &str, line: usize, rule: &str) -> Violation {
        Violation::new(rule, "Set", file, line)
    }

    #[test]
    fn test_builder_sorts_violations() {
        let mut builder = ReportBuilder::new();
        builder.add_violations(vec![violation("/b", 1, "R"), violation("/a", 9, "R")]);
        builder.add_violations(vec![violation("/a", 2, "S"), violation("/a", 2, "R")]);
        let report = builder.build(Duration::ZERO);

        let order: Vec<_> = report
            .violations
            .iter()
            .map(|v| (v.file().to_path_buf(), v.begin_line(), v.rule_id().to_string()))
            .collect();
        assert_eq!(
            order,
            vec![
                (PathBuf::from("/a"), 2, "R".to_string()),
                (PathBuf::from("/a"), 2, "S".to_string()),
                (PathBuf::from("/a"), 9, "R".to_string()),
                (PathBuf::from("/b"), 1, "R".to_string()),
            ]
        );
        assert_eq!(report.files_with_violations(), 2);
    }

    #[test]
    fn test_exit_code() {
        let mut builder = ReportBuilder::new();
        assert_eq!(ReportBuilder::new().build(Duration::ZERO).exit_code(), 0);

        builder.add_violations(vec![violation("/a", 1, "R")]);
        builder.add_warning("cache not written");
        let report = builder.build(Duration::ZERO);
        assert_eq!(report.exit_code(), 1);

        let mut builder = ReportBuilder::new();
        builder.add_error(ProcessingError::new("boom").in_file(Path::new("/a")));
        assert_eq!(builder.build(Duration::ZERO).exit_code(), 2);
    }

    #[test]
    fn test_processing_error_display() {
        let error = ProcessingError::new("failed at line 3")
            .in_file(Path::new("/src/a.json"))
            .for_rule("DuplicatedArrayKey");
        assert_eq!(
            error.to_string(),
            "/src/a.json: [DuplicatedArrayKey] failed at line 3"
        );
        assert_eq!(ProcessingError::new("bare").to_string(), "bare");
    }

    #[test]
    fn test_json_shape() {
        let mut builder = ReportBuilder::new();
        builder.file_processed();
        builder.cache_stats(CacheStats {
            hits: 1,
            ..CacheStats::default()
        });
        let json = serde_json::to_value(builder.build(Duration::from_millis(42))).unwrap();

        assert_eq!(json["filesProcessed"], 1);
        assert_eq!(json["durationMs"], 42);
        assert_eq!(json["cache"]["hits"], 1);
        assert!(json["errors"].as_array().unwrap().is_empty());
    }
}
