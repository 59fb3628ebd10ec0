//! Rule violations produced by the engine

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// A single reported rule failure at a specific source location.
///
/// Violations are immutable once built; the builder methods consume `self`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    rule_id: String,
    rule_set: String,
    file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    begin_line: usize,
    end_line: usize,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    message: String,
}

impl Violation {
    /// Create a violation spanning a single line
    pub fn new(rule_id: &str, rule_set: &str, file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            rule_set: rule_set.to_string(),
            file: file.into(),
            method: None,
            begin_line: line,
            end_line: line,
            args: Vec::new(),
            message: String::new(),
        }
    }

    /// Attach the enclosing method or function (empty names are ignored)
    pub fn with_method(mut self, method: Option<&str>) -> Self {
        self.method = method.filter(|m| !m.is_empty()).map(String::from);
        self
    }

    pub fn with_end_line(mut self, end_line: usize) -> Self {
        self.end_line = end_line.max(self.begin_line);
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Format `template` with the current arguments
    pub fn with_message(mut self, template: &str) -> Self {
        self.message = format_message(template, &self.args);
        self
    }

    pub fn rule_id(&self) -> &str {
        &self.rule_id
    }

    pub fn rule_set(&self) -> &str {
        &self.rule_set
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn begin_line(&self) -> usize {
        self.begin_line
    }

    pub fn end_line(&self) -> usize {
        self.end_line
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Report order: file path, then begin line, then rule id
    pub fn report_order(&self, other: &Self) -> Ordering {
        self.file
            .cmp(&other.file)
            .then(self.begin_line.cmp(&other.begin_line))
            .then_with(|| self.rule_id.cmp(&other.rule_id))
    }
}

/// Sort violations into report order (stable for equal keys)
pub fn sort_violations(violations: &mut [Violation]) {
    violations.sort_by(Violation::report_order);
}

/// Replace `{0}`, `{1}`, ... placeholders with the matching argument
pub fn format_message(template: &str, args: &[String]) -> String {
    let mut message = String::with_capacity(template.len());
    let mut rest = template;

    // Single pass over the template; substituted text is never rescanned
    while let Some(open) = rest.find('{') {
        message.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let digits = tail.bytes().take_while(u8::is_ascii_digit).count();
        let arg = tail[..digits]
            .parse::<usize>()
            .ok()
            .filter(|_| tail[digits..].starts_with('}'))
            .and_then(|index| args.get(index));

        match arg {
            Some(arg) => {
                message.push_str(arg);
                rest = &tail[digits + 1..];
            }
            None => {
                message.push('{');
                rest = tail;
            }
        }
    }
    message.push_str(rest);
    message
}
