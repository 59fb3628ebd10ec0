//! Rule contract and per-invocation context

use crate::hash::Fingerprint;
use crate::node::{Node, NodeKind};
use crate::violation::Violation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Error raised by a rule while analyzing a node
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("{rule} failed at line {line}: {message}")]
    Failed {
        rule: String,
        line: usize,
        message: String,
    },

    #[error("Invalid property `{property}` for {rule}: {message}")]
    InvalidProperty {
        rule: String,
        property: String,
        message: String,
    },
}

/// Effective settings of a configured rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSettings {
    /// 1 (highest) to 5 (lowest)
    pub priority: u8,

    /// Rule specific properties
    pub properties: BTreeMap<String, String>,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            priority: 3,
            properties: BTreeMap::new(),
        }
    }
}

impl RuleSettings {
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn with_property(mut self, name: &str, value: &str) -> Self {
        self.properties.insert(name.to_string(), value.to_string());
        self
    }

    /// Integer property with a fallback for when it is not configured
    pub fn int_property(&self, rule: &str, name: &str, default: i64) -> Result<i64, RuleError> {
        match self.property(name) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| RuleError::InvalidProperty {
                rule: rule.to_string(),
                property: name.to_string(),
                message: format!("expected an integer, found `{}`", raw),
            }),
        }
    }
}

/// A detector dispatched by the engine on nodes of its declared kinds.
///
/// `apply` must be a pure function of the node and its subtree: rules run on
/// any worker in any order.
pub trait Rule: Send + Sync {
    /// Unique rule identifier (e.g., "DuplicatedArrayKey")
    fn id(&self) -> &str;

    /// Name of the rule set the rule belongs to
    fn rule_set(&self) -> &str;

    /// Message template, `{n}` is replaced by the n-th violation argument
    fn message(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Node kinds this rule is invoked on
    fn capabilities(&self) -> &[NodeKind];

    fn settings(&self) -> &RuleSettings;

    /// Hash of the effective configuration, part of the result cache key
    fn fingerprint(&self) -> String {
        settings_fingerprint(self.id(), self.rule_set(), self.settings())
    }

    fn apply(&self, node: &dyn Node, ctx: &mut RuleContext<'_>) -> Result<(), RuleError>;
}

/// Fingerprint of a rule identity plus its settings
pub fn settings_fingerprint(id: &str, rule_set: &str, settings: &RuleSettings) -> String {
    let mut fingerprint = Fingerprint::new()
        .field(id)
        .field(rule_set)
        .field(&settings.priority.to_string());
    for (name, value) in &settings.properties {
        fingerprint = fingerprint.field(name).field(value);
    }
    fingerprint.finish()
}

/// Collects the violations of one rule invocation
pub struct RuleContext<'a> {
    rule: &'a dyn Rule,
    file: &'a Path,
    method: Option<&'a str>,
    violations: Vec<Violation>,
}

impl<'a> RuleContext<'a> {
    pub fn new(rule: &'a dyn Rule, file: &'a Path, method: Option<&'a str>) -> Self {
        Self {
            rule,
            file,
            method,
            violations: Vec::new(),
        }
    }

    pub fn file(&self) -> &Path {
        self.file
    }

    /// Name of the enclosing method or function, if any
    pub fn method(&self) -> Option<&str> {
        self.method
    }

    pub fn settings(&self) -> &RuleSettings {
        self.rule.settings()
    }

    /// Record a violation located at `node`
    pub fn add_violation(&mut self, node: &dyn Node, args: Vec<String>) {
        let span = node.span();
        let violation = Violation::new(
            self.rule.id(),
            self.rule.rule_set(),
            self.file,
            span.begin_line,
        )
        .with_end_line(span.end_line)
        .with_method(self.method)
        .with_args(args)
        .with_message(self.rule.message());
        self.violations.push(violation);
    }

    /// Build a failure located at `node`
    pub fn failure(&self, node: &dyn Node, message: &str) -> RuleError {
        RuleError::Failed {
            rule: self.rule.id().to_string(),
            line: node.span().begin_line,
            message: message.to_string(),
        }
    }

    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}
