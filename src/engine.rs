//! Rule dispatch engine
//!
//! Walks a syntax tree once and invokes every rule registered for the kind of
//! the visited node. The registry is built at construction time, so dispatch
//! is a map lookup per node.

use crate::node::{Node, NodeKind};
use crate::rule::{Rule, RuleContext, RuleError};
use crate::violation::{sort_violations, Violation};
use log::debug;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// A rule that failed on a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    pub rule_id: String,
    pub error: RuleError,
}

/// Result of analyzing one source unit
#[derive(Debug, Default)]
pub struct UnitAnalysis {
    /// Violations in report order
    pub violations: Vec<Violation>,

    /// Rules that failed while analyzing the unit
    pub failures: Vec<RuleFailure>,
}

impl UnitAnalysis {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The rule engine
pub struct Engine {
    rules: Vec<Arc<dyn Rule>>,

    /// Node kind -> indices into `rules`
    registry: HashMap<NodeKind, Vec<usize>>,

    /// Ignore suppression annotations
    strict: bool,
}

impl Engine {
    /// Create an engine for a fixed rule set
    pub fn new(rules: Vec<Arc<dyn Rule>>) -> Self {
        let mut registry: HashMap<NodeKind, Vec<usize>> = HashMap::new();
        for (index, rule) in rules.iter().enumerate() {
            for kind in rule.capabilities() {
                let indices = registry.entry(*kind).or_default();
                if !indices.contains(&index) {
                    indices.push(index);
                }
            }
        }

        Self {
            rules,
            registry,
            strict: false,
        }
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    /// Rules registered for `kind`, in registration order
    pub fn rules_for(&self, kind: NodeKind) -> impl Iterator<Item = &Arc<dyn Rule>> + '_ {
        self.registry
            .get(&kind)
            .into_iter()
            .flatten()
            .map(move |&index| &self.rules[index])
    }

    /// Run every matching rule over the tree rooted at `root`
    pub fn analyze(&self, root: &dyn Node, file: &Path) -> UnitAnalysis {
        let mut analysis = UnitAnalysis::default();
        let mut suppressed = Vec::new();
        self.walk(root, None, &mut suppressed, file, &mut analysis);

        sort_violations(&mut analysis.violations);
        debug!(
            "{}: {} violation(s), {} rule failure(s)",
            file.display(),
            analysis.violations.len(),
            analysis.failures.len()
        );
        analysis
    }

    fn walk<'t>(
        &self,
        node: &'t dyn Node,
        method: Option<&'t str>,
        suppressed: &mut Vec<&'t str>,
        file: &Path,
        analysis: &mut UnitAnalysis,
    ) {
        let kind = node.kind();
        let method = if kind.is_callable() {
            Some(node.image()).filter(|name| !name.is_empty())
        } else {
            method
        };

        let mark = suppressed.len();
        if !self.strict {
            suppressed.extend(node.suppressions().iter().map(String::as_str));
        }

        for rule in self.rules_for(kind) {
            if is_suppressed(rule.as_ref(), suppressed) {
                continue;
            }

            let mut ctx = RuleContext::new(rule.as_ref(), file, method);
            match rule.apply(node, &mut ctx) {
                Ok(()) => analysis.violations.extend(ctx.into_violations()),
                Err(error) => {
                    // Partial output of a failed invocation is dropped
                    debug!("{} failed on {}: {}", rule.id(), file.display(), error);
                    analysis.failures.push(RuleFailure {
                        rule_id: rule.id().to_string(),
                        error,
                    });
                }
            }
        }

        for child in node.children() {
            self.walk(child, method, suppressed, file, analysis);
        }

        suppressed.truncate(mark);
    }
}

/// Whether an active annotation suppresses `rule`.
///
/// Matches `all`, the rule-set name, the rule id, or a qualified form such as
/// `messcheck.DuplicatedArrayKey`.
fn is_suppressed(rule: &dyn Rule, suppressed: &[&str]) -> bool {
    suppressed.iter().any(|entry| {
        let entry = entry.trim();
        entry.eq_ignore_ascii_case("all")
            || entry == rule.id()
            || entry == rule.rule_set()
            || entry
                .strip_suffix(rule.id())
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Span, SyntaxNode};
    use crate::rule::RuleSettings;
    use crate::rules::DuplicatedArrayKey;

    /// Flags every node it is dispatched on
    struct Marker {
        id: &'static str,
        kinds: Vec<NodeKind>,
        settings: RuleSettings,
    }

    impl Marker {
        fn new(id: &'static str, kinds: &[NodeKind]) -> Arc<dyn Rule> {
            Arc::new(Self {
                id,
                kinds: kinds.to_vec(),
                settings: RuleSettings::default(),
            })
        }
    }

    impl Rule for Marker {
        fn id(&self) -> &str {
            self.id
        }

        fn rule_set(&self) -> &str {
            "Test Rules"
        }

        fn message(&self) -> &str {
            "{0}"
        }

        fn capabilities(&self) -> &[NodeKind] {
            &self.kinds
        }

        fn settings(&self) -> &RuleSettings {
            &self.settings
        }

        fn apply(&self, node: &dyn Node, ctx: &mut RuleContext<'_>) -> Result<(), RuleError> {
            ctx.add_violation(node, vec![node.image().to_string()]);
            Ok(())
        }
    }

    struct Exploding;

    impl Rule for Exploding {
        fn id(&self) -> &str {
            "Exploding"
        }

        fn rule_set(&self) -> &str {
            "Test Rules"
        }

        fn message(&self) -> &str {
            "never"
        }

        fn capabilities(&self) -> &[NodeKind] {
            &[NodeKind::Function]
        }

        fn settings(&self) -> &RuleSettings {
            static SETTINGS: std::sync::OnceLock<RuleSettings> = std::sync::OnceLock::new();
            SETTINGS.get_or_init(RuleSettings::default)
        }

        fn apply(&self, node: &dyn Node, ctx: &mut RuleContext<'_>) -> Result<(), RuleError> {
            ctx.add_violation(node, vec![]);
            Err(ctx.failure(node, "unsupported construct"))
        }
    }

    fn tree() -> SyntaxNode {
        SyntaxNode::new(NodeKind::Unit, "").with_children(vec![
            SyntaxNode::new(NodeKind::Class, "Service")
                .with_span(Span::lines(1, 20))
                .with_child(
                    SyntaxNode::new(NodeKind::Method, "load")
                        .with_span(Span::lines(2, 8))
                        .with_child(SyntaxNode::new(NodeKind::Call, "fetch").at_line(3)),
                ),
            SyntaxNode::new(NodeKind::Function, "helper")
                .with_span(Span::lines(22, 30))
                .with_child(SyntaxNode::new(NodeKind::Call, "strlen").at_line(23)),
        ])
    }

    #[test]
    fn test_registry_dispatches_by_kind() {
        let engine = Engine::new(vec![
            Marker::new("Calls", &[NodeKind::Call]),
            Marker::new("Classes", &[NodeKind::Class]),
        ]);

        assert_eq!(engine.rules_for(NodeKind::Call).count(), 1);
        assert_eq!(engine.rules_for(NodeKind::Literal).count(), 0);

        let analysis = engine.analyze(&tree(), Path::new("/a.php"));
        let ids: Vec<_> = analysis
            .violations
            .iter()
            .map(|v| (v.begin_line(), v.rule_id().to_string()))
            .collect();
        assert_eq!(
            ids,
            vec![
                (1, "Classes".to_string()),
                (3, "Calls".to_string()),
                (23, "Calls".to_string()),
            ]
        );
    }

    #[test]
    fn test_enclosing_method_is_tracked() {
        let engine = Engine::new(vec![Marker::new("Calls", &[NodeKind::Call])]);
        let analysis = engine.analyze(&tree(), Path::new("/a.php"));

        let methods: Vec<_> = analysis.violations.iter().map(|v| v.method()).collect();
        assert_eq!(methods, vec![Some("load"), Some("helper")]);
    }

    #[test]
    fn test_suppression_annotation() {
        let root = SyntaxNode::new(NodeKind::Unit, "").with_child(
            SyntaxNode::new(NodeKind::Function, "legacy")
                .suppressing("Calls")
                .with_child(SyntaxNode::new(NodeKind::Call, "x").at_line(2)),
        );
        let rules = vec![Marker::new("Calls", &[NodeKind::Call])];

        let lenient = Engine::new(rules.clone());
        assert!(lenient.analyze(&root, Path::new("/a.php")).violations.is_empty());

        let strict = Engine::new(rules).with_strict(true);
        assert_eq!(strict.analyze(&root, Path::new("/a.php")).violations.len(), 1);
    }

    #[test]
    fn test_suppression_does_not_leak_to_siblings() {
        let root = SyntaxNode::new(NodeKind::Unit, "").with_children(vec![
            SyntaxNode::new(NodeKind::Function, "a")
                .suppressing("all")
                .with_child(SyntaxNode::new(NodeKind::Call, "x").at_line(2)),
            SyntaxNode::new(NodeKind::Function, "b")
                .with_child(SyntaxNode::new(NodeKind::Call, "y").at_line(5)),
        ]);
        let engine = Engine::new(vec![Marker::new("Calls", &[NodeKind::Call])]);
        let analysis = engine.analyze(&root, Path::new("/a.php"));

        assert_eq!(analysis.violations.len(), 1);
        assert_eq!(analysis.violations[0].begin_line(), 5);
    }

    #[test]
    fn test_is_suppressed_forms() {
        let rule = DuplicatedArrayKey::default();
        assert!(is_suppressed(&rule, &["ALL"]));
        assert!(is_suppressed(&rule, &["DuplicatedArrayKey"]));
        assert!(is_suppressed(&rule, &["Clean Code Rules"]));
        assert!(is_suppressed(&rule, &["messcheck.DuplicatedArrayKey"]));
        assert!(!is_suppressed(&rule, &["NotDuplicatedArrayKey"]));
        assert!(!is_suppressed(&rule, &[]));
    }

    #[test]
    fn test_rule_failure_keeps_other_rules() {
        let exploding: Arc<dyn Rule> = Arc::new(Exploding);
        let engine = Engine::new(vec![
            exploding,
            Marker::new("Functions", &[NodeKind::Function]),
        ]);
        let analysis = engine.analyze(&tree(), Path::new("/a.php"));

        assert!(!analysis.is_complete());
        assert_eq!(analysis.failures.len(), 1);
        assert_eq!(analysis.failures[0].rule_id, "Exploding");
        assert_eq!(analysis.violations.len(), 1);
        assert_eq!(analysis.violations[0].rule_id(), "Functions");
    }

    #[test]
    fn test_duplicate_capabilities_register_once() {
        let engine = Engine::new(vec![Marker::new(
            "Twice",
            &[NodeKind::Call, NodeKind::Call],
        )]);
        let analysis = engine.analyze(&tree(), Path::new("/a.php"));
        assert_eq!(analysis.violations.len(), 2);
    }
}
