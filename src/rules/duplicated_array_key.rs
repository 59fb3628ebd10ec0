//! Duplicated array key detection
//!
//! Flags array literals declaring the same key more than once. Later entries
//! silently overwrite earlier ones at runtime, which is almost always a
//! copy/paste mistake.

use crate::node::{Node, NodeKind};
use crate::rule::{Rule, RuleContext, RuleError, RuleSettings};
use std::collections::HashSet;

pub struct DuplicatedArrayKey {
    settings: RuleSettings,
}

impl DuplicatedArrayKey {
    pub const ID: &'static str = "DuplicatedArrayKey";
    pub const RULE_SET: &'static str = "Clean Code Rules";

    pub fn new(settings: RuleSettings) -> Self {
        Self { settings }
    }

    fn analyze_array(&self, array: &dyn Node, ctx: &mut RuleContext<'_>) {
        let mut seen: HashSet<String> = HashSet::new();
        let elements = array
            .children()
            .into_iter()
            .filter(|c| c.kind() == NodeKind::ArrayElement);

        for (index, element) in elements.enumerate() {
            // Dynamic keys cannot be resolved statically
            let Some((key, located)) = normalize_key(element, index) else {
                continue;
            };
            if seen.contains(&key) {
                let line = located.span().begin_line;
                ctx.add_violation(located, vec![key, line.to_string()]);
                continue;
            }
            seen.insert(key);
        }
    }
}

impl Default for DuplicatedArrayKey {
    fn default() -> Self {
        Self::new(RuleSettings::default())
    }
}

impl Rule for DuplicatedArrayKey {
    fn id(&self) -> &str {
        Self::ID
    }

    fn rule_set(&self) -> &str {
        Self::RULE_SET
    }

    fn message(&self) -> &str {
        "Duplicated array key {0}, repeated at line {1}."
    }

    fn description(&self) -> &str {
        "Defining another value for an array key that already exists overwrites the first one."
    }

    fn capabilities(&self) -> &[NodeKind] {
        &[NodeKind::Method, NodeKind::Function]
    }

    fn settings(&self) -> &RuleSettings {
        &self.settings
    }

    fn apply(&self, node: &dyn Node, ctx: &mut RuleContext<'_>) -> Result<(), RuleError> {
        let mut arrays = Vec::new();
        for child in node.children() {
            collect_arrays(child, &mut arrays);
        }
        for array in arrays {
            self.analyze_array(array, ctx);
        }
        Ok(())
    }
}

/// Arrays of this callable body. Nested declarations are dispatched on their
/// own, so the walk stops at them.
fn collect_arrays<'a>(node: &'a dyn Node, arrays: &mut Vec<&'a dyn Node>) {
    match node.kind() {
        NodeKind::Method
        | NodeKind::Function
        | NodeKind::Class
        | NodeKind::Interface
        | NodeKind::Trait
        | NodeKind::Enum => return,
        NodeKind::Array => arrays.push(node),
        _ => {}
    }
    for child in node.children() {
        collect_arrays(child, arrays);
    }
}

/// Comparable key of an element and the node the violation points at
fn normalize_key(element: &dyn Node, index: usize) -> Option<(String, &dyn Node)> {
    let Some(key) = element.first_child_of_kind(NodeKind::ArrayKey) else {
        return Some((index.to_string(), element));
    };
    let expression = key.child(0)?;
    if expression.kind() != NodeKind::Literal {
        return None;
    }
    let located = if expression.span().begin_line > 0 {
        expression
    } else {
        element
    };
    Some((literal_key(expression.image()), located))
}

/// Coerce a literal key the way array semantics do
fn literal_key(image: &str) -> String {
    let image = image.trim();
    if image.eq_ignore_ascii_case("true") {
        "1".to_string()
    } else if image.eq_ignore_ascii_case("false") {
        "0".to_string()
    } else if image.eq_ignore_ascii_case("null") {
        String::new()
    } else {
        image.trim_matches(|c| c == '\'' || c == '"').to_string()
    }
}
