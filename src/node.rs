//! Syntax tree abstraction consumed by the rule engine
//!
//! Trees are produced by a [`Parser`](crate::parser::Parser). The engine only
//! relies on the [`Node`] trait; [`SyntaxNode`] is the owned implementation
//! used by the JSON tree adapter and by tests.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Capability tag of a syntax node.
///
/// Rules declare the kinds they accept and the engine dispatches on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Root of a source unit
    Unit,
    Class,
    Interface,
    Trait,
    Enum,
    Method,
    Function,
    Closure,
    /// Array literal; children are `ArrayElement` nodes
    Array,
    /// Array entry; an explicit key is an `ArrayKey` child
    ArrayElement,
    /// Wrapper around the key expression of an element
    ArrayKey,
    /// Literal value, the image holds its source text
    Literal,
    Variable,
    Call,
    Constant,
    Expression,
    Statement,
    #[serde(other)]
    Unknown,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Unit => "unit",
            NodeKind::Class => "class",
            NodeKind::Interface => "interface",
            NodeKind::Trait => "trait",
            NodeKind::Enum => "enum",
            NodeKind::Method => "method",
            NodeKind::Function => "function",
            NodeKind::Closure => "closure",
            NodeKind::Array => "array",
            NodeKind::ArrayElement => "array_element",
            NodeKind::ArrayKey => "array_key",
            NodeKind::Literal => "literal",
            NodeKind::Variable => "variable",
            NodeKind::Call => "call",
            NodeKind::Constant => "constant",
            NodeKind::Expression => "expression",
            NodeKind::Statement => "statement",
            NodeKind::Unknown => "unknown",
        }
    }

    /// Kinds that open a named callable scope
    pub fn is_callable(&self) -> bool {
        matches!(self, NodeKind::Method | NodeKind::Function)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source position of a node (lines and columns are 1-based)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    pub begin_line: usize,
    pub end_line: usize,
    #[serde(default)]
    pub begin_column: usize,
    #[serde(default)]
    pub end_column: usize,
}

impl Span {
    pub fn lines(begin_line: usize, end_line: usize) -> Self {
        Self {
            begin_line,
            end_line,
            begin_column: 0,
            end_column: 0,
        }
    }

    pub fn line(line: usize) -> Self {
        Self::lines(line, line)
    }
}

/// A node in a parsed syntax tree
pub trait Node: Send + Sync {
    /// Capability tag
    fn kind(&self) -> NodeKind;

    /// Name for declarations, source text for literals
    fn image(&self) -> &str;

    /// Direct children in source order
    fn children(&self) -> Vec<&dyn Node>;

    /// Source location
    fn span(&self) -> Span;

    /// Rule ids, rule-set names or `all` suppressed by an annotation on this node
    fn suppressions(&self) -> &[String] {
        &[]
    }

    fn child(&self, index: usize) -> Option<&dyn Node> {
        self.children().get(index).copied()
    }

    fn first_child_of_kind(&self, kind: NodeKind) -> Option<&dyn Node> {
        self.children().into_iter().find(|c| c.kind() == kind)
    }

    /// All descendants of `kind` in pre-order, excluding `self`
    fn find_children_of_kind(&self, kind: NodeKind) -> Vec<&dyn Node> {
        let mut found = Vec::new();
        for child in self.children() {
            collect_of_kind(child, kind, &mut found);
        }
        found
    }
}

fn collect_of_kind<'a>(node: &'a dyn Node, kind: NodeKind, found: &mut Vec<&'a dyn Node>) {
    if node.kind() == kind {
        found.push(node);
    }
    for child in node.children() {
        collect_of_kind(child, kind, found);
    }
}

/// Owned syntax tree node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub span: Span,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suppress: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    pub fn new(kind: NodeKind, image: &str) -> Self {
        Self {
            kind,
            image: image.to_string(),
            span: Span::default(),
            suppress: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.span = Span::line(line);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_child(mut self, child: SyntaxNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = SyntaxNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn suppressing(mut self, rule: &str) -> Self {
        self.suppress.push(rule.to_string());
        self
    }

    /// Count of nodes in this subtree, including `self`
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(SyntaxNode::size).sum::<usize>()
    }
}

impl Node for SyntaxNode {
    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn image(&self) -> &str {
        &self.image
    }

    fn children(&self) -> Vec<&dyn Node> {
        self.children.iter().map(|c| c as &dyn Node).collect()
    }

    fn span(&self) -> Span {
        self.span
    }

    fn suppressions(&self) -> &[String] {
        &self.suppress
    }
}
