//! Parser boundary
//!
//! Language front-ends implement [`Parser`]. The crate ships
//! [`JsonTreeParser`], which reads syntax trees that an external front-end has
//! serialized as JSON.

use crate::node::{Node, NodeKind, SyntaxNode};
use crate::source::SourceUnit;
use thiserror::Error;

/// Error during parsing
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Syntax tree error at line {line}, column {column}: {message}")]
    Tree {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Invalid document: {0}")]
    Invalid(String),
}

/// Turns a source unit into a syntax tree
pub trait Parser: Send + Sync {
    /// Parser identifier (e.g., "json-tree")
    fn id(&self) -> &str;

    /// File extensions this parser handles (without dot)
    fn extensions(&self) -> &[&str];

    /// Parse a unit into a tree rooted at a [`NodeKind::Unit`] node
    fn parse(&self, unit: &SourceUnit) -> Result<Box<dyn Node>, ParseError>;
}

/// Reads pre-parsed syntax trees stored as JSON
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonTreeParser;

impl JsonTreeParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_str(&self, content: &str) -> Result<SyntaxNode, ParseError> {
        let root: SyntaxNode = serde_json::from_str(content).map_err(|e| ParseError::Tree {
            line: e.line(),
            column: e.column(),
            message: e.to_string(),
        })?;

        if root.kind != NodeKind::Unit {
            return Err(ParseError::Invalid(format!(
                "root node must be `unit`, found `{}`",
                root.kind
            )));
        }
        Ok(root)
    }
}

impl Parser for JsonTreeParser {
    fn id(&self) -> &str {
        "json-tree"
    }

    fn extensions(&self) -> &[&str] {
        &["json"]
    }

    fn parse(&self, unit: &SourceUnit) -> Result<Box<dyn Node>, ParseError> {
        let root = self.parse_str(unit.text()?)?;
        Ok(Box::new(root))
    }
}
