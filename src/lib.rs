//! Messcheck - Incremental Mess Detector
//!
//! A static analysis engine that runs an open set of structural rules over
//! syntax trees, suppresses accepted violations through a baseline document and
//! skips unchanged files through a persistent result cache.
//!
//! # Architecture
//!
//! ```text
//! CLI/API -> Analyzer -> ResultCache (hit?) -> Parser -> Engine -> Rules
//!                                                          |
//!                     Report <- ResultCache (merge) <- BaselineSet
//! ```
//!
//! The analyzer computes a cache key from the run configuration, reuses
//! per-file results whose signature is unchanged, dispatches the remaining
//! files to the rule engine on a worker pool, filters the fresh violations
//! through the baseline and merges everything back into the cache before
//! assembling the final [`Report`].
//!
//! # Writing Rules
//!
//! ```rust,ignore
//! struct LongFunctionName { settings: RuleSettings }
//!
//! impl Rule for LongFunctionName {
//!     fn id(&self) -> &str { "LongFunctionName" }
//!     fn rule_set(&self) -> &str { "Naming Rules" }
//!     fn message(&self) -> &str { "Function name {0} is too long" }
//!     fn capabilities(&self) -> &[NodeKind] { &[NodeKind::Function] }
//!     fn settings(&self) -> &RuleSettings { &self.settings }
//!
//!     fn apply(&self, node: &dyn Node, ctx: &mut RuleContext<'_>) -> Result<(), RuleError> {
//!         if node.image().len() > 40 {
//!             ctx.add_violation(node, vec![node.image().to_string()]);
//!         }
//!         Ok(())
//!     }
//! }
//! ```

pub mod analyzer;
pub mod baseline;
pub mod cache;
pub mod config;
pub mod engine;
pub mod hash;
pub mod node;
pub mod parser;
pub mod paths;
pub mod report;
pub mod rule;
pub mod rules;
pub mod source;
pub mod violation;

// Re-export main types
pub use analyzer::{Analyzer, AnalyzerError};
pub use baseline::{BaselineEntry, BaselineError, BaselineSet};
pub use cache::{
    compute_key, CacheError, CacheKeyInputs, CacheStats, FreshnessStrategy, ResultCache,
    ResultCacheKey, ResultCacheState,
};
pub use config::{Config, ConfigError};
pub use engine::{Engine, RuleFailure, UnitAnalysis};
pub use node::{Node, NodeKind, Span, SyntaxNode};
pub use parser::{JsonTreeParser, ParseError, Parser};
pub use report::{ProcessingError, Report, ReportBuilder};
pub use rule::{Rule, RuleContext, RuleError, RuleSettings};
pub use source::SourceUnit;
pub use violation::Violation;
