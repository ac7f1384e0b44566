//! The per-dialect pattern matchers.
//!
//! A dialect is a specific query-builder API shape. Every dialect
//! implements the same capability — candidacy check, attachment-point
//! resolution and parsing into the shared IR — and all of them lean on the
//! same reference, namespace and type resolvers, so adding a dialect means
//! adding one matcher, not a new engine.

pub mod criteria;
pub mod driver;

use crate::{
    ir::{DialectName, Node},
    syntax::{ExprId, SourceTree}
};

/// The capability every dialect matcher provides.
///
/// `parse` expects a candidate expression and resolves the attachment
/// point internally (the handed expression may extend past it, e.g. with
/// cursor modifiers that carry metadata). Calling `parse` on a
/// non-candidate is a caller contract violation with an unspecified (but
/// non-panicking) result; use the engine facade for the checked path.
pub trait DialectParser {
    fn dialect(&self) -> DialectName;

    /// Whether the expression looks like a query of this dialect at all.
    fn is_candidate_for_query(&self, tree: &SourceTree, source: ExprId) -> bool;

    /// The sub-expression downstream consumers should treat as "the
    /// query" for this candidate.
    fn attachment(&self, tree: &SourceTree, source: ExprId) -> Option<ExprId>;

    /// Translates the expression into an IR tree. Degradations are encoded
    /// in the returned tree's tagged unions; this never fails for
    /// candidates.
    fn parse(&self, tree: &SourceTree, source: ExprId) -> Node<ExprId>;
}
