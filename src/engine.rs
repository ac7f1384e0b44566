//! The engine facade: dialect registry, checked parsing and the parallel
//! batch entry point.

use rayon::prelude::*;

use crate::{
    config::AnalyzerConfig,
    dialects::{DialectParser, criteria::FluentCriteriaDialect, driver::DriverBuilderDialect},
    error::{AppResult, non_candidate_error},
    ir::Node,
    syntax::{ExprId, SourceTree}
};

/// The analysis engine. Holds the enabled dialect matchers; stateless per
/// invocation, so a single engine can be shared across threads.
pub struct Engine {
    dialects: Vec<Box<dyn DialectParser + Send + Sync>>
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

impl Engine {
    pub fn new(config: AnalyzerConfig) -> Self {
        let mut dialects: Vec<Box<dyn DialectParser + Send + Sync>> = Vec::new();
        if config.dialects.is_enabled("driver-builder") {
            dialects.push(Box::new(DriverBuilderDialect::new(config.resolver.clone())));
        }
        if config.dialects.is_enabled("fluent-criteria") {
            dialects.push(Box::new(FluentCriteriaDialect::new(config.resolver.clone())));
        }
        Self {
            dialects
        }
    }

    /// The first enabled dialect accepting the expression as a candidate.
    pub fn dialect_for(&self, tree: &SourceTree, source: ExprId) -> Option<&dyn DialectParser> {
        self.dialects
            .iter()
            .map(|dialect| -> &dyn DialectParser { dialect.as_ref() })
            .find(|dialect| dialect.is_candidate_for_query(tree, source))
    }

    /// Whether any enabled dialect recognizes the expression as a query.
    pub fn is_candidate(&self, tree: &SourceTree, source: ExprId) -> bool {
        self.dialect_for(tree, source).is_some()
    }

    /// Parses a candidate expression into its IR tree.
    ///
    /// Fails only on the caller contract violation of handing in an
    /// expression no enabled dialect accepts; every in-query degradation
    /// is encoded in the returned tree instead.
    pub fn parse(&self, tree: &SourceTree, source: ExprId) -> AppResult<Node<ExprId>> {
        let Some(dialect) = self.dialect_for(tree, source) else {
            return Err(non_candidate_error("any enabled"));
        };
        Ok(dialect.parse(tree, source))
    }

    /// Parses many candidate expressions in parallel. Non-candidates
    /// produce `None` instead of failing the batch.
    pub fn parse_candidates(
        &self,
        tree: &SourceTree,
        sources: &[ExprId]
    ) -> Vec<Option<Node<ExprId>>> {
        sources
            .par_iter()
            .map(|source| self.parse(tree, *source).ok())
            .collect()
    }
}
