//! The interface the executor uses to ask questions about a query.

use lakeq_core::date::DateBounds;

use crate::classify::{classify_with_threshold, SizeClass, DEFAULT_LIMIT_THRESHOLD};
use crate::extract::extract_bounds;

pub trait QueryInspector: Send + Sync {
    /// Predicted result size.
    fn size_class(&self, sql: &str) -> SizeClass;

    /// Date bounds implied by the query, before defaults.
    fn date_bounds(&self, sql: &str) -> DateBounds;
}

/// Textual heuristics from `classify` and `extract`.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicInspector {
    pub limit_threshold: u64,
}

impl HeuristicInspector {
    pub fn new(limit_threshold: u64) -> Self {
        Self { limit_threshold }
    }
}

impl Default for HeuristicInspector {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT_THRESHOLD)
    }
}

impl QueryInspector for HeuristicInspector {
    fn size_class(&self, sql: &str) -> SizeClass {
        classify_with_threshold(sql, self.limit_threshold)
    }

    fn date_bounds(&self, sql: &str) -> DateBounds {
        extract_bounds(sql)
    }
}
