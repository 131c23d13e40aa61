//! Compiler configuration.

/// Tunables for [`SingleQueueCompiler`](crate::compiler::SingleQueueCompiler).
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerConfig {
    /// Cost added for every pair of adjacent operations with different tags.
    pub tag_switch_cost: f32,
    /// Cache partial schedules keyed by the set of already scheduled operations.
    ///
    /// The produced order is identical either way; only compile time changes.
    pub memoize_schedule: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            tag_switch_cost: 10.0,
            memoize_schedule: true,
        }
    }
}

impl CompilerConfig {
    /// Set the tag switch cost.
    pub fn with_tag_switch_cost(mut self, cost: f32) -> Self {
        self.tag_switch_cost = cost;
        self
    }

    /// Enable or disable schedule memoisation.
    pub fn with_memoize_schedule(mut self, memoize: bool) -> Self {
        self.memoize_schedule = memoize;
        self
    }
}
