//! Executor configuration.

/// Default ceiling on intermediate bindings produced by source resolution.
pub const DEFAULT_MAX_ROWS: usize = 1_000_000;

/// Default number of left bindings above which joins switch to a hash join.
pub const DEFAULT_HASH_JOIN_THRESHOLD: usize = 100;

/// Query executor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Maximum number of bindings source resolution may produce.
    pub max_rows: usize,

    /// Left-binding count above which joins use a hash join.
    pub hash_join_threshold: usize,
}

impl ExecutorConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self {
            max_rows: DEFAULT_MAX_ROWS,
            hash_join_threshold: DEFAULT_HASH_JOIN_THRESHOLD,
        }
    }

    /// Set the intermediate row budget.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Set the hash join threshold.
    pub fn with_hash_join_threshold(mut self, threshold: usize) -> Self {
        self.hash_join_threshold = threshold;
        self
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_overrides() {
        let config = ExecutorConfig::default();
        assert_eq!(config.max_rows, DEFAULT_MAX_ROWS);
        assert_eq!(config.hash_join_threshold, 100);

        let config = config.with_max_rows(10).with_hash_join_threshold(0);
        assert_eq!(config.max_rows, 10);
        assert_eq!(config.hash_join_threshold, 0);
    }
}
