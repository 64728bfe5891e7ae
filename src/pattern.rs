//! Regular expression compatibility checking
//!
//! Contract patterns must be accepted by a linear-time (RE2 family) engine
//! so that evaluating them can never backtrack. The `regex` crate belongs to
//! that family and rejects look-around and backreferences.

use regex::RegexBuilder;

/// Checks whether a pattern can be compiled by the deterministic engine
pub trait PatternChecker: Send + Sync {
    /// Returns the engine's message when the pattern is rejected
    fn check(&self, pattern: &str) -> Result<(), String>;
}

#[derive(Debug, Clone)]
pub struct Re2PatternChecker {
    size_limit: usize,
}

impl Re2PatternChecker {
    pub const DEFAULT_SIZE_LIMIT: usize = 1 << 20;

    pub fn new() -> Self {
        Self {
            size_limit: Self::DEFAULT_SIZE_LIMIT,
        }
    }

    /// Limit on the compiled program size
    pub fn with_size_limit(size_limit: usize) -> Self {
        Self { size_limit }
    }
}

impl Default for Re2PatternChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternChecker for Re2PatternChecker {
    fn check(&self, pattern: &str) -> Result<(), String> {
        RegexBuilder::new(pattern)
            .size_limit(self.size_limit)
            .build()
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}
