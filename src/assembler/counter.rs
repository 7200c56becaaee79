//! Token counting for conversation budgeting.
//!
//! Counting is a pure function of a content string so that any tokenizer
//! can be swapped in without touching the trimming logic.

/// Trait for token counting implementations.
pub trait TokenCounter: Send + Sync {
    /// Count tokens in a plain text string.
    fn count(&self, text: &str) -> usize;
}

/// Heuristic token counter using character-based estimation.
///
/// Uses the approximation tokens ~= characters / 4, rounded up. This is
/// conservative enough for budgeting without pulling in a real tokenizer.
#[derive(Debug, Clone)]
pub struct HeuristicTokenCounter {
    chars_per_token: usize,
}

impl HeuristicTokenCounter {
    pub fn new(chars_per_token: usize) -> Self {
        Self { chars_per_token }
    }
}

impl Default for HeuristicTokenCounter {
    fn default() -> Self {
        Self::new(4)
    }
}

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, text: &str) -> usize {
        let chars = text.chars().count();
        chars.div_ceil(self.chars_per_token)
    }
}
