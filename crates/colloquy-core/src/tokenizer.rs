//! Token counting utilities for cost estimation and usage metering.
//!
//! Chat metering counts with a [`Tokenizer`] (tiktoken when it loads). Model
//! selection uses [`estimate_tokens`] and never loads a vocabulary.

use crate::error::{Error, Result};

/// Trait for tokenization operations.
pub trait Tokenizer: Send + Sync {
    /// Count the number of tokens in the given text.
    fn count_tokens(&self, text: &str) -> usize;

    /// Get the name/identifier of this tokenizer.
    fn name(&self) -> &str;
}

/// Tiktoken-based tokenizer implementation.
pub struct TiktokenTokenizer {
    bpe: tiktoken_rs::CoreBPE,
    name: String,
}

impl TiktokenTokenizer {
    /// Create a general-purpose tokenizer (cl100k_base).
    ///
    /// Used for metering models whose own tokenizer is not available locally.
    pub fn cl100k() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| Error::Internal(format!("Failed to initialize cl100k_base: {}", e)))?;

        Ok(Self {
            bpe,
            name: "cl100k_base".to_string(),
        })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Heuristic tokenizer backed by [`estimate_tokens`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatingTokenizer;

impl Tokenizer for EstimatingTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        estimate_tokens(text)
    }

    fn name(&self) -> &str {
        "estimate"
    }
}

/// Quickly estimate token count without full tokenization.
///
/// Uses a heuristic ratio of ~3.7 characters per token for English text.
pub fn estimate_tokens(text: &str) -> usize {
    (text.len() as f32 / 3.7).ceil() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens_empty() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_estimate_tokens_rounds_up() {
        // 4 bytes / 3.7 = 1.08 → 2
        assert_eq!(estimate_tokens("abcd"), 2);
    }

    #[test]
    fn test_estimate_tokens_grows_with_length() {
        let short = estimate_tokens("hello");
        let long = estimate_tokens(&"hello ".repeat(100));
        assert!(long > short);
    }

    #[test]
    fn test_cl100k_counts_tokens() {
        let tokenizer = TiktokenTokenizer::cl100k().unwrap();
        let count = tokenizer.count_tokens("The quick brown fox jumps over the lazy dog.");
        assert!(count > 5 && count < 20);
        assert_eq!(tokenizer.name(), "cl100k_base");
    }

    #[test]
    fn test_estimating_tokenizer_matches_estimate() {
        let text = "Schedule a meeting tomorrow";
        assert_eq!(EstimatingTokenizer.count_tokens(text), estimate_tokens(text));
    }
}
