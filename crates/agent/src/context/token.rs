//! Token counting.
//!
//! The default counter uses a character-based heuristic: ~4 characters per
//! token, rounded up. This is close enough for BPE tokenizers on English
//! prose and keeps budgets predictable in tests.

use thiserror::Error;

/// A counter could not tokenize its input.
#[derive(Debug, Clone, Error)]
#[error("tokenizer failed: {0}")]
pub struct TokenizeError(pub String);

/// Counts tokens for a piece of text.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> Result<usize, TokenizeError>;
}

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.chars().count().div_ceil(4)
}

/// The 4-characters-per-token estimator.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharEstimator;

impl TokenCounter for CharEstimator {
    fn count(&self, text: &str) -> Result<usize, TokenizeError> {
        Ok(estimate_tokens(text))
    }
}

/// Count with `counter`, falling back to the character estimate on failure.
pub fn count_or_estimate(counter: &dyn TokenCounter, text: &str) -> usize {
    match counter.count(text) {
        Ok(n) => n,
        Err(e) => {
            tracing::debug!(error = %e, chars = text.len(), "Token counter failed, estimating");
            estimate_tokens(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenCounter;

    impl TokenCounter for BrokenCounter {
        fn count(&self, _text: &str) -> Result<usize, TokenizeError> {
            Err(TokenizeError("unsupported".into()))
        }
    }

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn hundred_chars() {
        let text = "a".repeat(100);
        assert_eq!(estimate_tokens(&text), 25);
    }

    #[test]
    fn counts_chars_not_bytes() {
        // 4 chars, 8 bytes
        assert_eq!(estimate_tokens("éééé"), 1);
    }

    #[test]
    fn failing_counter_falls_back() {
        assert_eq!(count_or_estimate(&BrokenCounter, "abcdefgh"), 2);
        assert_eq!(count_or_estimate(&CharEstimator, "abcdefgh"), 2);
    }
}
