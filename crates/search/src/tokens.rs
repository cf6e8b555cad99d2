//! Prompt token accounting.
//!
//! Counts are only reported in search results; they never influence what
//! gets sent to the model.

use unicode_segmentation::UnicodeSegmentation;

/// Characters covered by one token before a segment costs another.
const CHARS_PER_TOKEN: usize = 4;

/// Tokenizer used for `prompt_tokens`.
pub trait TokenEncoder: Send + Sync {
    /// Encoder name, for logs.
    fn name(&self) -> &str;

    /// Number of tokens `text` encodes to.
    fn count(&self, text: &str) -> usize;
}

/// Fixed word-piece approximation built on Unicode word boundaries.
///
/// Each non-whitespace segment is one token, plus one more for every
/// further four characters, so long identifiers and numbers cost more than
/// short words.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordPieceEncoder;

impl TokenEncoder for WordPieceEncoder {
    fn name(&self) -> &str {
        "word-piece"
    }

    fn count(&self, text: &str) -> usize {
        text.split_word_bounds()
            .filter(|segment| !segment.trim().is_empty())
            .map(|segment| 1 + (segment.chars().count() - 1) / CHARS_PER_TOKEN)
            .sum()
    }
}

/// Count the tokens of `text` with `encoder`.
pub fn num_tokens(text: &str, encoder: &dyn TokenEncoder) -> usize {
    encoder.count(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_zero() {
        assert_eq!(num_tokens("", &WordPieceEncoder), 0);
        assert_eq!(num_tokens("   \n\t", &WordPieceEncoder), 0);
    }

    #[test]
    fn test_short_words_and_punctuation() {
        // "What" "is" "the" "fee" "?"
        assert_eq!(num_tokens("What is the fee?", &WordPieceEncoder), 5);
    }

    #[test]
    fn test_long_segments_cost_more() {
        // "hundredweight" has 13 chars: 1 + 12 / 4 = 4
        assert_eq!(num_tokens("hundredweight", &WordPieceEncoder), 4);
        assert!(num_tokens("hundredweight", &WordPieceEncoder) > num_tokens("cwt", &WordPieceEncoder));
    }

    #[test]
    fn test_count_is_deterministic() {
        let text = "Carrier X charges $5/cwt for lineal foot rules.";
        assert_eq!(
            num_tokens(text, &WordPieceEncoder),
            num_tokens(text, &WordPieceEncoder)
        );
    }
}
