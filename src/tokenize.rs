//! Token segmentation and the rejoining policy.
//!
//! The codec treats tokens as opaque strings; how text is split is up to the
//! [`Tokenizer`] it is given. Rejoining is fixed: one space between tokens,
//! except before closing punctuation and after opening marks.

use regex::Regex;

/// Splits text into an ordered sequence of tokens.
///
/// Implementations must be deterministic and free of side effects.
pub trait Tokenizer {
    /// Tokenize `text`.
    fn tokenize(&self, text: &str) -> Vec<String>;
}

impl<F> Tokenizer for F
where
    F: Fn(&str) -> Vec<String>,
{
    fn tokenize(&self, text: &str) -> Vec<String> {
        self(text)
    }
}

/// Word and punctuation runs of lowercased text.
const WORD_PATTERN: &str = r#"[\w']+|[.,!?;:\-"'()]+"#;

/// Default tokenizer: lowercases, keeps word runs and punctuation runs, drops
/// whitespace and anything else.
#[derive(Debug, Clone)]
pub struct WordTokenizer {
    pattern: Regex,
}

impl WordTokenizer {
    /// Create the default word tokenizer.
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(WORD_PATTERN).expect("word pattern is a valid regex"),
        }
    }
}

impl Default for WordTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.pattern
            .find_iter(&lowered)
            .map(|m| m.as_str().to_owned())
            .collect()
    }
}

const CLOSING: &[char] = &['.', ',', '!', '?', ';', ':', '"', '\'', ')'];
const OPENING: &[char] = &['(', '"', '\''];

fn all_in(token: &str, set: &[char]) -> bool {
    !token.is_empty() && token.chars().all(|c| set.contains(&c))
}

/// Rejoin tokens into readable text.
///
/// Original whitespace is not recoverable; a tokenizer that needs exact
/// whitespace must emit it as tokens of its own.
pub fn join_tokens<S: AsRef<str>>(tokens: &[S]) -> String {
    let mut text = String::with_capacity(tokens.iter().map(|t| t.as_ref().len() + 1).sum());
    let mut prev: Option<&str> = None;
    for token in tokens {
        let token = token.as_ref();
        if let Some(left) = prev {
            if !all_in(token, CLOSING) && !all_in(left, OPENING) {
                text.push(' ');
            }
        }
        text.push_str(token);
        prev = Some(token);
    }
    text
}
