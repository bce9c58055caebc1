// ── Engine: Utterance Tokenizer ────────────────────────────────────────────
//
// Splits an utterance into normalized word tokens. Any string is valid
// input; there are no error conditions. Template strings do NOT go through
// this module; they have their own mini-grammar in `engine::grammar`.

use crate::atoms::types::Token;

/// Tokenize an utterance into an ordered sequence of word tokens.
///
/// Splits on whitespace and strips a trailing `?` from each word (speech
/// recognition engines occasionally attach one). Comparison happens on the
/// normalized form carried by each token. Empty input yields an empty vec.
pub fn tokenize(text: &str) -> Vec<Token> {
    text.split_whitespace()
        .map(|w| Token::new(w.strip_suffix('?').unwrap_or(w)))
        .filter(|t| !t.norm.is_empty())
        .collect()
}

/// Join the surface forms of a token span back into a text fragment, for
/// handing to concept extract functions.
pub fn span_text(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| t.word.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
