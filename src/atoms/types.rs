// ── Parlance Atoms: Core Types ─────────────────────────────────────────────
// Plain data shared across the engine. No behavior beyond constructors and
// trivial accessors; the algorithms live in `engine::*`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Tokens ─────────────────────────────────────────────────────────────────

/// A single lexical unit of an utterance.
///
/// `word` preserves the surface form (minus a trailing `?`); `norm` is the
/// comparison form: lowercase, apostrophes removed, trailing sentence
/// punctuation stripped. "Thank's?" and "thanks" normalize identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub word: String,
    pub norm: String,
}

impl Token {
    pub fn new(word: impl Into<String>) -> Self {
        let word: String = word.into();
        let norm = normalize_word(&word);
        Token { word, norm }
    }
}

/// Comparison form of a word: lowercase, no apostrophes, no trailing
/// sentence punctuation.
pub fn normalize_word(word: &str) -> String {
    word.trim_end_matches(['?', '.', '!', ',', ';', ':'])
        .chars()
        .filter(|c| *c != '\'' && *c != '’')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

// ── Match results ──────────────────────────────────────────────────────────

/// Outcome of matching one utterance against one template.
///
/// A failed match is `None` at the call site; a zero-score `MatchResult` is a
/// *valid* match (an all-optional template can legitimately match nothing).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    /// +1 per required literal token matched. Tokens absorbed by optionals,
    /// captures, concept refs and wildcards contribute nothing, so a
    /// wildcard-heavy template can never out-compete a specific one.
    pub score: u32,
    /// Capture-variable name → bound value.
    pub bindings: HashMap<String, String>,
}

// ── Answer specifications ──────────────────────────────────────────────────

/// What a matched question resolves to: either a final answer string, or an
/// answer that opens a nested rule set for the next turn. A tagged sum type,
/// never an ad-hoc structural check.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerSpec {
    /// Plain answer; the dialogue returns to the top-level rule set.
    Leaf(String),
    /// Answer plus the follow-up question templates it activates.
    Branch {
        answer: String,
        rules: Vec<(String, AnswerSpec)>,
    },
}

impl AnswerSpec {
    /// The answer template text, regardless of variant.
    pub fn text(&self) -> &str {
        match self {
            AnswerSpec::Leaf(s) => s,
            AnswerSpec::Branch { answer, .. } => answer,
        }
    }
}

// ── Dialogue navigation directives ─────────────────────────────────────────

/// Navigation directive parsed off the tail of a rendered answer.
/// `<-` pops one dialogue level (returns to the parent prompt);
/// `<--` resets fully to the top-level rule set. Absent markers mean the
/// default transition (descend into a branch, or reset on a leaf).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Directive {
    #[default]
    Advance,
    PopOne,
    ResetTop,
}

// ── Prosody / emotion ──────────────────────────────────────────────────────

/// Prosody adjustment produced by an emotion transform. Unset fields leave
/// the engine baseline untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionParams {
    pub speed: Option<f32>,
    pub pitch: Option<f32>,
    pub volume: Option<f32>,
}

/// One emotion-annotated region of a rendered answer, in byte offsets into
/// the final text.
#[derive(Debug, Clone, PartialEq)]
pub struct ProsodySpan {
    pub start: usize,
    pub end: usize,
    pub emotion: String,
    pub params: EmotionParams,
}

/// A fully rendered answer: the spoken text, its emotion spans, and the
/// navigation directive stripped from the template tail.
#[derive(Debug, Clone, Default)]
pub struct Rendered {
    pub text: String,
    pub prosody: Vec<ProsodySpan>,
    pub directive: Directive,
}

// ── Turn outcomes ──────────────────────────────────────────────────────────

/// What one call to `Mind::process` produced. `Unrecognized` is a normal,
/// reportable outcome, distinct from every `MindError`.
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// A template matched and the answer was rendered. `spoken` is false when
    /// the instance was stopped before audio could be emitted.
    Answered {
        text: String,
        prosody: Vec<ProsodySpan>,
        spoken: bool,
    },
    /// No template in the active rule set matched. Dialogue state unchanged.
    Unrecognized { utterance: String },
    /// The utterance arrived while a previous turn was still in flight and
    /// was dropped under the single-flight discipline.
    Ignored,
}

impl TurnOutcome {
    /// The answer text, if this turn produced one.
    pub fn answer(&self) -> Option<&str> {
        match self {
            TurnOutcome::Answered { text, .. } => Some(text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_case_apostrophes_and_trailing_punctuation() {
        assert_eq!(normalize_word("Thank's?"), "thanks");
        assert_eq!(normalize_word("Doors!"), "doors");
        assert_eq!(normalize_word("HELLO,"), "hello");
        assert_eq!(normalize_word("door"), "door");
    }

    #[test]
    fn tokens_with_same_norm_compare_equal_on_norm() {
        assert_eq!(Token::new("Thanks").norm, Token::new("thank's").norm);
    }

    #[test]
    fn answer_spec_text_covers_both_variants() {
        assert_eq!(AnswerSpec::Leaf("hi".into()).text(), "hi");
        let b = AnswerSpec::Branch { answer: "q?".into(), rules: vec![] };
        assert_eq!(b.text(), "q?");
    }
}
