// ── Parlance Atoms ─────────────────────────────────────────────────────────
// Foundation layer: plain types, the error enum, and immutable tables.
// Atoms never import from `engine`.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{MindError, MindResult};
pub use types::{
    AnswerSpec, Directive, EmotionParams, MatchResult, ProsodySpan, Rendered, Token, TurnOutcome,
};
