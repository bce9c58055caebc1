// ── Parlance Atoms: Error Types ────────────────────────────────────────────
// Single canonical error enum for the engine, built with `thiserror`.
//
// Design rules:
//   • Variants are coarse-grained by domain (Grammar, Concept, Render…).
//   • An unmatched utterance is NOT an error; it is `TurnOutcome::Unrecognized`.
//   • Collaborator failures (translation, speech) get their own variants so a
//     caller can tell a failed turn apart from a broken template library.

use thiserror::Error;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum MindError {
    /// A question template failed to parse: unbalanced brackets, a wildcard
    /// before the final element, a malformed capture. Raised at instance
    /// construction; the offending template is refused, never dropped.
    #[error("grammar error in template {template:?}: {message}")]
    Grammar { template: String, message: String },

    /// A template or answer marker references a concept name that is not in
    /// the registry. Checked at parse time for question templates.
    #[error("unknown concept: {0}")]
    UnknownConcept(String),

    /// The concept exists but does not support the requested direction
    /// (extract or generate).
    #[error("concept {name} has no {direction} function")]
    ConceptUnavailable { name: String, direction: String },

    /// Answer rendering failed: unbound `$variable`, unknown emotion or
    /// action name. The dialogue does not advance on a render failure.
    #[error("render error: {0}")]
    Render(String),

    /// Translation collaborator failure.
    #[error("translation error: {0}")]
    Translate(String),

    /// Speech input/output collaborator failure.
    #[error("speech error: {0}")]
    Speech(String),

    /// Instance configuration is invalid or missing.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP / network failure (reqwest layer).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ── Convenience constructors ───────────────────────────────────────────────

impl MindError {
    /// Create a grammar error for the given template source.
    pub fn grammar(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Grammar { template: template.into(), message: message.into() }
    }

    /// Create a concept-unavailable error for one direction of a concept.
    pub fn unavailable(name: impl Into<String>, direction: impl Into<String>) -> Self {
        Self::ConceptUnavailable { name: name.into(), direction: direction.into() }
    }

    /// Create a render error.
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render(message.into())
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All engine operations should return this type.
pub type MindResult<T> = Result<T, MindError>;

// ── Conversion: MindError → String ─────────────────────────────────────────
// Lets embedding layers with `Result<T, String>` boundaries convert directly.

impl From<MindError> for String {
    fn from(e: MindError) -> Self {
        e.to_string()
    }
}
