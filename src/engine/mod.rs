// ── Engine ─────────────────────────────────────────────────────────────────
// The behavioral half of the crate: tokenizing, template compilation,
// matching, dialogue bookkeeping, answer rendering, and the Mind instance
// tying them together. Plain data shapes live in `atoms`.

pub mod concepts;
pub mod config;
pub mod dialogue;
pub mod grammar;
pub mod matcher;
pub mod mind;
pub mod renderer;
pub mod speech;
pub mod tokenizer;

pub use concepts::{builtin_concepts, ConceptDef, ConceptRegistry};
pub use config::{builtin_actions, builtin_emotions, default_conversation, MindConfig, Personality};
pub use dialogue::{answers_from_json, compile_rules, DialogueState, Rule};
pub use grammar::Pattern;
pub use matcher::{match_pattern, select_best};
pub use mind::{Callback, Mind};
pub use renderer::{ActionHandler, ActionTable, EmotionFn, EmotionTable, FnAction, RenderContext};
pub use speech::{
    HttpTranslator, ListenDelegate, ListenSession, NullSpeech, NullTranslator, SpeechInput,
    SpeechOutput, Translator,
};
pub use tokenizer::tokenize;
