//! Parlance: an embeddable conversational agent.
//!
//! A `Mind` is one independent dialogue instance: it compiles a tree of
//! question templates at construction, matches incoming utterances against
//! the currently active rules, and renders a generative answer with
//! prosody annotations. Speech recognition, speech synthesis and machine
//! translation are injected collaborators, so the core runs anywhere from
//! a unit test to a device with real audio.
//!
//! ```no_run
//! use parlance::engine::{Mind, MindConfig, NullSpeech, NullTranslator};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), parlance::atoms::MindError> {
//! let mind = Mind::new(MindConfig::new("HAL"), Arc::new(NullTranslator), Arc::new(NullSpeech))?;
//! let outcome = mind.process("Open the pod bay doors").await?;
//! assert!(outcome.answer().unwrap().contains("I'm afraid I can't do that"));
//! # Ok(())
//! # }
//! ```

pub mod atoms;
pub mod engine;

pub use atoms::{MindError, MindResult, TurnOutcome};
pub use engine::{Mind, MindConfig};
