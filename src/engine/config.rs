// ── Engine: Instance Configuration ─────────────────────────────────────────
//
// Everything a Mind owns at construction: language, personality weights,
// concept/emotion/action tables, and the conversation tree. Construction
// starts from a complete built-in default and overrides field by field, so
// callers only specify what differs.

use crate::atoms::constants::{DEFAULT_LANGUAGE, DEFAULT_MEMORY_SECS};
use crate::atoms::error::MindResult;
use crate::atoms::types::{AnswerSpec, EmotionParams};
use crate::engine::concepts::{builtin_concepts, ConceptDef, ConceptRegistry};
use crate::engine::dialogue::answers_from_json;
use crate::engine::renderer::{ActionHandler, ActionTable, EmotionFn, EmotionTable, FnAction};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

// ── Personality ────────────────────────────────────────────────────────────

/// Trait weights in `0.0..=1.0`. The engine carries these for emotion and
/// concept functions to consult; it attaches no semantics of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Personality {
    pub gender: String,
    pub humor: f32,
    pub cynicism: f32,
    pub confidence: f32,
    pub honesty: f32,
    pub empathy: f32,
    pub aggression: f32,
    pub dreaminess: f32,
    pub anxiousness: f32,
    pub cheerfulness: f32,
    pub sloppiness: f32,
    pub laziness: f32,
}

impl Default for Personality {
    fn default() -> Self {
        Personality {
            gender: "female".into(),
            humor: 0.5,
            cynicism: 0.1,
            confidence: 0.9,
            honesty: 0.9,
            empathy: 0.8,
            aggression: 0.1,
            dreaminess: 0.4,
            anxiousness: 0.4,
            cheerfulness: 0.75,
            sloppiness: 0.1,
            laziness: 0.1,
        }
    }
}

// ── Configuration ──────────────────────────────────────────────────────────

/// Full instance configuration. Built with `MindConfig::new(name)` and
/// customized through the builder methods; every field starts from a
/// complete default.
pub struct MindConfig {
    /// The instance's own name; the NAME concept recognizes it.
    pub name: String,
    /// Language the instance listens and answers in (BCP 47).
    pub language: String,
    /// Restart recognition when the engine ends a continuous session.
    pub relisten: bool,
    /// Keep the recognition session open across utterances.
    pub continuous: bool,
    /// Volunteer answers without being addressed by name.
    pub proactive: bool,
    /// Silence window after which a nested dialogue falls back to top level.
    pub memory_duration: Duration,
    /// Pause recognition while the instance is speaking.
    pub suppress_selflisten: bool,
    pub personality: Personality,
    pub concepts: ConceptRegistry,
    pub emotions: EmotionTable,
    pub actions: ActionTable,
    pub conversation: Vec<(String, AnswerSpec)>,
    /// How the instance addresses its interlocutor (the HUMAN concept).
    pub human: String,
}

impl MindConfig {
    /// A complete default configuration for an instance called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let human = "human".to_string();
        let config = MindConfig {
            concepts: builtin_concepts(&name, &human),
            emotions: builtin_emotions(),
            actions: builtin_actions(),
            conversation: default_conversation(),
            name,
            language: DEFAULT_LANGUAGE.into(),
            relisten: true,
            continuous: true,
            proactive: true,
            memory_duration: Duration::from_secs(DEFAULT_MEMORY_SECS),
            suppress_selflisten: false,
            personality: Personality::default(),
            human,
        };
        info!("configured mind {:?} ({})", config.name, config.language);
        config
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn memory_duration(mut self, memory: Duration) -> Self {
        self.memory_duration = memory;
        self
    }

    pub fn suppress_selflisten(mut self, suppress: bool) -> Self {
        self.suppress_selflisten = suppress;
        self
    }

    pub fn personality(mut self, personality: Personality) -> Self {
        self.personality = personality;
        self
    }

    /// How the instance addresses the human (feeds the HUMAN concept).
    pub fn address_human_as(mut self, human: impl Into<String>) -> Self {
        self.human = human.into();
        let human = self.human.clone();
        self.concepts
            .insert("HUMAN", ConceptDef::generate_fn(move || human.clone()));
        self
    }

    /// Add or override one concept.
    pub fn concept(mut self, name: impl Into<String>, def: ConceptDef) -> Self {
        self.concepts.insert(name, def);
        self
    }

    /// Add or override one emotion transform.
    pub fn emotion(mut self, name: impl Into<String>, f: EmotionFn) -> Self {
        self.emotions.insert(name.into(), f);
        self
    }

    /// Add or override one action handler.
    pub fn action(mut self, name: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        self.actions.insert(name.into(), handler);
        self
    }

    /// Replace the whole conversation tree.
    pub fn conversation(mut self, conversation: Vec<(String, AnswerSpec)>) -> Self {
        self.conversation = conversation;
        self
    }

    /// Replace the conversation tree from its JSON shape.
    pub fn conversation_json(mut self, value: &serde_json::Value) -> MindResult<Self> {
        self.conversation = answers_from_json(value)?;
        Ok(self)
    }

    /// Append one question/answer rule.
    pub fn rule(mut self, question: impl Into<String>, answer: AnswerSpec) -> Self {
        self.conversation.push((question.into(), answer));
        self
    }
}

// ── Builtin tables ─────────────────────────────────────────────────────────

/// Prosody transforms the default conversation relies on.
pub fn builtin_emotions() -> EmotionTable {
    let mut table = EmotionTable::new();
    table.insert(
        "SAD".into(),
        Arc::new(|_: &str| EmotionParams { speed: Some(0.8), pitch: Some(0.7), volume: None })
            as EmotionFn,
    );
    table.insert(
        "RIDICULE".into(),
        Arc::new(|_: &str| EmotionParams { speed: Some(1.1), pitch: Some(1.25), volume: None }),
    );
    table.insert(
        "SILENT".into(),
        Arc::new(|_: &str| EmotionParams { speed: None, pitch: None, volume: Some(0.0) }),
    );
    table
}

/// Benign default handlers. Device-level effects (haptics, messaging) are
/// the embedder's concern; these log the invocation and succeed.
pub fn builtin_actions() -> ActionTable {
    let mut table = ActionTable::new();
    table.insert(
        "VIBRATE".into(),
        Arc::new(FnAction(|_args: Vec<String>| {
            info!("action VIBRATE [200, 100, 200]");
        })) as Arc<dyn ActionHandler>,
    );
    table.insert(
        "SMS".into(),
        Arc::new(FnAction(|args: Vec<String>| {
            info!("action SMS {args:?}");
        })),
    );
    table
}

/// The stock conversation: greeting, pod bay doors, insult handling,
/// translation, a multi-turn message flow, jokes, thanks, and a catch-all.
pub fn default_conversation() -> Vec<(String, AnswerSpec)> {
    answers_from_json(&json!({
        "(Hi | Hello | Good {$time: #TOD}) [#NAME] [...]":
            "(Hello | Good #TOD), #HUMAN! ...",
        "Open #ARTICLE [<#ADJECTIVE>] [pod bay] door[s]":
            "I'm sorry, #HUMAN. %SAD(I'm afraid I can't do that)",
        "[...] you {$insult: #INSULT}.":
            "... #PAUSE [Why $insult? | %RIDICULE(#INSULT) | %SAD(That wasn't necessary!)]",
        "Translate {$text: *} into {$language: *}":
            "In $language that's: %SILENT(!TRANSLATE($text, $language))",
        "[(Send | write | new) [a]] message to {$person: *}": {
            "What message would you like to send to $person?": {
                "{$message: *}": {
                    "Shall I send \"$message\" to $person?": {
                        "#YES": "!SMS($person, $message) It's out!",
                        "#NO": "Sorry, <-",
                        "#CANCEL": "Ok, not sending it. <--"
                    }
                }
            }
        },
        "(Tell [me] | [Do] you know) a joke": "#JOKE",
        "Thank('s | you)": "You're welcome! | No problem[o]!",
        "*": "Excuse me!? | Can you please repeat that, #HUMAN?"
    }))
    .expect("default conversation is well-formed")
}
