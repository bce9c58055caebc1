// ── Engine: Concept Resolver ───────────────────────────────────────────────
//
// A concept is a named semantic category with two optional directions:
//   extract(text)  : recognize an instance of the concept in free text
//   generate()     : produce a representative instance with no input
//
// Directions are named fields, never positional slots. Concepts live in a
// case-sensitive registry owned by the instance configuration; a template
// referencing an unknown name is refused at parse time, not at match time.

use crate::atoms::constants::{ADJECTIVES, INSULTS, JOKES};
use crate::atoms::error::{MindError, MindResult};
use crate::atoms::types::normalize_word;
use chrono::Timelike;
use rand::seq::SliceRandom;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

// ── Function types ─────────────────────────────────────────────────────────

/// Extract direction as an arbitrary function. Returning `None` means the
/// span is not an instance of the concept.
pub type ExtractFn = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Generate direction: produce a representative value.
pub type GenerateFn = Arc<dyn Fn() -> String + Send + Sync>;

/// How a concept recognizes text.
#[derive(Clone)]
pub enum Extractor {
    /// A `|`-alternation of fixed phrases; the span matches when its
    /// normalized form equals one of them. The matched phrase is the value.
    Words(Vec<String>),
    /// Arbitrary recognition function over the raw span text.
    Func(ExtractFn),
}

/// A named semantic category. Either direction may be absent, which signals
/// "not available in that direction".
#[derive(Clone, Default)]
pub struct ConceptDef {
    pub extract: Option<Extractor>,
    pub generate: Option<GenerateFn>,
}

impl ConceptDef {
    /// Concept recognizing a `|`-separated alternation of phrases.
    pub fn words(alternation: &str) -> Self {
        ConceptDef {
            extract: Some(Extractor::Words(
                alternation
                    .split('|')
                    .map(|w| w.trim().to_string())
                    .filter(|w| !w.is_empty())
                    .collect(),
            )),
            generate: None,
        }
    }

    /// Concept with a custom extract function.
    pub fn extract_fn(f: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        ConceptDef { extract: Some(Extractor::Func(Arc::new(f))), generate: None }
    }

    /// Concept with only a generate function.
    pub fn generate_fn(f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        ConceptDef { extract: None, generate: Some(Arc::new(f)) }
    }

    /// Attach a generate function to an extract-capable concept.
    pub fn with_generate(mut self, f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.generate = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for ConceptDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConceptDef")
            .field("extract", &self.extract.as_ref().map(|e| match e {
                Extractor::Words(w) => format!("words({})", w.len()),
                Extractor::Func(_) => "fn".to_string(),
            }))
            .field("generate", &self.generate.is_some())
            .finish()
    }
}

// ── Registry ───────────────────────────────────────────────────────────────

/// Case-sensitive `name → ConceptDef` mapping. Identified by uppercase
/// names by convention; the registry itself does not enforce casing.
#[derive(Clone, Default)]
pub struct ConceptRegistry {
    map: HashMap<String, ConceptDef>,
}

impl ConceptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, def: ConceptDef) {
        self.map.insert(name.into(), def);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ConceptDef> {
        self.map.get(name)
    }

    /// Extract mode: recognize an instance of `name` in `text`.
    ///
    /// Returns `None` when the concept does not recognize the span or has no
    /// extract direction at all (a generate-only concept in a question
    /// template simply never matches).
    pub fn extract(&self, name: &str, text: &str) -> Option<String> {
        let def = self.map.get(name)?;
        match def.extract.as_ref()? {
            Extractor::Words(phrases) => {
                let norm = normalize_phrase(text);
                phrases
                    .iter()
                    .find(|p| normalize_phrase(p) == norm)
                    .cloned()
            }
            Extractor::Func(f) => f(text).filter(|v| !v.is_empty()),
        }
    }

    /// Generate mode: produce a representative instance of `name`.
    pub fn generate(&self, name: &str) -> MindResult<String> {
        let def = self
            .map
            .get(name)
            .ok_or_else(|| MindError::UnknownConcept(name.to_string()))?;
        match &def.generate {
            Some(f) => Ok(f()),
            None => Err(MindError::unavailable(name, "generate")),
        }
    }
}

/// Normalized comparison form of a multi-word phrase.
fn normalize_phrase(text: &str) -> String {
    text.split_whitespace()
        .map(normalize_word)
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Builtin concepts ───────────────────────────────────────────────────────

/// Pattern for curse words censored by the recognition engine ("f***" or
/// "f*** o**"). Returns the first multi-word censored run.
fn censored_insult(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\w\*+([^*]*\w\*+)?").unwrap());
    re.find(text).map(|m| m.as_str().to_string())
}

/// The concept set every default conversation can rely on. `name` is the
/// instance's own name (for being addressed); `human` is how it addresses
/// its interlocutor.
pub fn builtin_concepts(name: &str, human: &str) -> ConceptRegistry {
    let mut reg = ConceptRegistry::new();

    // Current time of day: fixed alternation in, clock-driven out.
    reg.insert(
        "TOD",
        ConceptDef::words("morning | afternoon | evening | night").with_generate(|| {
            let hours = chrono::Local::now().hour();
            if hours < 12 {
                "morning"
            } else if hours <= 16 {
                "afternoon"
            } else if hours <= 22 {
                "evening"
            } else {
                "night"
            }
            .to_string()
        }),
    );

    // Insults: censored tokens first, clear-text list second.
    reg.insert(
        "INSULT",
        ConceptDef::extract_fn(|text| {
            if let Some(censored) = censored_insult(text) {
                return Some(censored);
            }
            let norm = normalize_phrase(text);
            INSULTS
                .iter()
                .find(|i| norm.split(' ').any(|w| w == **i))
                .map(|i| i.to_string())
        })
        .with_generate(|| {
            let mut rng = rand::thread_rng();
            INSULTS.choose(&mut rng).unwrap_or(&"fool").to_string()
        }),
    );

    // Jokes are generate-only; there is nothing to recognize.
    reg.insert(
        "JOKE",
        ConceptDef::generate_fn(|| {
            let mut rng = rand::thread_rng();
            JOKES.choose(&mut rng).map(|j| j.to_string()).unwrap_or_default()
        }),
    );

    // Permissive noun slot. TODO: wire a real part-of-speech list.
    reg.insert(
        "NOUN",
        ConceptDef::extract_fn(|text| Some(text.to_string()))
            .with_generate(|| "some noun".to_string()),
    );

    reg.insert("ARTICLE", ConceptDef::words("the | a | an"));
    reg.insert(
        "ADJECTIVE",
        ConceptDef::words(&ADJECTIVES.join(" | ")),
    );

    reg.insert("YES", ConceptDef::words("yes | yeah | yep | sure | ok | okay | please do"));
    reg.insert("NO", ConceptDef::words("no | nope | nah | don't"));
    reg.insert(
        "CANCEL",
        ConceptDef::words("cancel | forget it | never mind | nevermind | stop"),
    );

    // Being addressed by name, and addressing the human back.
    {
        let own = name.to_string();
        reg.insert(
            "NAME",
            ConceptDef::extract_fn(move |text| {
                (normalize_phrase(text) == normalize_phrase(&own)).then(|| own.clone())
            })
            .with_generate({
                let own = name.to_string();
                move || own.clone()
            }),
        );
    }
    {
        let human = human.to_string();
        reg.insert(
            "HUMAN",
            ConceptDef::generate_fn(move || human.clone()),
        );
    }

    // A spoken pause. The speech layer decides how long that is.
    reg.insert("PAUSE", ConceptDef::generate_fn(|| "...".to_string()));

    reg
}
