// ── Engine: Dialogue Engine ────────────────────────────────────────────────
//
// Holds the conversation-tree position and runs one turn at a time:
// select the best-matching rule in the active rule set, render its answer,
// then advance: descend into a nested rule set, pop back out on a `<-`
// directive, or return to top level. The frame stack encodes the session
// state: one frame means top-level matching, deeper frames mean a nested
// prompt is awaiting its reply.
//
// Resolution and state mutation are split: `resolve` is pure with respect
// to the dialogue state, and the caller applies `commit` only once the
// collaborator steps (translation, speech) of the turn have succeeded, so a
// failed turn leaves the state untouched and retriable.

use crate::atoms::error::{MindError, MindResult};
use crate::atoms::types::{AnswerSpec, Directive, Rendered};
use crate::engine::concepts::ConceptRegistry;
use crate::engine::grammar::Pattern;
use crate::engine::matcher::select_best;
use crate::engine::renderer::{render, ActionTable, EmotionTable, RenderContext};
use crate::engine::tokenizer::tokenize;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

// ── Compiled rules ─────────────────────────────────────────────────────────

/// One compiled question/answer pair.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Original question-template string, kept for logs.
    pub source: String,
    pub pattern: Pattern,
    pub answer: CompiledAnswer,
}

/// An answer template plus the nested rule set it opens, if any.
#[derive(Debug, Clone)]
pub struct CompiledAnswer {
    pub text: String,
    pub rules: Option<Arc<Vec<Rule>>>,
}

/// Compile an ordered conversation tree. Every template is parsed up front;
/// the first grammar error refuses the whole set; a broken template is
/// never silently dropped.
pub fn compile_rules(
    spec: &[(String, AnswerSpec)],
    concepts: &ConceptRegistry,
) -> MindResult<Arc<Vec<Rule>>> {
    let mut rules = Vec::with_capacity(spec.len());
    for (question, answer) in spec {
        let pattern = Pattern::parse(question, concepts)?;
        let answer = match answer {
            AnswerSpec::Leaf(text) => CompiledAnswer { text: text.clone(), rules: None },
            AnswerSpec::Branch { answer, rules: nested } => CompiledAnswer {
                text: answer.clone(),
                rules: Some(compile_rules(nested, concepts)?),
            },
        };
        rules.push(Rule { source: question.clone(), pattern, answer });
    }
    Ok(Arc::new(rules))
}

/// Read a conversation tree from its JSON shape: an ordered map of question
/// template → answer string, or question template → `{ "answer": {…nested…} }`
/// single-key object for multi-turn branches.
pub fn answers_from_json(value: &serde_json::Value) -> MindResult<Vec<(String, AnswerSpec)>> {
    let map = value
        .as_object()
        .ok_or_else(|| MindError::Config("conversation must be a JSON object".into()))?;
    let mut out = Vec::with_capacity(map.len());
    for (question, answer) in map {
        out.push((question.clone(), answer_spec_from_json(question, answer)?));
    }
    Ok(out)
}

fn answer_spec_from_json(question: &str, value: &serde_json::Value) -> MindResult<AnswerSpec> {
    match value {
        serde_json::Value::String(s) => Ok(AnswerSpec::Leaf(s.clone())),
        serde_json::Value::Object(map) if map.len() == 1 => {
            let (answer, nested) = map.iter().next().unwrap();
            Ok(AnswerSpec::Branch { answer: answer.clone(), rules: answers_from_json(nested)? })
        }
        _ => Err(MindError::Config(format!(
            "answer for {question:?} must be a string or a single-key object"
        ))),
    }
}

// ── Dialogue state ─────────────────────────────────────────────────────────

/// Per-session dialogue position: the active rule-set stack (top-level at
/// the bottom), bindings accumulated while inside a branch, and the recency
/// window that forces a fallback to top-level matching after silence.
pub struct DialogueState {
    stack: Vec<Arc<Vec<Rule>>>,
    bindings: HashMap<String, String>,
    last_turn: Option<Instant>,
    memory: Duration,
}

impl DialogueState {
    pub fn new(top_level: Arc<Vec<Rule>>, memory: Duration) -> Self {
        DialogueState { stack: vec![top_level], bindings: HashMap::new(), last_turn: None, memory }
    }

    /// True when the next utterance will match against the root rule set.
    pub fn is_top_level(&self) -> bool {
        self.stack.len() == 1
    }

    /// Forget a stale nested position. Called before every match; after
    /// `memory` of silence the session falls back to top-level matching.
    pub fn expire_if_stale(&mut self) {
        if let Some(last) = self.last_turn {
            if last.elapsed() > self.memory && !self.is_top_level() {
                debug!("dialogue memory expired, returning to top level");
                self.reset_top();
            }
        }
    }

    /// The active rule set and session bindings, for matching outside the
    /// state lock.
    pub fn snapshot(&self) -> (Arc<Vec<Rule>>, HashMap<String, String>) {
        (self.stack.last().expect("stack never empty").clone(), self.bindings.clone())
    }

    /// Apply a resolved turn's transition. Only called once the whole turn
    /// (including collaborator steps) has succeeded.
    pub fn commit(&mut self, step: &TurnStep) {
        self.last_turn = Some(Instant::now());
        match step.rendered.directive {
            Directive::PopOne => self.pop_one(),
            Directive::ResetTop => self.reset_top(),
            Directive::Advance => match &step.branch {
                Some(rules) => {
                    self.bindings = step.bindings.clone();
                    self.stack.push(rules.clone());
                }
                None => self.reset_top(),
            },
        }
        if !self.is_top_level() {
            self.bindings = step.bindings.clone();
        }
    }

    fn pop_one(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
        if self.is_top_level() {
            self.bindings.clear();
        }
    }

    fn reset_top(&mut self) {
        self.stack.truncate(1);
        self.bindings.clear();
    }
}

// ── Turn resolution ────────────────────────────────────────────────────────

/// A fully resolved turn, ready to be committed.
#[derive(Debug)]
pub struct TurnStep {
    pub rendered: Rendered,
    /// Session bindings merged with this turn's captures.
    pub bindings: HashMap<String, String>,
    /// Nested rule set the winning answer opens, if any.
    pub branch: Option<Arc<Vec<Rule>>>,
}

/// Resolve one utterance against a rule set. `Ok(None)` is the normal
/// "unrecognized utterance" outcome; errors are render/concept failures and
/// must not advance dialogue state (they cannot; `commit` is separate).
pub async fn resolve(
    rules: &[Rule],
    session_bindings: &HashMap<String, String>,
    utterance: &str,
    concepts: &ConceptRegistry,
    emotions: &EmotionTable,
    actions: &ActionTable,
) -> MindResult<Option<TurnStep>> {
    let tokens = tokenize(utterance);
    let patterns: Vec<&Pattern> = rules.iter().map(|r| &r.pattern).collect();
    let Some((index, matched)) = select_best(&patterns, &tokens, concepts) else {
        return Ok(None);
    };
    let rule = &rules[index];
    debug!(
        "matched {:?} with score {} ({} bindings)",
        rule.source,
        matched.score,
        matched.bindings.len()
    );

    let mut bindings = session_bindings.clone();
    bindings.extend(matched.bindings);

    let ctx = RenderContext { bindings: &bindings, concepts, emotions, actions };
    let rendered = render(&rule.answer.text, &ctx).await?;

    Ok(Some(TurnStep { rendered, bindings, branch: rule.answer.rules.clone() }))
}
