// ── Engine: Mind Instance ──────────────────────────────────────────────────
//
// Owns one conversational session end to end: configuration, compiled
// rules, dialogue position, and the collaborator handles. A turn runs
//
//   utterance → translate in → match → render → translate out → speak
//
// strictly single-flight: while a turn is in flight, further utterances
// from the same instance are dropped. Dialogue state commits only after
// every collaborator step succeeded, so a failed turn is retriable.
// Instances are fully independent and share no mutable state.

use crate::atoms::constants::CANONICAL_LANGUAGE;
use crate::atoms::error::{MindError, MindResult};
use crate::atoms::types::TurnOutcome;
use crate::engine::config::MindConfig;
use crate::engine::dialogue::{compile_rules, resolve, DialogueState};
use crate::engine::renderer::ActionHandler;
use crate::engine::speech::{
    ListenDelegate, ListenSession, SpeechInput, SpeechOutput, Translator,
};
use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Callback receiving transcripts or answers from a listen session.
pub type Callback = Arc<dyn Fn(&str) + Send + Sync>;

/// Explicit listen state: a state tag plus the owned session handle, never
/// a flag doubling as a handle.
enum ListenState {
    Idle,
    Listening(Box<dyn ListenSession>),
}

impl std::fmt::Debug for Mind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mind")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .finish_non_exhaustive()
    }
}

pub struct Mind {
    id: Uuid,
    config: MindConfig,
    dialogue: Mutex<DialogueState>,
    translator: Arc<dyn Translator>,
    output: Arc<dyn SpeechOutput>,
    /// Cleared by `stop()`; the speak step re-checks it before emitting.
    active: AtomicBool,
    /// Single-flight guard: one turn at a time per instance.
    busy: AtomicBool,
    listen: Mutex<ListenState>,
}

impl Mind {
    /// Build an instance. Fails with a grammar error if any conversation
    /// template is malformed or references an unknown concept, before any
    /// call to `process`.
    pub fn new(
        mut config: MindConfig,
        translator: Arc<dyn Translator>,
        output: Arc<dyn SpeechOutput>,
    ) -> MindResult<Arc<Mind>> {
        // The stock TRANSLATE action needs the collaborators, so it is wired
        // here rather than in the config defaults. User-supplied handlers
        // take precedence.
        if !config.actions.contains_key("TRANSLATE") {
            config.actions.insert(
                "TRANSLATE".into(),
                Arc::new(TranslateAction {
                    translator: translator.clone(),
                    output: output.clone(),
                    from: config.language.clone(),
                }),
            );
        }

        let rules = compile_rules(&config.conversation, &config.concepts)?;
        let dialogue = Mutex::new(DialogueState::new(rules.clone(), config.memory_duration));
        let id = Uuid::new_v4();
        info!("[{id}] mind {:?} ready with {} top-level rules", config.name, rules.len());

        Ok(Arc::new(Mind {
            id,
            config,
            dialogue,
            translator,
            output,
            active: AtomicBool::new(true),
            busy: AtomicBool::new(false),
            listen: Mutex::new(ListenState::Idle),
        }))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &MindConfig {
        &self.config
    }

    /// Run one turn. `Unrecognized` and `Ignored` are normal outcomes;
    /// errors are failed turns that left the dialogue state unchanged.
    pub async fn process(&self, utterance: &str) -> MindResult<TurnOutcome> {
        if self.busy.swap(true, Ordering::AcqRel) {
            warn!("[{}] dropping utterance, turn in flight: {utterance:?}", self.id);
            return Ok(TurnOutcome::Ignored);
        }
        let _guard = BusyGuard(&self.busy);

        // Normalize to the canonical matching language. Identity translation
        // short-circuits without a round trip.
        let canonical = if self.config.language == CANONICAL_LANGUAGE {
            utterance.to_string()
        } else {
            self.translator
                .translate(utterance, &self.config.language, CANONICAL_LANGUAGE)
                .await?
        };

        let (active_rules, bindings) = {
            let mut dialogue = self.dialogue.lock();
            dialogue.expire_if_stale();
            dialogue.snapshot()
        };

        let step = match resolve(
            &active_rules,
            &bindings,
            &canonical,
            &self.config.concepts,
            &self.config.emotions,
            &self.config.actions,
        )
        .await?
        {
            Some(step) => step,
            None => {
                warn!("[{}] could not understand: {canonical:?}", self.id);
                return Ok(TurnOutcome::Unrecognized { utterance: canonical });
            }
        };

        let text = if self.config.language == CANONICAL_LANGUAGE {
            step.rendered.text.clone()
        } else {
            self.translator
                .translate(&step.rendered.text, CANONICAL_LANGUAGE, &self.config.language)
                .await?
        };

        // Stop must win the race against an in-flight turn: no audio after
        // the active flag is cleared.
        let spoken = if self.active.load(Ordering::Acquire) {
            self.speak_suppressed(&text, &step.rendered.prosody).await?;
            true
        } else {
            debug!("[{}] stopped before speaking, answer muted", self.id);
            false
        };

        self.dialogue.lock().commit(&step);
        Ok(TurnOutcome::Answered { text, prosody: step.rendered.prosody.clone(), spoken })
    }

    /// Speak with self-listen suppression: recognition is paused while the
    /// instance's own voice is playing.
    async fn speak_suppressed(
        &self,
        text: &str,
        prosody: &[crate::atoms::types::ProsodySpan],
    ) -> MindResult<()> {
        let suppress = self.config.suppress_selflisten;
        if suppress {
            if let ListenState::Listening(session) = &*self.listen.lock() {
                session.pause();
            }
        }
        let result = self.output.speak(text, &self.config.language, prosody).await;
        if suppress {
            if let ListenState::Listening(session) = &*self.listen.lock() {
                session.resume();
            }
        }
        result
    }

    /// Speak arbitrary text in the instance's language.
    pub async fn speak(&self, text: &str) -> MindResult<()> {
        if !self.active.load(Ordering::Acquire) {
            return Err(MindError::Speech("instance is stopped".into()));
        }
        self.speak_suppressed(text, &[]).await
    }

    /// Translate into the instance's language and speak the result.
    pub async fn translate_and_speak(&self, text: &str, from: &str) -> MindResult<String> {
        let to = &self.config.language;
        let translation = if from == to {
            text.to_string()
        } else {
            self.translator.translate(text, from, to).await?
        };
        self.speak(&translation).await?;
        Ok(translation)
    }

    /// Attach a recognition source. Final transcripts feed `process`; the
    /// rendered answer goes to `on_answer`. Requires a tokio runtime.
    pub fn listen(
        self: &Arc<Self>,
        input: &dyn SpeechInput,
        on_interim: Option<Callback>,
        on_final: Option<Callback>,
        on_answer: Option<Callback>,
    ) -> MindResult<()> {
        self.stop();
        self.active.store(true, Ordering::Release);
        let delegate = Arc::new(MindDelegate {
            mind: Arc::downgrade(self),
            on_interim,
            on_final,
            on_answer,
        });
        let session = input.start(delegate)?;
        *self.listen.lock() = ListenState::Listening(session);
        info!("[{}] listening", self.id);
        Ok(())
    }

    /// Stop listening and talking immediately. Atomic with respect to an
    /// in-flight turn: once this returns, no further audio is emitted.
    pub fn stop(&self) {
        self.active.store(false, Ordering::Release);
        if let ListenState::Listening(session) =
            std::mem::replace(&mut *self.listen.lock(), ListenState::Idle)
        {
            session.stop();
            info!("[{}] stopped listening", self.id);
        }
        self.output.cancel();
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ── Recognition plumbing ───────────────────────────────────────────────────

struct MindDelegate {
    mind: Weak<Mind>,
    on_interim: Option<Callback>,
    on_final: Option<Callback>,
    on_answer: Option<Callback>,
}

impl ListenDelegate for MindDelegate {
    fn interim(&self, transcript: &str) {
        if let Some(cb) = &self.on_interim {
            cb(transcript);
        }
    }

    fn finalized(&self, transcript: &str) {
        if let Some(cb) = &self.on_final {
            cb(transcript);
        }
        let Some(mind) = self.mind.upgrade() else {
            return;
        };
        let on_answer = self.on_answer.clone();
        let transcript = transcript.to_string();
        tokio::spawn(async move {
            match mind.process(&transcript).await {
                Ok(outcome) => {
                    if let (Some(cb), Some(answer)) = (&on_answer, outcome.answer()) {
                        cb(answer);
                    }
                }
                Err(e) => warn!("[{}] turn failed: {e}", mind.id),
            }
        });
    }
}

// ── Stock TRANSLATE action ─────────────────────────────────────────────────
// `!TRANSLATE(text, language)` translates the rendered text and speaks it
// in the target language.

struct TranslateAction {
    translator: Arc<dyn Translator>,
    output: Arc<dyn SpeechOutput>,
    from: String,
}

#[async_trait]
impl ActionHandler for TranslateAction {
    async fn invoke(&self, args: Vec<String>) -> MindResult<()> {
        let [text, language] = args.as_slice() else {
            return Err(MindError::render("TRANSLATE expects (text, language)"));
        };
        let translation = self.translator.translate(text, &self.from, language).await?;
        self.output.speak(&translation, language, &[]).await
    }
}
