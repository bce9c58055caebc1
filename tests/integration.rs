// End-to-end turns through a full Mind instance: stock conversation,
// multi-turn flows, collaborator wiring, and the listen pipeline.

use async_trait::async_trait;
use parlance::atoms::constants::JOKES;
use parlance::atoms::types::{AnswerSpec, ProsodySpan, TurnOutcome};
use parlance::atoms::MindError;
use parlance::engine::speech::{
    ListenDelegate, ListenSession, NullSpeech, NullTranslator, SpeechInput, SpeechOutput,
};
use parlance::engine::{Mind, MindConfig};
use parlance::MindResult;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn stock_mind() -> Arc<Mind> {
    let _ = env_logger::builder().is_test(true).try_init();
    Mind::new(MindConfig::new("HAL"), Arc::new(NullTranslator), Arc::new(NullSpeech)).unwrap()
}

async fn answer(mind: &Mind, utterance: &str) -> String {
    match mind.process(utterance).await.unwrap() {
        TurnOutcome::Answered { text, .. } => text,
        other => panic!("{utterance:?} produced {other:?} instead of an answer"),
    }
}

// ── Stock conversation ─────────────────────────────────────────────────────

#[tokio::test]
async fn greeting_is_answered_with_a_greeting() {
    let mind = stock_mind();
    for utterance in ["Hello", "Hi HAL", "Good morning"] {
        let text = answer(&mind, utterance).await;
        assert!(text.contains("human!"), "{utterance:?} answered {text:?}");
    }
}

#[tokio::test]
async fn pod_bay_doors_stay_shut_with_sad_prosody() {
    let mind = stock_mind();
    let outcome = mind.process("Open the pod bay doors").await.unwrap();
    let TurnOutcome::Answered { text, prosody, spoken } = outcome else {
        panic!("doors request must be answered");
    };
    assert!(spoken);
    assert!(text.starts_with("I'm sorry, human."), "got {text:?}");
    assert!(text.contains("I'm afraid I can't do that"));
    // Emotion markers never leak into the surface text.
    assert!(!text.contains('%') && !text.contains("SAD("));

    let sad: Vec<&ProsodySpan> = prosody.iter().filter(|s| s.emotion == "SAD").collect();
    assert_eq!(sad.len(), 1);
    let span = sad[0];
    assert_eq!(&text[span.start..span.end], "I'm afraid I can't do that");
    assert_eq!(span.params.speed, Some(0.8));
    assert_eq!(span.params.pitch, Some(0.7));
}

#[tokio::test]
async fn door_variants_all_match() {
    let mind = stock_mind();
    for utterance in [
        "Open the pod bay door",
        "Open the damn pod bay doors",
        "open a door",
    ] {
        let text = answer(&mind, utterance).await;
        assert!(text.contains("I can't do that"), "{utterance:?} answered {text:?}");
    }
}

#[tokio::test]
async fn thanks_renders_one_of_the_known_forms() {
    let mind = stock_mind();
    for utterance in ["Thanks", "Thank you", "thanks?"] {
        let text = answer(&mind, utterance).await;
        assert!(
            ["You're welcome!", "No problem!", "No problemo!"].contains(&text.as_str()),
            "{utterance:?} answered {text:?}"
        );
    }
}

#[tokio::test]
async fn joke_requests_draw_from_the_canned_set() {
    let mind = stock_mind();
    for utterance in ["Tell me a joke", "do you know a joke", "Tell a joke"] {
        let text = answer(&mind, utterance).await;
        assert!(JOKES.contains(&text.as_str()), "{utterance:?} answered {text:?}");
    }
}

#[tokio::test]
async fn insults_are_acknowledged() {
    let mind = stock_mind();
    let text = answer(&mind, "you idiot").await;
    let known = text.contains("Why idiot")
        || text.contains("That wasn't necessary!")
        || parlance::atoms::constants::INSULTS.iter().any(|i| text.contains(i));
    assert!(known, "insult answered {text:?}");
}

#[tokio::test]
async fn gibberish_hits_the_catch_all() {
    let mind = stock_mind();
    let text = answer(&mind, "colorless green ideas sleep furiously").await;
    assert!(
        text == "Excuse me!?" || text == "Can you please repeat that, human?",
        "got {text:?}"
    );
}

// ── Matching precedence ────────────────────────────────────────────────────

#[tokio::test]
async fn ties_resolve_to_the_first_declared_rule_every_time() {
    let config = MindConfig::new("HAL").conversation(vec![
        ("hello there".into(), AnswerSpec::Leaf("first".into())),
        ("hello (there | friend)".into(), AnswerSpec::Leaf("second".into())),
    ]);
    let mind = Mind::new(config, Arc::new(NullTranslator), Arc::new(NullSpeech)).unwrap();
    for _ in 0..20 {
        assert_eq!(answer(&mind, "hello there").await, "first");
    }
}

#[tokio::test]
async fn fallback_loses_to_any_scoring_rule_regardless_of_order() {
    let config = MindConfig::new("HAL")
        .conversation_json(&json!({
            "*": "fallback",
            "ping": "pong"
        }))
        .unwrap();
    let mind = Mind::new(config, Arc::new(NullTranslator), Arc::new(NullSpeech)).unwrap();
    assert_eq!(answer(&mind, "ping").await, "pong");
    assert_eq!(answer(&mind, "anything else").await, "fallback");
}

// ── Multi-turn message flow ────────────────────────────────────────────────

#[tokio::test]
async fn message_flow_descends_confirms_and_returns() {
    let mind = stock_mind();

    let text = answer(&mind, "Send a message to Dave").await;
    assert_eq!(text, "What message would you like to send to Dave?");

    let text = answer(&mind, "the pod bay doors are stuck").await;
    assert_eq!(text, "Shall I send \"the pod bay doors are stuck\" to Dave?");

    let text = answer(&mind, "yes").await;
    assert!(text.contains("It's out!"), "got {text:?}");

    // Back at top level: the doors line matches its own rule again.
    let text = answer(&mind, "open the pod bay doors").await;
    assert!(text.contains("I can't do that"));
}

#[tokio::test]
async fn message_flow_no_reasks_for_the_message() {
    let mind = stock_mind();
    answer(&mind, "message to Dave").await;
    answer(&mind, "dinner is ready").await;

    let text = answer(&mind, "no").await;
    assert_eq!(text, "Sorry");

    // The person binding survives the pop.
    let text = answer(&mind, "lunch is ready").await;
    assert_eq!(text, "Shall I send \"lunch is ready\" to Dave?");
}

#[tokio::test]
async fn message_flow_cancel_abandons_the_branch() {
    let mind = stock_mind();
    answer(&mind, "write a message to Dave").await;
    answer(&mind, "dinner is ready").await;

    let text = answer(&mind, "never mind").await;
    assert_eq!(text, "Ok, not sending it.");

    // Fully back at top level: greetings match again.
    let text = answer(&mind, "hello").await;
    assert!(text.contains("human!"));
}

#[tokio::test]
async fn nested_position_expires_after_the_memory_window() {
    let config = MindConfig::new("HAL").memory_duration(Duration::from_millis(30));
    let mind = Mind::new(config, Arc::new(NullTranslator), Arc::new(NullSpeech)).unwrap();

    answer(&mind, "Send a message to Dave").await;
    tokio::time::sleep(Duration::from_millis(80)).await;

    // Without expiry the free-text capture would swallow this greeting.
    let text = answer(&mind, "hello").await;
    assert!(!text.contains("Shall I send"), "stale branch still active: {text:?}");
    assert!(text.contains("human!"));
}

// ── Collaborators ──────────────────────────────────────────────────────────

/// Speech output that records everything it is asked to say.
#[derive(Default)]
struct RecordingSpeech {
    spoken: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl SpeechOutput for RecordingSpeech {
    async fn speak(&self, text: &str, language: &str, _: &[ProsodySpan]) -> MindResult<()> {
        self.spoken.lock().push((text.to_string(), language.to_string()));
        Ok(())
    }
    fn cancel(&self) {}
}

#[tokio::test]
async fn translate_request_speaks_through_the_action() {
    let output = Arc::new(RecordingSpeech::default());
    let mind =
        Mind::new(MindConfig::new("HAL"), Arc::new(NullTranslator), output.clone()).unwrap();

    let text = answer(&mind, "Translate good day into French").await;
    assert!(text.starts_with("In French that's"), "got {text:?}");
    assert!(!text.contains("good day"), "translation must not appear inline: {text:?}");

    let spoken = output.spoken.lock();
    // The action spoke the translation in the target language, then the
    // turn spoke the rendered answer in the instance language.
    assert!(spoken.iter().any(|(t, l)| t == "good day" && l == "French"), "{spoken:?}");
    assert!(spoken.iter().any(|(_, l)| l == "en-US"));
}

#[tokio::test]
async fn unknown_concept_fails_construction_not_processing() {
    let config =
        MindConfig::new("HAL").rule("engage #WARPDRIVE", AnswerSpec::Leaf("done".into()));
    let err = Mind::new(config, Arc::new(NullTranslator), Arc::new(NullSpeech)).unwrap_err();
    assert!(matches!(err, MindError::Grammar { .. }));
}

// ── Listening ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct SessionCounters {
    paused: Mutex<u32>,
    resumed: Mutex<u32>,
    stopped: Mutex<u32>,
}

struct CountingSession(Arc<SessionCounters>);

impl ListenSession for CountingSession {
    fn pause(&self) {
        *self.0.paused.lock() += 1;
    }
    fn resume(&self) {
        *self.0.resumed.lock() += 1;
    }
    fn stop(&self) {
        *self.0.stopped.lock() += 1;
    }
}

/// Recognition source under test control: hands out the delegate so the
/// test can inject transcripts.
#[derive(Default)]
struct ScriptedInput {
    delegate: Mutex<Option<Arc<dyn ListenDelegate>>>,
    counters: Arc<SessionCounters>,
}

impl SpeechInput for ScriptedInput {
    fn start(&self, delegate: Arc<dyn ListenDelegate>) -> MindResult<Box<dyn ListenSession>> {
        *self.delegate.lock() = Some(delegate);
        Ok(Box::new(CountingSession(self.counters.clone())))
    }
}

#[tokio::test]
async fn finalized_transcripts_drive_turns_and_answer_callbacks() {
    let mind = stock_mind();
    let input = ScriptedInput::default();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let on_answer: parlance::engine::Callback = Arc::new(move |text: &str| {
        let _ = tx.send(text.to_string());
    });
    mind.listen(&input, None, None, Some(on_answer)).unwrap();

    let delegate = input.delegate.lock().clone().unwrap();
    delegate.finalized("Thanks");

    let text = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("answer callback never fired")
        .unwrap();
    assert!(["You're welcome!", "No problem!", "No problemo!"].contains(&text.as_str()));
}

#[tokio::test]
async fn self_listen_suppression_pauses_recognition_while_speaking() {
    let config = MindConfig::new("HAL").suppress_selflisten(true);
    let mind = Mind::new(config, Arc::new(NullTranslator), Arc::new(NullSpeech)).unwrap();
    let input = ScriptedInput::default();
    mind.listen(&input, None, None, None).unwrap();

    answer(&mind, "Thanks").await;
    assert_eq!(*input.counters.paused.lock(), 1);
    assert_eq!(*input.counters.resumed.lock(), 1);
}

#[tokio::test]
async fn stop_tears_down_the_session_and_mutes_answers() {
    let mind = stock_mind();
    let input = ScriptedInput::default();
    mind.listen(&input, None, None, None).unwrap();

    mind.stop();
    assert_eq!(*input.counters.stopped.lock(), 1);

    match mind.process("Thanks").await.unwrap() {
        TurnOutcome::Answered { spoken, .. } => assert!(!spoken),
        other => panic!("expected a muted answer, got {other:?}"),
    }
}
