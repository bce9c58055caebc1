// ── Engine: Collaborator Seams ─────────────────────────────────────────────
//
// Speech-to-text, text-to-speech and machine translation live outside the
// core; the engine only ever talks to these traits. Injecting them keeps
// the turn pipeline mockable and the core free of any device or network
// assumption. Reference implementations: an HTTP translator matching the
// classic `/translate` GET contract, and null speech endpoints for headless
// embedding and tests.

use crate::atoms::error::{MindError, MindResult};
use crate::atoms::types::ProsodySpan;
use async_trait::async_trait;
use log::{debug, info};
use std::sync::Arc;

// ── Translation ────────────────────────────────────────────────────────────

/// Cross-language text translation. The engine normalizes every utterance
/// to its canonical internal language before matching and translates the
/// answer back afterwards. Identity translation (`from == to`) is
/// short-circuited by the caller and never reaches the collaborator.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, from: &str, to: &str) -> MindResult<String>;
}

/// Translator that never translates, for monolingual instances and tests.
pub struct NullTranslator;

#[async_trait]
impl Translator for NullTranslator {
    async fn translate(&self, text: &str, _from: &str, _to: &str) -> MindResult<String> {
        Ok(text.to_string())
    }
}

/// `GET {base}/translate?text=…&from=…&to=…` returning
/// `{"responseData": {"translatedText": …}}`.
pub struct HttpTranslator {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTranslator {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpTranslator { base_url: base_url.into(), client: reqwest::Client::new() }
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, from: &str, to: &str) -> MindResult<String> {
        let url = format!(
            "{}/translate?text={}&from={}&to={}",
            self.base_url,
            urlencoding::encode(text),
            urlencoding::encode(from),
            urlencoding::encode(to),
        );
        debug!("translating {from} → {to}");
        let body: serde_json::Value = self.client.get(&url).send().await?.json().await?;
        body.pointer("/responseData/translatedText")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| MindError::Translate("malformed translation response".into()))
    }
}

// ── Speech output ──────────────────────────────────────────────────────────

/// Hands a fully rendered answer to external speech output. `speak`
/// resolves on playback completion and rejects on engine failure; `cancel`
/// halts any in-progress synthesis immediately.
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    async fn speak(&self, text: &str, language: &str, prosody: &[ProsodySpan]) -> MindResult<()>;
    fn cancel(&self);
}

/// Speech output that only logs. Headless default.
pub struct NullSpeech;

#[async_trait]
impl SpeechOutput for NullSpeech {
    async fn speak(&self, text: &str, language: &str, _prosody: &[ProsodySpan]) -> MindResult<()> {
        info!("({language}) {text}");
        Ok(())
    }

    fn cancel(&self) {}
}

// ── Speech input ───────────────────────────────────────────────────────────

/// Callbacks a recognition source delivers transcripts through. `finalized`
/// is the entry point into the turn pipeline.
pub trait ListenDelegate: Send + Sync {
    /// Partial transcript while the user is still talking.
    fn interim(&self, _transcript: &str) {}
    /// Complete utterance, ready for processing.
    fn finalized(&self, transcript: &str);
}

/// A live recognition session. Explicit state plus an owned handle; the
/// session is paused around the instance's own speech when self-listen
/// suppression is on.
pub trait ListenSession: Send + Sync {
    fn pause(&self);
    fn resume(&self);
    fn stop(&self);
}

/// External speech-recognition source.
pub trait SpeechInput: Send + Sync {
    fn start(&self, delegate: Arc<dyn ListenDelegate>) -> MindResult<Box<dyn ListenSession>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_translator_is_identity() {
        let t = NullTranslator;
        assert_eq!(t.translate("Guten Tag", "de-DE", "en-US").await.unwrap(), "Guten Tag");
    }

    #[tokio::test]
    async fn null_speech_accepts_anything() {
        let s = NullSpeech;
        assert!(s.speak("hello", "en-US", &[]).await.is_ok());
        s.cancel();
    }
}
