// ── Parlance Atoms: Constants ──────────────────────────────────────────────
// Process-wide immutable tables and defaults. Word lists are plain data; the
// behavior that uses them lives in `engine::concepts`.

/// Canonical internal language. Every utterance is normalized to this before
/// matching; answers are translated back to the instance language afterwards.
pub const CANONICAL_LANGUAGE: &str = "en-US";

/// Default instance language when none is configured.
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Seconds of silence after which a nested dialogue falls back to top-level
/// matching.
pub const DEFAULT_MEMORY_SECS: u64 = 30;

/// Default speech-output prosody baseline (volume 0–1, rate 0.1–10, pitch 0–2).
pub const DEFAULT_VOLUME: f32 = 1.0;
pub const DEFAULT_RATE: f32 = 0.9;
pub const DEFAULT_PITCH: f32 = 0.8;

/// Words the INSULT concept recognizes in clear text. Recognition engines
/// usually censor the strong ones, which are caught by pattern instead.
pub const INSULTS: &[&str] = &["idiot", "moron", "fool", "dummy"];

/// Canned material for the JOKE concept's generate direction.
pub const JOKES: &[&str] = &[
    "A sandwich walks into a bar. The barman says \"Sorry, we don't serve food in here.\"",
    "Four fonts walk into a bar, the barman says \"Oi - get out! We don't want your type in here.\"",
    "A dyslexic man walks into a bra.",
    "There's two fish in a tank, and one says \"How do you drive this thing?\".",
    "Two aerials meet on a roof - fall in love - get married. The ceremony was rubbish - but the reception was brilliant.",
];

/// Adjectives the ADJECTIVE concept recognizes.
pub const ADJECTIVES: &[&str] = &[
    "big", "small", "old", "new", "red", "blue", "green", "heavy", "light",
    "front", "back", "left", "right", "main", "damn",
];
