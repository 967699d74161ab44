//! Confirmation classification.
//!
//! The decision engine asks a [`ConfirmationClassifier`] whether the user's
//! reply confirms the requirements summary, what to ask when a change
//! request is underspecified, and whether a message after a failure asks
//! for a retry. Model-backed implementations live outside this crate;
//! [`KeywordClassifier`] is the deterministic fallback.

use serde::{Deserialize, Serialize};
use tripwright_core::ChatMessage;

/// What the user wants after an operation failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryIntent {
    pub retry: bool,
    pub modify_and_retry: bool,
    #[serde(default)]
    pub suggested_changes: Vec<String>,
}

pub trait ConfirmationClassifier: Send + Sync {
    /// Whether `message` confirms the trip shown in `summary`.
    fn classify_confirmation(&self, message: &str, summary: &str) -> bool;

    /// A clarifying question for a change request that names no new value.
    fn infer_clarifying_question(
        &self,
        message: &str,
        history: &[ChatMessage],
        summary: &str,
    ) -> Option<String>;

    fn classify_error_recovery(&self, message: &str, operation: &str, error: &str) -> RecoveryIntent;
}

// ============================================================================
// KEYWORD CLASSIFIER
// ============================================================================

const CONFIRMATIONS: &[&str] = &[
    "yes",
    "y",
    "ok",
    "okay",
    "looks good",
    "look good",
    "go ahead",
    "correct",
    "that's right",
    "thats right",
    "confirm",
    "proceed",
    "search",
    "find flights",
    "find hotels",
    "get quotes",
    "sounds good",
    "perfect",
    "good",
    "continue",
    "book it",
    "that works",
];

const CONFIRMING_PREFIXES: &[&str] = &["yes ", "yes,", "ok ", "ok,", "sure ", "go ahead"];

/// Phrases that confirm when they appear in a short message.
const CONFIRMING_PHRASES: &[&str] = &[
    "go ahead",
    "looks good",
    "sounds good",
    "let's go",
    "that works",
    "book it",
];

const RETRY_PHRASES: &[&str] = &["try again", "retry", "please try", "go again"];

const SHORT_CONFIRMATION_LEN: usize = 50;
const SHORT_RETRY_LEN: usize = 20;

/// Keyword heuristics; never infers clarifying questions.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

impl ConfirmationClassifier for KeywordClassifier {
    fn classify_confirmation(&self, message: &str, _summary: &str) -> bool {
        let t = normalize(message);
        if t.is_empty() {
            return false;
        }
        if CONFIRMATIONS.contains(&t.as_str()) {
            return true;
        }
        if CONFIRMING_PREFIXES.iter().any(|p| t.starts_with(p)) {
            return true;
        }
        t.chars().count() < SHORT_CONFIRMATION_LEN && CONFIRMING_PHRASES.iter().any(|p| t.contains(p))
    }

    fn infer_clarifying_question(
        &self,
        _message: &str,
        _history: &[ChatMessage],
        _summary: &str,
    ) -> Option<String> {
        None
    }

    fn classify_error_recovery(&self, message: &str, _operation: &str, _error: &str) -> RecoveryIntent {
        let t = normalize(message);
        let retry = RETRY_PHRASES.iter().any(|p| t.contains(p))
            || (t.chars().count() < SHORT_RETRY_LEN && t.contains("yes"));
        RecoveryIntent {
            retry,
            ..RecoveryIntent::default()
        }
    }
}
