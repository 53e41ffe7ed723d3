//! Second-factor challenge bridge for the qualified flow.
//!
//! The signing server answers the first request of the qualified flow with an
//! entry point URL. The host embeds that page; when the user confirms (or
//! aborts) the page posts one message back. The bridge correlates that message
//! with the challenge it opened and tells the orchestrator what to do next.

use serde::{Deserialize, Serialize};

use pdfsign_core::models::SigningChallenge;
use pdfsign_core::{Lang, PdfSignError};

/// Shorter session ids are rejected without any state change, as are ids with
/// characters other than ASCII letters, digits, `-` and `_`.
pub const MIN_SESSION_ID_LEN: usize = 15;

/// Message posted by the embedded challenge page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BridgeMessage {
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cause: Option<String>,
    },
    Completion {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

impl BridgeMessage {
    pub fn parse(raw: &str) -> Result<Self, PdfSignError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Known security-layer error codes with their localized messages.
static SECURITY_LAYER_ERRORS: &[(&str, &str, &str)] = &[
    (
        "6000",
        "Der Signaturvorgang wurde abgebrochen.",
        "The signing process was cancelled.",
    ),
    (
        "6001",
        "Der Signaturvorgang wurde durch eine Zeitüberschreitung beendet.",
        "The signing process timed out.",
    ),
    (
        "6002",
        "Die Bestätigung der Signatur ist fehlgeschlagen.",
        "Confirmation of the signature failed.",
    ),
];

/// Map a raw bridge error to a localized message. Unknown codes pass through verbatim.
///
/// A code matches only as a whole number in the error or its cause.
pub fn map_security_layer_error(error: &str, cause: Option<&str>, lang: Lang) -> String {
    let numbers: Vec<&str> = [Some(error), cause]
        .into_iter()
        .flatten()
        .flat_map(|text| text.split(|c: char| !c.is_ascii_digit()))
        .filter(|n| !n.is_empty())
        .collect();

    SECURITY_LAYER_ERRORS
        .iter()
        .find(|(code, _, _)| numbers.contains(code))
        .map(|(_, de, en)| match lang {
            Lang::De => de.to_string(),
            Lang::En => en.to_string(),
        })
        .unwrap_or_else(|| error.to_string())
}

/// Session ids end up as a URL path segment of an authenticated request.
fn is_valid_session_id(session_id: &str) -> bool {
    session_id.chars().count() >= MIN_SESSION_ID_LEN
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// What the orchestrator should do with a bridge message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// No state change.
    Ignored(&'static str),
    /// The challenge failed; the in-flight document is recorded as failed.
    Failed(String),
    /// The challenge completed; fetch the signed document for this session.
    Completed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BridgeState {
    #[default]
    Idle,
    ChallengeOpen(SigningChallenge),
}

#[derive(Debug, Default)]
pub struct ExternalAuthBridge {
    state: BridgeState,
    lang: Lang,
}

impl ExternalAuthBridge {
    pub fn new(lang: Lang) -> Self {
        Self {
            state: BridgeState::Idle,
            lang,
        }
    }

    pub fn state(&self) -> &BridgeState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, BridgeState::ChallengeOpen(_))
    }

    pub fn challenge(&self) -> Option<&SigningChallenge> {
        match &self.state {
            BridgeState::ChallengeOpen(challenge) => Some(challenge),
            BridgeState::Idle => None,
        }
    }

    /// Open a challenge. Only one may be open at a time.
    pub fn open(&mut self, challenge: SigningChallenge) -> Result<(), PdfSignError> {
        if self.is_open() {
            return Err(PdfSignError::Challenge(
                "A second-factor challenge is already open".to_string(),
            ));
        }
        tracing::debug!(url = %challenge.url, "Opening second-factor challenge");
        self.state = BridgeState::ChallengeOpen(challenge);
        Ok(())
    }

    /// Tear down any open challenge.
    pub fn reset(&mut self) {
        if self.is_open() {
            tracing::debug!("Resetting second-factor challenge");
        }
        self.state = BridgeState::Idle;
    }

    pub fn accept(&mut self, message: BridgeMessage) -> BridgeOutcome {
        if !self.is_open() {
            return BridgeOutcome::Ignored("no challenge is open");
        }

        match message {
            BridgeMessage::Error { error, cause } => {
                self.state = BridgeState::Idle;
                BridgeOutcome::Failed(map_security_layer_error(
                    &error,
                    cause.as_deref(),
                    self.lang,
                ))
            }
            BridgeMessage::Completion { session_id } => {
                let session_id = session_id.trim();
                if !is_valid_session_id(session_id) {
                    tracing::warn!(
                        length = session_id.len(),
                        "Ignoring bridge completion with implausible session id"
                    );
                    return BridgeOutcome::Ignored("implausible session id");
                }
                self.state = BridgeState::Idle;
                BridgeOutcome::Completed(session_id.to_string())
            }
        }
    }
}
