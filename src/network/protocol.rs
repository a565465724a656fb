//! Protocol Messages
//!
//! Wire envelope exchanged between the two peers. Serialized as compact JSON
//! `{"type": TAG, "data": PAYLOAD}`; the payload shape is fixed by the tag and
//! anything else is rejected at decode time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::feedback::Score;

/// Messages exchanged between host and joiner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Sender's display name.
    Name(String),

    /// Host asks the joiner to pick a secret of this many digits.
    SetupRequest(u32),

    /// Sender has locked in its secret.
    SecretReady(bool),

    /// Host starts play with this digit count.
    Start(u32),

    /// A guess at the receiver's secret.
    Guess(String),

    /// Receiver's score for a previous guess.
    Result(GuessReport),

    /// Sender is leaving the session.
    Disconnect,
}

/// Scored guess sent back to the guesser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GuessReport {
    /// The guess as received.
    pub guess: String,
    /// Digits present anywhere in the secret.
    pub match_count: u32,
    /// Digits present at the same index.
    pub position_count: u32,
}

impl GuessReport {
    /// Build a report from a guess and its score.
    pub fn new(guess: impl Into<String>, score: Score) -> Self {
        Self {
            guess: guess.into(),
            match_count: score.match_count,
            position_count: score.position_count,
        }
    }

    /// Score carried by this report.
    pub fn score(&self) -> Score {
        Score::new(self.match_count, self.position_count)
    }
}

/// Message tag without payload, for logging and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// `NAME`
    Name,
    /// `SETUP_REQUEST`
    SetupRequest,
    /// `SECRET_READY`
    SecretReady,
    /// `START`
    Start,
    /// `GUESS`
    Guess,
    /// `RESULT`
    Result,
    /// `DISCONNECT`
    Disconnect,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            MessageKind::Name => "NAME",
            MessageKind::SetupRequest => "SETUP_REQUEST",
            MessageKind::SecretReady => "SECRET_READY",
            MessageKind::Start => "START",
            MessageKind::Guess => "GUESS",
            MessageKind::Result => "RESULT",
            MessageKind::Disconnect => "DISCONNECT",
        };
        f.write_str(tag)
    }
}

impl Message {
    /// Tag of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Name(_) => MessageKind::Name,
            Message::SetupRequest(_) => MessageKind::SetupRequest,
            Message::SecretReady(_) => MessageKind::SecretReady,
            Message::Start(_) => MessageKind::Start,
            Message::Guess(_) => MessageKind::Guess,
            Message::Result(_) => MessageKind::Result,
            Message::Disconnect => MessageKind::Disconnect,
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Deserialize from JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
