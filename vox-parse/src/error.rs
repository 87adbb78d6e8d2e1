use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParseErrorKind {
    InvalidTimeFormat,
    PastTime,
    NoMessage,
    InvalidCommand,
}

impl ParseErrorKind {
    /// What the assistant says back to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            ParseErrorKind::InvalidTimeFormat => {
                "I couldn't understand the time. Try something like \"at 5pm\" or \"in 10 minutes\"."
            }
            ParseErrorKind::PastTime => "That time has already passed. Please pick a time in the future.",
            ParseErrorKind::NoMessage => {
                "What should I remind you about? Try \"remind me to call mom at 5pm\"."
            }
            ParseErrorKind::InvalidCommand => "Sorry, I didn't understand that command.",
        }
    }
}

/// A recoverable parse failure. Returned, never panicked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CommandError {
    pub kind: ParseErrorKind,
    pub message: String,
}

impl CommandError {
    pub fn new(kind: ParseErrorKind) -> Self {
        Self {
            kind,
            message: kind.user_message().to_string(),
        }
    }

    pub fn invalid_time_format() -> Self {
        Self::new(ParseErrorKind::InvalidTimeFormat)
    }

    pub fn past_time() -> Self {
        Self::new(ParseErrorKind::PastTime)
    }

    pub fn no_message() -> Self {
        Self::new(ParseErrorKind::NoMessage)
    }

    pub fn invalid_command() -> Self {
        Self::new(ParseErrorKind::InvalidCommand)
    }
}
