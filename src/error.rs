use thiserror::Error;
use uuid::Uuid;

/// Error taxonomy driving the trading loop's recover-or-exit decision.
///
/// Only `Transient` keeps the process alive: the loop logs, notifies,
/// backs off and resumes with state intact. Every other kind terminates
/// the process after a final notification.
#[derive(Debug, Error)]
pub enum BotError {
    /// Network failures, rate limits, exchange API hiccups
    #[error("transient exchange error: {0}")]
    Transient(String),

    /// Order submission failed or returned no order identifier
    #[error("order rejected: {0}")]
    OrderRejected(String),

    /// Fill confirmation attempts exhausted under the strict policy
    #[error("fill confirmation failed for order {0}")]
    ConfirmationFailed(Uuid),

    /// Logic or data errors with no safe recovery
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl BotError {
    /// Whether the loop should back off and continue instead of exiting
    pub fn is_transient(&self) -> bool {
        matches!(self, BotError::Transient(_))
    }
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BotError::Unexpected(format!("malformed exchange response: {err}"))
        } else {
            BotError::Transient(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::Unexpected(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
