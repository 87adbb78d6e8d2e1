//! Error types at the engine boundary.
//!
//! Every public manager method returns `Result<_, EngineError>`. Internal
//! helpers may return `Option` for "not found / not applicable", which callers
//! treat as a no-op.

use thiserror::Error;
use vox_parse::CommandError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("storage failure: {0}")]
    Backend(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        StoreError::NotFound { entity, id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("platform service unavailable: {0}")]
    Unavailable(String),

    #[error("geofence limit reached")]
    LimitExceeded,

    #[error("platform call failed: {0}")]
    Failed(String),
}

impl PlatformError {
    /// Only transient failures are worth another attempt; permission errors never are.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PlatformError::Unavailable(_) | PlatformError::Failed(_))
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] CommandError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("{0}")]
    Validation(String),

    #[error("unexpected error: {0:#}")]
    Unexpected(#[from] anyhow::Error),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }

    /// Message safe to show (or speak) to the user. Diagnostic detail stays in the logs.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::Parse(e) => e.message.clone(),
            EngineError::Validation(msg) => msg.clone(),
            EngineError::Store(StoreError::NotFound { .. }) => "I couldn't find that item.".to_string(),
            EngineError::Platform(PlatformError::PermissionDenied) => {
                "Location permission is required for location reminders.".to_string()
            }
            EngineError::Platform(PlatformError::LimitExceeded) => {
                "Too many location reminders are active. Remove one and try again.".to_string()
            }
            EngineError::Platform(PlatformError::Unavailable(_)) => {
                "That service isn't available right now. Please try again.".to_string()
            }
            EngineError::Store(_) | EngineError::Platform(_) | EngineError::Unexpected(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vox_parse::ParseErrorKind;

    #[test]
    fn test_retry_classification() {
        assert!(PlatformError::Failed("timeout".into()).is_retryable());
        assert!(PlatformError::Unavailable("gps".into()).is_retryable());
        assert!(!PlatformError::PermissionDenied.is_retryable());
        assert!(!PlatformError::LimitExceeded.is_retryable());
    }

    #[test]
    fn test_user_messages_hide_detail() {
        let parse: EngineError = CommandError::new(ParseErrorKind::PastTime).into();
        assert_eq!(parse.user_message(), ParseErrorKind::PastTime.user_message());

        let denied: EngineError = PlatformError::PermissionDenied.into();
        assert!(denied.user_message().contains("permission"));

        let backend: EngineError = StoreError::Backend("disk full at /data/db".into()).into();
        assert!(!backend.user_message().contains("/data/db"));
        assert!(backend.to_string().contains("/data/db"));
    }
}
