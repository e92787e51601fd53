//! Error types for scriptsync.
//!
//! Defines [`SyncError`], the unified error type for segmentation, scoring,
//! transcript reads, feed playback and configuration.

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

/// Errors produced by scriptsync operations.
///
/// Variants are grouped into recoverable (a poll loop retries on the next
/// tick) and fatal (the session cannot start or continue) categories.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    // ── Recoverable ──────────────────────────────────────────────────

    /// The similarity backend failed during a match attempt.
    #[error("scoring unavailable ({scorer}): {message}")]
    ScoringUnavailable {
        /// Name of the scorer that failed.
        scorer: String,
        /// Backend-supplied failure description.
        message: String,
    },

    /// The transcript source could not be read on this tick.
    #[error("transcript source unavailable ({origin}): {message}")]
    SourceUnavailable {
        /// Where the transcript was being read from.
        origin: String,
        /// What went wrong.
        message: String,
    },

    /// The downstream feed player failed to deliver a unit.
    #[error("playback failed: {0}")]
    Playback(String),

    // ── Fatal ────────────────────────────────────────────────────────

    /// The reference script is empty or unusable.
    #[error("invalid script: {reason}")]
    InvalidScript {
        /// Why no segments could be produced.
        reason: String,
    },

    /// Configuration is malformed or semantically invalid.
    #[error("invalid config: {reason}")]
    ConfigInvalid {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Shorthand for [`SyncError::InvalidScript`].
    pub fn invalid_script(reason: impl Into<String>) -> Self {
        Self::InvalidScript {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`SyncError::ScoringUnavailable`].
    pub fn scoring(scorer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ScoringUnavailable {
            scorer: scorer.into(),
            message: message.into(),
        }
    }

    /// Shorthand for [`SyncError::SourceUnavailable`].
    pub fn source_unavailable(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Shorthand for [`SyncError::ConfigInvalid`].
    pub fn config(reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            reason: reason.into(),
        }
    }

    /// Whether a poll loop should keep running after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ScoringUnavailable { .. } | Self::SourceUnavailable { .. } | Self::Playback(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_invalid_script() {
        let err = SyncError::invalid_script("script is empty");
        assert_eq!(err.to_string(), "invalid script: script is empty");
    }

    #[test]
    fn error_display_scoring_unavailable() {
        let err = SyncError::scoring("embedding", "connection refused");
        assert_eq!(
            err.to_string(),
            "scoring unavailable (embedding): connection refused"
        );
    }

    #[test]
    fn error_display_source_unavailable() {
        let err = SyncError::source_unavailable("transcript.txt", "not found");
        assert_eq!(
            err.to_string(),
            "transcript source unavailable (transcript.txt): not found"
        );
    }

    #[test]
    fn error_display_config_invalid() {
        let err = SyncError::config("threshold out of range");
        assert_eq!(err.to_string(), "invalid config: threshold out of range");
    }

    #[test]
    fn per_tick_errors_are_recoverable() {
        assert!(SyncError::scoring("x", "y").is_recoverable());
        assert!(SyncError::source_unavailable("x", "y").is_recoverable());
        assert!(SyncError::Playback("device gone".into()).is_recoverable());
    }

    #[test]
    fn startup_errors_are_fatal() {
        assert!(!SyncError::invalid_script("empty").is_recoverable());
        assert!(!SyncError::config("bad").is_recoverable());
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = SyncError::from(io_err);
        assert!(matches!(err, SyncError::Io(_)));
        assert!(err.to_string().contains("file missing"));
    }

    #[test]
    fn error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = SyncError::from(json_err);
        assert!(matches!(err, SyncError::Json(_)));
    }
}
