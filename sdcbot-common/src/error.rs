//! Common error types for the SDC bots

use thiserror::Error;

/// Common result type for bot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Infrastructure errors shared across the bot binaries
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error (wraps reqwest::Error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON decoding error (wraps serde_json::Error)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Wiki API returned an error payload
    #[error("API error {code}: {info}")]
    Api { code: String, info: String },

    /// Login or token acquisition failed
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Outcome classification for a platform metadata fetch.
///
/// Permanent outcomes (the resource is gone or will never be readable)
/// are distinguished from transient ones (network weather, rate limits,
/// server errors) because only permanent outcomes may mark the skip
/// cache.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The platform reports the resource does not exist
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The platform refuses access (private, suspended, takedown)
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// Anything retryable: network failure, 5xx, rate limit, bad payload
    #[error("Transient fetch failure: {0}")]
    Transient(String),
}

impl FetchError {
    /// Map a fetch outcome onto the per-record skip taxonomy.
    pub fn into_record_error(self) -> RecordError {
        match self {
            FetchError::NotFound(msg) | FetchError::Forbidden(msg) => RecordError::Permanent(msg),
            FetchError::Transient(msg) => RecordError::Transient(msg),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transient(format!("request failed: {}", err))
    }
}

/// Why a record was abandoned without a submission.
///
/// `Permanent` marks the skip cache so the record is never revisited;
/// `Transient` leaves it unmarked for a later run.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("{0}")]
    Permanent(String),

    #[error("{0}")]
    Transient(String),
}

impl RecordError {
    /// True when the skip cache should be marked for this record.
    pub fn marks_cache(&self) -> bool {
        matches!(self, RecordError::Permanent(_))
    }
}

impl From<Error> for RecordError {
    /// Infrastructure failures are never grounds to write a record off.
    fn from(err: Error) -> Self {
        RecordError::Transient(err.to_string())
    }
}

impl From<FetchError> for RecordError {
    fn from(err: FetchError) -> Self {
        err.into_record_error()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_classification() {
        assert!(FetchError::NotFound("gone".into())
            .into_record_error()
            .marks_cache());
        assert!(FetchError::Forbidden("private".into())
            .into_record_error()
            .marks_cache());
        assert!(!FetchError::Transient("timeout".into())
            .into_record_error()
            .marks_cache());
    }

    #[test]
    fn test_error_display() {
        let err = Error::Api {
            code: "maxlag".to_string(),
            info: "Waiting for replication".to_string(),
        };
        assert_eq!(err.to_string(), "API error maxlag: Waiting for replication");
    }
}
