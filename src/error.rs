//! Error types for kv2couch
//!
//! This module defines the error hierarchy for a migration run:
//! - Source store errors (connection, enumeration, reads, flush)
//! - Per-key fetch errors and per-job save errors
//! - Configuration and CLI errors
//! - Worker pool errors
//!
//! Only store enumeration, configuration and worker pool failures are fatal.
//! Fetch and save errors are recorded against their key or job and the run
//! continues.

use thiserror::Error;

/// Top-level error type for a migration run
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Source store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// Enumeration returned nothing to migrate
    #[error("No keys found matching '{pattern}'")]
    NoKeys { pattern: String },
}

/// Source key-value store errors
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Connection failed
    #[error("Failed to connect to store at '{url}': {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// Key enumeration failed
    #[error("Failed to enumerate keys matching '{pattern}': {reason}")]
    EnumerateFailed { pattern: String, reason: String },

    /// Read of a single key failed
    #[error("Failed to read key '{key}': {reason}")]
    ReadFailed { key: String, reason: String },

    /// Key vanished between enumeration and read
    #[error("Key '{key}' not found")]
    Missing { key: String },

    /// Flush failed
    #[error("Failed to flush store: {0}")]
    FlushFailed(String),

    /// Redis protocol error
    #[error("Redis error: {0}")]
    Redis(String),
}

/// Failure to turn one key into a document
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    /// Key carries the reserved prefix and is never migrated
    #[error("Refusing to fetch reserved key '{key}'")]
    ReservedKey { key: String },

    /// Store read failed
    #[error(transparent)]
    StoreRead(#[from] StoreError),

    /// Stored value is not valid base64 or not UTF-8 once decoded
    #[error("Failed to decode value of '{key}': {reason}")]
    Decode { key: String, reason: String },
}

/// HTTP transport errors
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Request could not be sent or no response was received
    #[error("Request failed: {0}")]
    Request(String),

    /// Response body could not be read
    #[error("Failed to read response body: {0}")]
    Body(String),
}

/// Failure to submit one job's bulk request
#[derive(Error, Debug, Clone)]
pub enum SaveError {
    /// Network or transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body could not be read or is not UTF-8
    #[error("Unreadable response: {0}")]
    UnreadableResponse(String),

    /// Response body is not an array of per-document results
    ///
    /// This is how the destination rejects a whole batch, so the body is kept.
    #[error("Malformed response (HTTP {status}): {reason}")]
    MalformedResponse {
        status: u16,
        reason: String,
        raw: String,
    },
}

impl SaveError {
    /// Status and body of the reply, when one arrived
    pub fn reply(&self) -> Option<(u16, &str)> {
        match self {
            SaveError::MalformedResponse { status, raw, .. } => Some((*status, raw.as_str())),
            SaveError::Transport(_) | SaveError::UnreadableResponse(_) => None,
        }
    }
}

impl From<TransportError> for SaveError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Request(reason) => SaveError::Transport(reason),
            TransportError::Body(reason) => SaveError::UnreadableResponse(reason),
        }
    }
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No destination given
    #[error("Missing bulk save URL (pass SAVE_URL or --save-url)")]
    MissingSaveUrl,

    /// Destination is not a usable URL
    #[error("Invalid save URL '{url}': {reason}")]
    InvalidSaveUrl { url: String, reason: String },

    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid save limit
    #[error("Invalid save limit {size}: must be between 1 and {max}")]
    InvalidSaveLimit { size: usize, max: usize },

    /// Invalid exclude pattern
    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidExcludePattern { pattern: String, reason: String },

    /// Store host cannot be turned into a connection URL
    #[error("Invalid store host '{host}': {reason}")]
    InvalidStoreHost { host: String, reason: String },
}

/// Worker pool errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Job queue send failed
    #[error("Failed to send job: queue full or closed")]
    QueueSendFailed,

    /// Every worker exited before all results arrived
    #[error("Result channel closed after {received} of {expected} results")]
    ResultChannelClosed { received: usize, expected: usize },

    /// Worker thread could not be started
    #[error("Failed to initialize worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },
}

/// Result type alias for MigrateError
pub type Result<T> = std::result::Result<T, MigrateError>;

/// Result type alias for StoreError
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for SaveError
pub type SaveResult<T> = std::result::Result<T, SaveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_wraps_store_error() {
        let missing: FetchError = StoreError::Missing { key: "a".into() }.into();
        assert_eq!(missing.to_string(), "Key 'a' not found");
    }

    #[test]
    fn test_save_error_reply() {
        let rejected = SaveError::MalformedResponse {
            status: 400,
            reason: "invalid type: map".into(),
            raw: r#"{"error":"bad_request"}"#.into(),
        };
        assert_eq!(rejected.reply(), Some((400, r#"{"error":"bad_request"}"#)));
        assert_eq!(SaveError::Transport("down".into()).reply(), None);
    }

    #[test]
    fn test_transport_error_conversion() {
        let save: SaveError = TransportError::Request("connection refused".into()).into();
        assert!(matches!(save, SaveError::Transport(_)));

        let save: SaveError = TransportError::Body("eof".into()).into();
        assert!(matches!(save, SaveError::UnreadableResponse(_)));
    }

    #[test]
    fn test_error_conversion() {
        let store_err = StoreError::FlushFailed("READONLY".into());
        let migrate_err: MigrateError = store_err.into();
        assert!(matches!(migrate_err, MigrateError::Store(_)));
    }
}
