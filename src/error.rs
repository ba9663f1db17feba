//! Unified error hierarchy for pacetrack
//!
//! Analytics callers never see most of these: store and source failures are
//! logged and degrade to empty results. They surface at the edges (CLI, config,
//! settings persistence) and inside the cache, where a failure must be shared
//! between coalesced callers.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all pacetrack operations
#[derive(Debug, Error)]
pub enum PacetrackError {
    /// Event store or settings store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Biometric source errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Date range or window errors
    #[error("Invalid range: {0}")]
    InvalidRange(#[from] RangeError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Event store and settings store errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// Backing storage could not be read
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    /// Stored data could not be decoded
    #[error("Corrupted store at {path}: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    /// Write to settings storage failed
    #[error("Write failed for {key}: {reason}")]
    WriteFailed { key: String, reason: String },
}

/// Biometric source errors.
///
/// `Clone` because one failed query is handed to every coalesced caller.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    /// The source rejected or failed the query
    #[error("Query for {metric} failed: {reason}")]
    QueryFailed { metric: String, reason: String },

    /// The source is not reachable or not authorized
    #[error("Biometric source unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Range validation errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RangeError {
    /// Start lies after end
    #[error("start {start} is after end {end}")]
    Inverted { start: String, end: String },

    /// Analysis window of zero days
    #[error("window must cover at least one day")]
    EmptyWindow,
}

/// Result type alias for pacetrack operations
pub type Result<T> = std::result::Result<T, PacetrackError>;

impl PacetrackError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PacetrackError::Store(StoreError::Unavailable { .. })
                | PacetrackError::Source(_)
                | PacetrackError::Io(_)
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PacetrackError::Store(StoreError::Unavailable { .. }) => ErrorSeverity::Warning,
            PacetrackError::Source(_) => ErrorSeverity::Warning,
            PacetrackError::InvalidRange(_) => ErrorSeverity::Warning,
            PacetrackError::Store(_) => ErrorSeverity::Error,
            PacetrackError::Internal(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            PacetrackError::Store(StoreError::Unavailable { .. }) => {
                "Your history could not be read right now. Results may be incomplete.".to_string()
            }
            PacetrackError::Source(_) => {
                "Health data is unavailable right now. Try again later.".to_string()
            }
            PacetrackError::InvalidRange(RangeError::Inverted { start, end }) => {
                format!("The start date {} must not be after the end date {}.", start, end)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}
