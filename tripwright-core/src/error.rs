//! Error types for Tripwright operations

use thiserror::Error;

/// Validation errors raised while folding results or applying patches.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Malformed result from {operation}: {reason}")]
    MalformedResult { operation: String, reason: String },

    #[error("Patch rejected: {reason}")]
    PatchRejected { reason: String },

    #[error("Invalid status combination: phase {phase}, state {state}")]
    InvalidStatus { phase: String, state: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    ParseFailed { reason: String },
}

/// Document store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Trip intent not found: {trip_id}")]
    NotFound { trip_id: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Serialization failed for {trip_id}: {reason}")]
    SerializationFailed { trip_id: String, reason: String },
}

/// Errors surfaced by the dispatch loop around the engines.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Operation {operation} failed: {reason}")]
    OperationFailed { operation: String, reason: String },

    #[error("Invalid operation name: {name}")]
    InvalidOperationName { name: String },

    #[error("Dispatch limit reached: {dispatched} operations dispatched this turn (max {limit})")]
    TooManyDispatches { dispatched: usize, limit: usize },

    #[error("Operation {operation} repeated {repeats} times this turn (max {limit})")]
    TooManyRepeats {
        operation: String,
        repeats: usize,
        limit: usize,
    },
}

impl DispatchError {
    /// Whether this error was raised by a runaway-loop guard.
    pub fn is_runaway(&self) -> bool {
        matches!(
            self,
            DispatchError::TooManyDispatches { .. } | DispatchError::TooManyRepeats { .. }
        )
    }
}

/// Master error type for all Tripwright errors.
#[derive(Debug, Clone, Error)]
pub enum TripwrightError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Result type alias for Tripwright operations.
pub type TripwrightResult<T> = Result<T, TripwrightError>;

// =============================================================================
// TESTS
// =============================================================================
