//! Error types for Switchyard operations

use crate::ValueClass;
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Preference not found: {name}")]
    NotFound { name: String },

    #[error("Preference name already exists: {name}")]
    DuplicateName { name: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Storage backend failed: {reason}")]
    Backend { reason: String },

    #[error("Cache backend failed: {reason}")]
    Cache { reason: String },
}

/// Validation errors raised when a write is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Preference name can't be blank")]
    BlankName,

    #[error("Preference name has already been taken: {name}")]
    DuplicateName { name: String },

    #[error("Value class {class} is not allowed, widen the value class policy to accept it")]
    ValueClassNotAllowed { class: ValueClass },

    #[error("Numeric value {value} can't be stored, only finite numbers are allowed")]
    NonFiniteNumber { value: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Switchyard errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SwitchyardError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl SwitchyardError {
    /// True when the error is a uniqueness violation on the preference name,
    /// whether it was caught by validation or by the repository constraint.
    pub fn is_duplicate_name(&self) -> bool {
        matches!(
            self,
            SwitchyardError::Storage(StorageError::DuplicateName { .. })
                | SwitchyardError::Validation(ValidationError::DuplicateName { .. })
        )
    }
}

/// Result type alias for Switchyard operations.
pub type SwitchyardResult<T> = Result<T, SwitchyardError>;

// =============================================================================
// TESTS
// =============================================================================
