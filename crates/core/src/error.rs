//! Core Error Types
//!
//! Defines the foundational error types used across the ML Analysis workspace.
//!
//! - `CoreError` is the general-purpose error of the core and capability crates.
//! - `AnalysisError` is the fixed taxonomy an analysis run can end with. It is a
//!   tagged, serializable value so it can be stored as a run's failure reason and
//!   only turned into display text at the outermost boundary.
//!
//! The main application crate extends these with additional error variants
//! (e.g., Database, Sqlite) that require heavier dependencies.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error type for the ML Analysis workspace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Lookup of a capability identifier the registry does not know
    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    /// The dataset does not have the shape a computation needs
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Numerical procedure failed (singular matrix, no convergence, ...)
    #[error("Computation error: {0}")]
    Computation(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an unknown capability error
    pub fn unknown_capability(id: impl Into<String>) -> Self {
        Self::UnknownCapability(id.into())
    }

    /// Create an invalid data error
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Create a computation error
    pub fn computation(msg: impl Into<String>) -> Self {
        Self::Computation(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}

/// Failure taxonomy of an analysis.
///
/// `CapabilityUnavailable` and `CapabilityExecution` are absorbed below the
/// executor boundary (the fallback capability runs instead); the remaining
/// variants end a run in the `Failed` state.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum AnalysisError {
    /// Input cannot be read as tabular data
    #[error("Dataset could not be loaded: {0}")]
    DatasetLoad(String),

    /// Registry miss or implementation that could not be instantiated
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// The real implementation failed during computation
    #[error("Capability execution failed: {0}")]
    CapabilityExecution(String),

    /// The result store rejected a write
    #[error("Persistence failed: {0}")]
    Persistence(String),

    /// Execution exceeded the configured watchdog
    #[error("Analysis timed out after {0}s")]
    Timeout(u64),

    /// Any other failure in the surrounding orchestration
    #[error("Orchestration error: {0}")]
    Orchestration(String),
}

impl AnalysisError {
    /// Create a dataset load error
    pub fn dataset_load(msg: impl Into<String>) -> Self {
        Self::DatasetLoad(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create an orchestration error
    pub fn orchestration(msg: impl Into<String>) -> Self {
        Self::Orchestration(msg.into())
    }

    /// Whether this error is recovered by substituting the fallback capability
    pub fn is_absorbed(&self) -> bool {
        matches!(
            self,
            AnalysisError::CapabilityUnavailable(_) | AnalysisError::CapabilityExecution(_)
        )
    }
}
