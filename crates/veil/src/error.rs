//! Error types for the engine.

use thiserror::Error;
use veil_core::VeilError;

use crate::backend::OperationPoint;

/// Errors that can occur while configuring, loading or unloading Veil.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Table, token or control error.
    #[error("policy error: {0}")]
    Policy(#[from] VeilError),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Configuration file could not be read.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A callback is already installed at this operation point.
    #[error("operation point already hooked: {0:?}")]
    AlreadyHooked(OperationPoint),

    /// No callback is installed at this operation point.
    #[error("operation point not hooked: {0:?}")]
    NotHooked(OperationPoint),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
