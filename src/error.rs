//! Error types for component and sparse-matrix operations

use thiserror::Error;

/// Result type alias using this crate's [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by components, sparse matrices and the stream format.
///
/// None of these are retried internally; they propagate straight to the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// Operand shapes are incompatible
    #[error("{context}: dimension mismatch, expected {expected:?}, got {got:?}")]
    DimensionMismatch {
        /// Component type, debug label or operation name
        context: String,
        /// Expected dimensions
        expected: Vec<usize>,
        /// Actual dimensions
        got: Vec<usize>,
    },

    /// Malformed serialized content
    #[error("Format error: {0}")]
    Format(String),

    /// Optional hook invoked on a type that does not provide it
    #[error("{component} does not support {operation}")]
    Unsupported {
        /// Component type
        component: String,
        /// Operation name
        operation: &'static str,
    },

    /// Type token or config type name not in the registry
    #[error("Unknown component type '{0}'")]
    UnknownType(String),

    /// Operation invoked in the wrong lifecycle state or with stale index metadata
    #[error("{component}: {reason}")]
    State {
        /// Component type or debug label
        component: String,
        /// What went wrong
        reason: String,
    },

    /// Malformed config line or unknown configuration key
    #[error("Config error: {0}")]
    Config(String),

    /// Underlying stream failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a dimension mismatch error
    pub fn dimension(context: impl Into<String>, expected: &[usize], got: &[usize]) -> Self {
        Self::DimensionMismatch {
            context: context.into(),
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Create a state error
    pub fn state(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::State {
            component: component.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported-operation error
    pub fn unsupported(component: impl Into<String>, operation: &'static str) -> Self {
        Self::Unsupported {
            component: component.into(),
            operation,
        }
    }

    /// Create a format error
    pub fn format(reason: impl Into<String>) -> Self {
        Self::Format(reason.into())
    }

    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }
}
