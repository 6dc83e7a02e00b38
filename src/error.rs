use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Message attached to a failure when the engine left its error slot empty.
pub const MISSING_DIAGNOSTIC: &str = "native call reported failure without a diagnostic";

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to construct {operator}: {message}")]
    Construction {
        operator: &'static str,
        message: String,
    },

    #[error("{operator} forward failed: {message}")]
    Compute {
        operator: &'static str,
        message: String,
    },

    #[error("{0} has already been disposed")]
    Disposed(&'static str),

    #[error("Native call {call} failed: {message}")]
    Native {
        call: &'static str,
        message: String,
    },

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Tensor belongs to engine '{found}' but the operator runs on '{expected}'")]
    BackendMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

impl Error {
    /// Diagnostic text reported by the native engine, if this error carries one.
    pub fn native_message(&self) -> Option<&str> {
        match self {
            Error::Construction { message, .. }
            | Error::Compute { message, .. }
            | Error::Native { message, .. } => Some(message),
            _ => None,
        }
    }
}
