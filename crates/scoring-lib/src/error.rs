//! Error taxonomy for the scoring pipeline

use thiserror::Error;

/// A core numeric field was present but could not be read as a real number
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid value for {field}: {value}")]
pub struct ValidationError {
    pub field: &'static str,
    pub value: String,
}

/// The resolved model failed while producing a label
#[derive(Debug, Clone, PartialEq, Error)]
#[error("model inference failed: {message}")]
pub struct InferenceError {
    pub message: String,
}

impl InferenceError {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        Self {
            message: format!("{:#}", err),
        }
    }
}

/// Startup-time failure of the model fallback chain
#[derive(Debug, Error)]
pub enum ModelResolutionError {
    #[error("remote model required but no remote tier produced one for '{model_name}' (tried: {attempted})")]
    RemoteUnavailable {
        model_name: String,
        attempted: String,
    },
}

/// Terminal failure outcomes of a single request
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("field 'data' is required")]
    MissingData,

    #[error(transparent)]
    InvalidData(#[from] ValidationError),

    #[error(transparent)]
    InferenceFailed(#[from] InferenceError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    pub fn status_code(&self) -> u16 {
        match self {
            HandlerError::MissingData | HandlerError::InvalidData(_) => 400,
            HandlerError::InferenceFailed(_) | HandlerError::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for the `error` field of the envelope
    pub fn code(&self) -> &'static str {
        match self {
            HandlerError::MissingData => "missing-data",
            HandlerError::InvalidData(_) => "invalid-data",
            HandlerError::InferenceFailed(_) => "inference-failed",
            HandlerError::Internal(_) => "internal-error",
        }
    }

    /// Message returned to callers. Server-side failures are not echoed back.
    pub fn public_message(&self) -> String {
        match self {
            HandlerError::MissingData | HandlerError::InvalidData(_) => self.to_string(),
            HandlerError::InferenceFailed(_) => "failed to execute the model".to_string(),
            HandlerError::Internal(_) => "unexpected error during execution".to_string(),
        }
    }
}
