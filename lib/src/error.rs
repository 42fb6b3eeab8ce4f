//! Error type shared by the scrambling core and its I/O collaborators

use thiserror::Error;

/// Errors raised while validating inputs or running a scramble
#[derive(Debug, Error)]
pub enum ScrambleError {
    /// Required arguments missing, or too many supplied
    #[error("expected {expected}, got {got} argument(s)")]
    ArgumentCount { expected: String, got: usize },

    /// Array lengths or dimensions disagree with what the operation derives
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A value lies outside the domain the operation accepts
    #[error("invalid value: {0}")]
    DomainValidation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audio error: {0}")]
    Audio(String),

    #[error("image error: {0}")]
    Image(String),

    #[error("record error: {0}")]
    Record(#[from] serde_json::Error),
}

impl ScrambleError {
    pub(crate) fn shape(msg: impl Into<String>) -> Self {
        ScrambleError::ShapeMismatch(msg.into())
    }

    pub(crate) fn domain(msg: impl Into<String>) -> Self {
        ScrambleError::DomainValidation(msg.into())
    }
}

impl From<symphonia::core::errors::Error> for ScrambleError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        ScrambleError::Audio(err.to_string())
    }
}

impl From<hound::Error> for ScrambleError {
    fn from(err: hound::Error) -> Self {
        ScrambleError::Audio(err.to_string())
    }
}

#[cfg(feature = "image")]
impl From<image::ImageError> for ScrambleError {
    fn from(err: image::ImageError) -> Self {
        ScrambleError::Image(err.to_string())
    }
}
