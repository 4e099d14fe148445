//! Error taxonomy for the staging core.
//!
//! Parameter and shape errors are raised where they happen and propagate to
//! the immediate caller. Annotation-file errors are translated once at the
//! load boundary, see [`crate::annotation::load_or_create`].
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("shape mismatch: {0}")]
    Shape(String),

    #[error("channel '{0}' is not in the recording")]
    UnknownChannel(String),

    #[error("state code {0} is not in the state map")]
    InvalidState(u8),

    #[error("feature columns {found:?} do not match the classifier input {expected:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("no model registered for {0}")]
    MissingModel(String),

    #[error("annotation file is empty")]
    EmptyAnnotation,

    #[error("annotation file is invalid: {0}")]
    InvalidAnnotation(String),

    #[error("cannot create a new annotation, load a recording first")]
    NoRecording,

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("time format error: {0}")]
    Time(#[from] chrono::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn param(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }

    pub(crate) fn shape(msg: impl Into<String>) -> Self {
        Error::Shape(msg.into())
    }
}
