use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EdfError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid character {character:?} in header field '{field}'")]
    InvalidCharacter { field: &'static str, character: char },

    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("Malformed annotation at byte {position}: {message}")]
    MalformedAnnotation { position: usize, message: String },

    #[error("Annotation block truncated at byte {position}")]
    TruncatedAnnotation { position: usize },

    #[error("Timekeeping annotation of record {record} says {found}s, expected {expected}s")]
    TimingMismatch { record: usize, expected: f64, found: f64 },

    #[error("Signal index {0} out of range")]
    InvalidSignalIndex(usize),
}

impl EdfError {
    pub(crate) fn malformed_annotation(position: usize, message: impl Into<String>) -> Self {
        EdfError::MalformedAnnotation { position, message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, EdfError>;
