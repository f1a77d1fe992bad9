//! Error types for the statement parser library.
//!
//! Only container-level problems are errors. Row-level problems are turned
//! into [`ParseWarning`](crate::types::ParseWarning)s by the parsers and never
//! reach the caller as an `Err`.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while detecting or parsing a statement.
#[derive(Debug, Error)]
pub enum Error {
    /// The input cannot be decoded as text or as a statement container.
    #[error("unreadable input: {0}")]
    UnreadableInput(String),

    /// No parser is registered for the detected file format.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The PDF byte stream is not a well-formed PDF container.
    #[error("corrupt PDF container: {0}")]
    CorruptContainer(String),

    /// I/O error occurred while reading input (CLI front-ends).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid format name specified.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Invalid date in a single row.
    #[error("unparseable date: {0}")]
    InvalidDate(String),

    /// Invalid amount in a single row.
    #[error("unparseable amount: {0}")]
    InvalidAmount(String),

    /// Missing required field in a single row.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A coded field (action, transaction type) holds an unknown value.
    #[error("unrecognized value: {0}")]
    UnrecognizedValue(String),
}

/// Reason codes surfaced to callers for hard failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReasonCode {
    UnreadableInput,
    UnsupportedFormat,
    CorruptContainer,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::UnreadableInput => "UNREADABLE_INPUT",
            ReasonCode::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            ReasonCode::CorruptContainer => "CORRUPT_CONTAINER",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Map this error onto the caller-facing reason code.
    ///
    /// Row-level variants only escape a parser through programming errors;
    /// they are reported as unreadable input.
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            Error::UnsupportedFormat(_) | Error::InvalidFormat(_) => ReasonCode::UnsupportedFormat,
            Error::CorruptContainer(_) => ReasonCode::CorruptContainer,
            Error::UnreadableInput(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::InvalidDate(_)
            | Error::InvalidAmount(_)
            | Error::MissingField(_)
            | Error::UnrecognizedValue(_) => ReasonCode::UnreadableInput,
        }
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::UnreadableInput(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::UnreadableInput(err.to_string())
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::CorruptContainer(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        assert_eq!(
            Error::UnreadableInput("x".into()).reason_code().as_str(),
            "UNREADABLE_INPUT"
        );
        assert_eq!(
            Error::UnsupportedFormat("x".into()).reason_code().to_string(),
            "UNSUPPORTED_FORMAT"
        );
        assert_eq!(
            Error::CorruptContainer("x".into()).reason_code(),
            ReasonCode::CorruptContainer
        );
    }

    #[test]
    fn test_io_error_is_unreadable() {
        let err: Error = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert_eq!(err.reason_code(), ReasonCode::UnreadableInput);
    }
}
