//! Error types for pgview.
//!
//! Every failure of the view layer, the decoders and the execution engine is
//! reported through [`Error`]. Decoding never mutates the result handle, so an
//! error never leaves shared state half-updated.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("field {column} is null")]
    UnexpectedNull { column: String },

    #[error("field length {len} not in range {min}-{max} for field {column}")]
    LengthOutOfRange {
        len: usize,
        min: usize,
        max: usize,
        column: String,
    },

    #[error("cannot parse {text:?} as {target}: {reason}")]
    Parse {
        text: String,
        target: &'static str,
        reason: &'static str,
    },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("row {row} out of range (result has {rows} rows)")]
    RowOutOfRange { row: usize, rows: usize },

    #[error("field {column} >= size() {columns}")]
    ColumnOutOfRange { column: usize, columns: usize },

    #[error("no such field")]
    NoSuchField,

    #[error("no such field: {0}")]
    UnknownColumn(String),

    #[error("field {column}: {source}")]
    Column {
        column: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("{severity}: {message} ({code})")]
    Server {
        severity: String,
        code: String,
        message: String,
        detail: Option<String>,
        hint: Option<String>,
    },

    #[error("execution engine has not been started")]
    EngineNotStarted,

    #[error("execution engine is stopped")]
    EngineStopped,

    #[error("execution engine cannot be stopped from its own thread")]
    StopFromEngineThread,

    #[error("cannot block on the execution engine from its own thread")]
    BlockingOnEngineThread,

    #[error("submitted work was dropped before completing")]
    TaskCancelled,

    #[error("global execution engine is already initialized")]
    AlreadyInitialized,

    #[error("execution engine thread panicked")]
    EnginePanicked,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn parse(text: &str, target: &'static str, reason: &'static str) -> Self {
        Error::Parse {
            text: text.to_string(),
            target,
            reason,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_column() {
        let err = Error::LengthOutOfRange {
            len: 7,
            min: 8,
            max: 8,
            column: "created_at".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "field length 7 not in range 8-8 for field created_at"
        );

        let err = Error::parse("01:xx:03", "duration", "invalid minutes");
        assert_eq!(
            err.to_string(),
            "cannot parse \"01:xx:03\" as duration: invalid minutes"
        );
    }

    #[test]
    fn test_column_wraps_source() {
        let err = Error::Column {
            column: "payload".to_string(),
            source: Box::new(Error::InvalidData("bad json".to_string())),
        };
        assert_eq!(err.to_string(), "field payload: Invalid data: bad json");
        assert!(std::error::Error::source(&err).is_some());
    }
}
