use std::fmt;

/// Pipeline stage an external failure happened in.
///
/// Carried by [`Error::Stage`] so the caller of a drain sees where a
/// wrapped driver/transport error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connection,
    Query,
    Scan,
    Create,
    Drop,
    Insert,
    Commit,
    Read,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Connection => "connection",
            Stage::Query => "query",
            Stage::Scan => "scan",
            Stage::Create => "create",
            Stage::Drop => "drop",
            Stage::Insert => "insert",
            Stage::Commit => "commit",
            Stage::Read => "read",
            Stage::Write => "write",
        };
        f.write_str(s)
    }
}

/// Coarse category of an [`Error`]. Lets callers decide between
/// failing at startup and reporting a bad stream position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid option combination — permanent, raised at construction.
    Config,
    /// Opening a connection or selecting a schema failed.
    Connection,
    /// Unknown column type, unsupported value kind, schema mismatch.
    Type,
    /// Text could not be parsed into a cell.
    Convert,
    /// Driver or transport failure after the connection was established.
    Driver,
    Io,
    /// The drain was stopped from outside before the stream ended.
    Cancelled,
}

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("schema mismatch: expected [{expected}], got [{got}]")]
    SchemaMismatch { expected: String, got: String },

    #[error("type error: {0}")]
    Type(String),

    #[error("convert error: `{text}`: {reason}")]
    Convert { text: String, reason: String },

    #[error("{stage} error: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: BoxError,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn type_err(msg: impl Into<String>) -> Self {
        Error::Type(msg.into())
    }

    pub fn convert(text: impl Into<String>, reason: impl fmt::Display) -> Self {
        Error::Convert { text: text.into(), reason: reason.to_string() }
    }

    /// Wrap an external cause with the stage label it failed in.
    pub fn stage(stage: Stage, source: impl Into<BoxError>) -> Self {
        Error::Stage { stage, source: source.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::SchemaMismatch { .. } | Error::Type(_) => ErrorKind::Type,
            Error::Convert { .. } => ErrorKind::Convert,
            Error::Stage { stage: Stage::Connection, .. } => ErrorKind::Connection,
            Error::Stage { .. } => ErrorKind::Driver,
            Error::Io(_) => ErrorKind::Io,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Add context to the error, preserving its kind.
    ///
    /// Produces `"context: original message"` for message-carrying variants.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        match self {
            Error::Config(msg) => Error::Config(format!("{ctx}: {msg}")),
            Error::Type(msg) => Error::Type(format!("{ctx}: {msg}")),
            Error::Convert { text, reason } => Error::Convert { text, reason: format!("{ctx}: {reason}") },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_label_is_part_of_message() {
        let e = Error::stage(Stage::Insert, "duplicate key");
        assert_eq!(e.to_string(), "insert error: duplicate key");
        assert_eq!(e.kind(), ErrorKind::Driver);
    }

    #[test]
    fn connection_stage_is_connection_kind() {
        let e = Error::stage(Stage::Connection, "refused");
        assert_eq!(e.kind(), ErrorKind::Connection);
    }

    #[test]
    fn context_keeps_kind() {
        let e = Error::config("there is no table").with_context("rdb sink");
        assert_eq!(e.kind(), ErrorKind::Config);
        assert_eq!(e.to_string(), "config error: rdb sink: there is no table");
    }
}
