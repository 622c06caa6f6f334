// src/error.rs
use std::io;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the control-socket client.
///
/// Only `Transport` is recovered locally (by the retry policy). Everything
/// else reaches the caller as-is.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport error on {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("{0} is not a valid metric")]
    UnknownMetric(String),

    #[error("inconsistent values for {field} across instances: {values:?}")]
    Inconsistent {
        field: String,
        values: Vec<(usize, String)>,
    },

    #[error("command failed: {0}")]
    CommandFailed(String),

    #[error("could not find {kind} {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("found {count} matches for {kind} {name}, expected exactly one")]
    Ambiguous {
        kind: &'static str,
        name: String,
        count: usize,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("instance task failed: {0}")]
    Task(String),
}

impl Error {
    pub(crate) fn transport(endpoint: impl Into<String>, source: io::Error) -> Self {
        Error::Transport {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// True for failures the retry policy is allowed to absorb.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }
}
