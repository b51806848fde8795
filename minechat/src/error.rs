use std::io;

use thiserror::Error;

/// Every way a chat session can fail.
///
/// The supervisor only ever asks one question of an error: [`ChatError::is_retryable`].
/// Network trouble is retried with backoff; everything else stops the process.
#[derive(Debug, Error)]
pub enum ChatError {
    /// DNS resolution failed, or the connection was refused or aborted.
    #[error("unable to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    /// The socket broke after it was established, including a peer hanging up mid-handshake.
    #[error("connection lost: {0}")]
    ConnectionLost(#[source] io::Error),

    /// The server answered the token with `null`.
    #[error("authentication rejected: the server does not know this token")]
    AuthRejected,

    /// The server sent something this client cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Missing or invalid local configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The history file or token file could not be read or written.
    #[error("local storage error at {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl ChatError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::ConnectionLost(_))
    }

    pub(crate) fn closed_during(stage: &str) -> Self {
        Self::ConnectionLost(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("server closed the connection during {stage}"),
        ))
    }
}
