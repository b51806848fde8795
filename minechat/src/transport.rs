//! One TCP connection with newline framing.

use std::{fmt, future::Future, io};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpStream,
};
use tracing::{debug, info, warn};

use crate::error::ChatError;

/// Longest line accepted from the server, delimiter included.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Where the chat server lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Reads and writes `\n`-terminated lines over a byte stream.
///
/// Dropping the transport releases the socket; [`LineTransport::close`] does
/// the same gracefully and may be called any number of times.
pub struct LineTransport<S = TcpStream> {
    stream: BufReader<S>,
    peer: String,
    max_line: usize,
    closed: bool,
}

impl LineTransport<TcpStream> {
    /// Resolves and connects. Any failure here is a retryable [`ChatError::Connect`].
    pub async fn open(endpoint: &Endpoint) -> Result<Self, ChatError> {
        let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|source| ChatError::Connect {
                endpoint: endpoint.to_string(),
                source,
            })?;

        info!(%endpoint, "connected");
        Ok(Self::new(stream, endpoint.to_string()))
    }
}

impl<S> LineTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        Self {
            stream: BufReader::new(stream),
            peer: peer.into(),
            max_line: MAX_LINE_BYTES,
            closed: false,
        }
    }

    pub fn with_max_line(mut self, max_line: usize) -> Self {
        self.max_line = max_line.max(1);
        self
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Waits for the next complete line, delimiter included.
    ///
    /// `Ok(None)` means the peer closed the stream. Bytes after the last
    /// delimiter are not a line and are dropped with the stream. A line longer
    /// than the limit is a [`ChatError::Protocol`] error.
    pub async fn read_line(&mut self) -> Result<Option<Vec<u8>>, ChatError> {
        let mut line = Vec::new();
        let bytes = (&mut self.stream)
            .take(self.max_line as u64)
            .read_until(b'\n', &mut line)
            .await
            .map_err(ChatError::ConnectionLost)?;

        if bytes == 0 {
            return Ok(None);
        }
        if line.last() != Some(&b'\n') {
            if bytes >= self.max_line {
                return Err(ChatError::Protocol(format!(
                    "{} sent a line longer than {} bytes",
                    self.peer, self.max_line
                )));
            }
            debug!(peer = %self.peer, bytes, "discarding unterminated trailing data");
            return Ok(None);
        }
        Ok(Some(line))
    }

    /// Writes an already-framed line and flushes it.
    pub async fn write_line(&mut self, bytes: &[u8]) -> Result<(), ChatError> {
        let writer = self.stream.get_mut();
        writer
            .write_all(bytes)
            .await
            .map_err(ChatError::ConnectionLost)?;
        writer.flush().await.map_err(ChatError::ConnectionLost)
    }

    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(error) = self.stream.get_mut().shutdown().await {
            // The peer may already be gone; the socket is released on drop regardless.
            if error.kind() != io::ErrorKind::NotConnected {
                warn!(peer = %self.peer, ?error, "failed to shut down connection cleanly");
            }
        }
    }
}

/// Opens a fresh transport for each connection attempt.
pub trait Connector {
    type Stream: AsyncRead + AsyncWrite + Unpin;

    fn connect(
        &mut self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = Result<LineTransport<Self::Stream>, ChatError>>;
}

/// Connects over TCP.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&mut self, endpoint: &Endpoint) -> Result<LineTransport<TcpStream>, ChatError> {
        LineTransport::open(endpoint).await
    }
}
