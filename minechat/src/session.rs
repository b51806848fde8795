//! What happens on a connection once the handshake is done.
//!
//! - [`ListenSession`] forwards every broadcast line to a [`Sink`] until the
//!   server hangs up.
//! - [`SendSession`] writes one message and returns without reading.
//! - [`HandshakeOnly`] does nothing; registration is complete once the
//!   handshake yields an account record.

use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::{
    codec::{ChatLine, OutboundMessage, decode_chat_line, encode_message},
    error::ChatError,
    history::Sink,
    transport::LineTransport,
};

pub trait Session {
    type Output;

    /// Runs on the post-handshake connection until the use case is complete.
    fn run<S>(
        &mut self,
        transport: &mut LineTransport<S>,
    ) -> impl Future<Output = Result<Self::Output, ChatError>>
    where
        S: AsyncRead + AsyncWrite + Unpin;

    /// Whether at least one line was exchanged since the last [`Session::on_connected`].
    fn made_progress(&self) -> bool {
        false
    }

    /// Called after each successful connect, before the handshake.
    fn on_connected(&mut self) -> impl Future<Output = Result<(), ChatError>> {
        async { Ok(()) }
    }

    /// Called when an attempt failed and will be retried.
    fn on_retry(&mut self, _cause: &ChatError) -> impl Future<Output = Result<(), ChatError>> {
        async { Ok(()) }
    }
}

pub struct ListenSession<'a, K> {
    sink: &'a mut K,
    received: u64,
    total: u64,
}

impl<'a, K: Sink> ListenSession<'a, K> {
    pub fn new(sink: &'a mut K) -> Self {
        Self {
            sink,
            received: 0,
            total: 0,
        }
    }

    /// Lines delivered to the sink across all connections.
    pub fn total_received(&self) -> u64 {
        self.total
    }
}

impl<K: Sink> Session for ListenSession<'_, K> {
    type Output = ();

    async fn run<S>(&mut self, transport: &mut LineTransport<S>) -> Result<(), ChatError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.received = 0;
        while let Some(line) = transport.read_line().await? {
            self.sink.append(&decode_chat_line(&line)).await?;
            self.received += 1;
            self.total += 1;
        }

        info!(
            peer = %transport.peer(),
            lines = self.received,
            "server closed the stream"
        );
        Ok(())
    }

    fn made_progress(&self) -> bool {
        self.received > 0
    }

    async fn on_connected(&mut self) -> Result<(), ChatError> {
        self.received = 0;
        self.sink.append(&ChatLine::now("Connected")).await
    }

    async fn on_retry(&mut self, cause: &ChatError) -> Result<(), ChatError> {
        self.sink
            .append_raw(&format!("Unable to connect: {cause}"))
            .await
    }
}

pub struct SendSession {
    message: OutboundMessage,
}

impl SendSession {
    pub fn new(message: OutboundMessage) -> Self {
        Self { message }
    }
}

impl Session for SendSession {
    type Output = ();

    async fn run<S>(&mut self, transport: &mut LineTransport<S>) -> Result<(), ChatError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        transport
            .write_line(&encode_message(self.message.text()))
            .await?;
        debug!(message = %self.message.text(), "submitted message");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HandshakeOnly;

impl Session for HandshakeOnly {
    type Output = ();

    async fn run<S>(&mut self, _transport: &mut LineTransport<S>) -> Result<(), ChatError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[derive(Default)]
    struct Recorder {
        lines: Vec<String>,
        raw: Vec<String>,
    }

    impl Sink for Recorder {
        async fn append(&mut self, line: &ChatLine) -> Result<(), ChatError> {
            self.lines.push(line.raw_text.clone());
            Ok(())
        }

        async fn append_raw(&mut self, text: &str) -> Result<(), ChatError> {
            self.raw.push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn listen_forwards_lines_until_peer_closes() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut transport = LineTransport::new(client, "duplex");
        server
            .write_all(b"Alice: hi\nBob: hey\n")
            .await
            .expect("server write");
        drop(server);

        let mut sink = Recorder::default();
        let mut session = ListenSession::new(&mut sink);
        session.run(&mut transport).await.expect("clean close");

        assert!(session.made_progress());
        assert_eq!(session.total_received(), 2);
        assert_eq!(sink.lines, vec!["Alice: hi", "Bob: hey"]);
    }

    #[tokio::test]
    async fn listen_without_lines_makes_no_progress() {
        let (client, server) = tokio::io::duplex(64);
        let mut transport = LineTransport::new(client, "duplex");
        drop(server);

        let mut sink = Recorder::default();
        let mut session = ListenSession::new(&mut sink);
        session.run(&mut transport).await.expect("clean close");
        assert!(!session.made_progress());
    }

    #[tokio::test]
    async fn send_writes_one_blank_line_terminated_message() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut transport = LineTransport::new(client, "duplex");

        let mut session = SendSession::new(OutboundMessage::new("hello\nworld"));
        session.run(&mut transport).await.expect("send");
        transport.close().await;

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.expect("read");
        assert_eq!(received, b"helloworld\n\n");
    }
}
