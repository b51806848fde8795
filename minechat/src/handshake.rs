//! Login and registration exchanges that precede any chat traffic.
//!
//! Token login:
//!
//! ```text
//! server: <greeting>
//! client: <account_hash>
//! server: {"nickname": "...", "account_hash": "..."} | null
//! ```
//!
//! Registration sends a blank credential line instead, answers the
//! registration prompt with a nickname, and receives the new account record.
//! Each step blocks for exactly one line; a dead socket surfaces as
//! [`ChatError::ConnectionLost`] from the transport.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::{
    codec::{
        AuthResult, Credential, Token, decode_account_record, display_line, encode_credential,
        encode_nickname,
    },
    error::ChatError,
    transport::LineTransport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Start,
    GreetingReceived,
    CredentialSent,
    RegistrationPending,
    NicknameSent,
    Authenticated,
    Rejected,
}

/// Drives one handshake over a borrowed transport.
pub struct Handshake<'a, S> {
    transport: &'a mut LineTransport<S>,
    state: HandshakeState,
}

impl<'a, S> Handshake<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(transport: &'a mut LineTransport<S>) -> Self {
        Self {
            transport,
            state: HandshakeState::Start,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Runs whichever flow the credential calls for.
    pub async fn perform(&mut self, credential: &Credential) -> Result<AuthResult, ChatError> {
        match credential {
            Credential::Token(token) => self.authenticate_with_token(token).await,
            Credential::NicknameRequest(nickname) => self.register_new_account(nickname).await,
        }
    }

    /// Logs in with an existing token. A `null` reply is [`ChatError::AuthRejected`].
    pub async fn authenticate_with_token(&mut self, token: &Token) -> Result<AuthResult, ChatError> {
        let result = self.token_flow(token).await;
        self.settle(result)
    }

    /// Creates an account; the server must answer with a record, never `null`.
    pub async fn register_new_account(&mut self, nickname: &str) -> Result<AuthResult, ChatError> {
        let result = self.registration_flow(nickname).await;
        self.settle(result)
    }

    async fn token_flow(&mut self, token: &Token) -> Result<AuthResult, ChatError> {
        self.receive_greeting().await?;

        self.transport
            .write_line(&encode_credential(&Credential::Token(token.clone())))
            .await?;
        self.advance(HandshakeState::CredentialSent);
        debug!(peer = %self.transport.peer(), "submitted account token");

        match self.receive_account_record().await? {
            Some(record) => Ok(record),
            None => Err(ChatError::AuthRejected),
        }
    }

    async fn registration_flow(&mut self, nickname: &str) -> Result<AuthResult, ChatError> {
        self.receive_greeting().await?;

        self.transport
            .write_line(&encode_credential(&Credential::NicknameRequest(
                nickname.to_string(),
            )))
            .await?;
        self.advance(HandshakeState::CredentialSent);
        debug!(peer = %self.transport.peer(), "requested a new account");

        let prompt = self.next_line("registration prompt").await?;
        self.advance(HandshakeState::RegistrationPending);
        debug!(prompt = %display_line(&prompt), "registration prompt");

        let encoded = encode_nickname(nickname);
        self.transport.write_line(&encoded).await?;
        self.advance(HandshakeState::NicknameSent);
        debug!(nickname = %display_line(&encoded), "submitted nickname");

        self.receive_account_record().await?.ok_or_else(|| {
            ChatError::Protocol("server answered a registration with null".to_string())
        })
    }

    async fn receive_greeting(&mut self) -> Result<(), ChatError> {
        let greeting = self.next_line("greeting").await?;
        self.advance(HandshakeState::GreetingReceived);
        debug!(greeting = %display_line(&greeting), "server greeting");
        Ok(())
    }

    async fn receive_account_record(&mut self) -> Result<Option<AuthResult>, ChatError> {
        let line = self.next_line("account record").await?;
        debug!(record = %display_line(&line), "account record");
        decode_account_record(&line)
    }

    async fn next_line(&mut self, stage: &str) -> Result<Vec<u8>, ChatError> {
        self.transport
            .read_line()
            .await?
            .ok_or_else(|| ChatError::closed_during(stage))
    }

    fn settle(&mut self, result: Result<AuthResult, ChatError>) -> Result<AuthResult, ChatError> {
        match &result {
            Ok(record) => {
                self.advance(HandshakeState::Authenticated);
                debug!(nickname = %record.nickname, "handshake complete");
            }
            Err(err) if !err.is_retryable() => self.advance(HandshakeState::Rejected),
            Err(_) => {}
        }
        result
    }

    fn advance(&mut self, next: HandshakeState) {
        debug!(from = ?self.state, to = ?next, "handshake state");
        self.state = next;
    }
}
