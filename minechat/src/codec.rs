//! Encoding and decoding for the minechat line protocol.
//!
//! Every unit on the wire is UTF-8 text terminated by `\n`. The functions here
//! are pure: they turn values into bytes ready for [`crate::transport`] and
//! bytes received from it back into values, without touching any socket.

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

const LINE_ENDINGS: &[char] = &['\n', '\r'];

/// Opaque account hash issued by the server at registration.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens are credentials; keep them out of logs.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

/// What the client presents during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Log in with an existing account.
    Token(Token),
    /// Create a new account with this display name.
    NicknameRequest(String),
}

/// Account record returned by the server after a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    pub nickname: String,
    pub account_hash: String,
}

impl AuthResult {
    pub fn token(&self) -> Token {
        Token::new(self.account_hash.clone())
    }
}

/// One broadcast line received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub timestamp: DateTime<Local>,
    pub raw_text: String,
}

impl ChatLine {
    pub fn now(raw_text: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            raw_text: raw_text.into(),
        }
    }
}

/// A message ready to be submitted; never contains a line break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    text: String,
}

impl OutboundMessage {
    pub fn new(text: &str) -> Self {
        Self {
            text: strip_line_breaks(text),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A token is sent as `<hash>\n`; a bare `\n` asks the server to register a new account.
pub fn encode_credential(credential: &Credential) -> Vec<u8> {
    match credential {
        Credential::Token(token) => frame(&strip_line_breaks(token.as_str()), 1),
        Credential::NicknameRequest(_) => b"\n".to_vec(),
    }
}

pub fn encode_nickname(nickname: &str) -> Vec<u8> {
    frame(&strip_line_breaks(nickname), 1)
}

/// Messages end with an empty line, so the text itself is followed by two newlines.
pub fn encode_message(text: &str) -> Vec<u8> {
    frame(&strip_line_breaks(text), 2)
}

/// Parses the account record line.
///
/// `Ok(None)` is the server's literal `null`: the token is unknown. Anything
/// that is neither `null` nor a record with `nickname` and `account_hash` is a
/// [`ChatError::Protocol`]. Unknown extra fields are ignored.
pub fn decode_account_record(line: &[u8]) -> Result<Option<AuthResult>, ChatError> {
    let text = std::str::from_utf8(line)
        .map_err(|err| ChatError::Protocol(format!("account record is not UTF-8: {err}")))?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ChatError::Protocol("empty account record".to_string()));
    }

    serde_json::from_str::<Option<AuthResult>>(trimmed)
        .map_err(|err| ChatError::Protocol(format!("malformed account record {trimmed:?}: {err}")))
}

/// Strips the trailing delimiter and stamps the line with the local time.
pub fn decode_chat_line(line: &[u8]) -> ChatLine {
    let text = String::from_utf8_lossy(line);
    ChatLine::now(text.trim_end_matches(LINE_ENDINGS))
}

/// Renders a received protocol line for debug logging.
pub fn display_line(line: &[u8]) -> String {
    String::from_utf8_lossy(line)
        .trim_end_matches(LINE_ENDINGS)
        .to_string()
}

fn strip_line_breaks(text: &str) -> String {
    text.chars().filter(|c| !LINE_ENDINGS.contains(c)).collect()
}

fn frame(text: &str, newlines: usize) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(text.len() + newlines);
    encoded.extend_from_slice(text.as_bytes());
    encoded.resize(text.len() + newlines, b'\n');
    encoded
}
