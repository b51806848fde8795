//! Resilient client for the minechat line protocol.
//!
//! The client connects to a chat server, optionally authenticates or
//! registers, then either follows the chat into a history file or submits one
//! message. Network failures are retried with backoff; protocol and
//! authentication failures stop the client.
//!
//! - [`transport`] owns a TCP connection and frames `\n`-terminated lines.
//! - [`codec`] encodes credentials and messages and decodes account records
//!   and chat lines, without any I/O.
//! - [`handshake`] runs the token login and registration exchanges.
//! - [`session`] holds the listen and send behaviours that follow a handshake.
//! - [`supervisor`] wraps it all in the reconnect-with-backoff loop.
//! - [`history`] and [`token_store`] persist chat lines and account records.
//! - [`cli`] and [`config`] turn flags and environment variables into settings.

pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod handshake;
pub mod history;
pub mod session;
pub mod supervisor;
pub mod token_store;
pub mod transport;
