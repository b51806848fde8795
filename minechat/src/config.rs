//! Turns parsed command-line arguments into validated settings.
//!
//! Precedence (flag, then environment, then default) is handled by clap; this
//! module checks what clap cannot: blank values, and the token lookup for
//! `send`, which may fall back to the token file written by `register`.

use std::path::PathBuf;

use crate::{
    cli::{Cli, Command, ListenArgs, RegisterArgs, SendArgs},
    codec::{OutboundMessage, Token},
    error::ChatError,
    token_store::TokenStore,
    transport::Endpoint,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub debug: bool,
    pub mode: Mode,
}

#[derive(Debug, Clone)]
pub enum Mode {
    Listen(ListenConfig),
    Register(RegisterConfig),
    Send(SendConfig),
}

#[derive(Debug, Clone)]
pub struct ListenConfig {
    pub endpoint: Endpoint,
    pub history: PathBuf,
    pub console: bool,
}

#[derive(Debug, Clone)]
pub struct RegisterConfig {
    pub endpoint: Endpoint,
    pub nickname: String,
    pub token_store: TokenStore,
}

#[derive(Debug, Clone)]
pub struct SendConfig {
    pub endpoint: Endpoint,
    pub token: Token,
    pub message: OutboundMessage,
}

impl Config {
    pub async fn resolve(cli: Cli) -> Result<Self, ChatError> {
        let host = cli.host.trim();
        if host.is_empty() {
            return Err(ChatError::Config("host must not be empty".to_string()));
        }

        let mode = match cli.command {
            Command::Listen(args) => Mode::Listen(listen_config(host, args)),
            Command::Register(args) => Mode::Register(register_config(host, args)?),
            Command::Send(args) => Mode::Send(send_config(host, args).await?),
        };

        Ok(Self {
            debug: cli.debug,
            mode,
        })
    }
}

fn listen_config(host: &str, args: ListenArgs) -> ListenConfig {
    ListenConfig {
        endpoint: Endpoint::new(host, args.port),
        history: args.history,
        console: args.console,
    }
}

fn register_config(host: &str, args: RegisterArgs) -> Result<RegisterConfig, ChatError> {
    let nickname: String = args.nickname.replace(['\n', '\r'], "");
    if nickname.trim().is_empty() {
        return Err(ChatError::Config("nickname must not be empty".to_string()));
    }

    Ok(RegisterConfig {
        endpoint: Endpoint::new(host, args.port),
        nickname,
        token_store: TokenStore::new(args.token_path),
    })
}

async fn send_config(host: &str, args: SendArgs) -> Result<SendConfig, ChatError> {
    let message = OutboundMessage::new(&args.message);
    if message.is_empty() {
        return Err(ChatError::Config("message must not be empty".to_string()));
    }

    let token = match args.token {
        Some(hash) => hash,
        None => {
            let store = TokenStore::new(&args.token_path);
            let token = store.load().await?.ok_or_else(|| {
                ChatError::Config(format!(
                    "no token: pass --token, set SEND_HASH, or run `register` to create {}",
                    store.path().display()
                ))
            })?;
            token.as_str().to_string()
        }
    };

    // A blank token would be sent as the registration request.
    let token = token.trim();
    if token.is_empty() {
        return Err(ChatError::Config("token must not be blank".to_string()));
    }

    Ok(SendConfig {
        endpoint: Endpoint::new(host, args.port),
        token: Token::new(token),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::AuthResult;

    fn send_args(token: Option<&str>, token_path: PathBuf, message: &str) -> Cli {
        Cli {
            host: "localhost".into(),
            debug: false,
            command: Command::Send(SendArgs {
                message: message.into(),
                token: token.map(str::to_string),
                port: 5050,
                token_path,
            }),
        }
    }

    #[tokio::test]
    async fn send_prefers_explicit_token() {
        let config = Config::resolve(send_args(Some("abc"), "missing.json".into(), "hi"))
            .await
            .expect("valid config");

        match config.mode {
            Mode::Send(send) => {
                assert_eq!(send.token, Token::new("abc"));
                assert_eq!(send.endpoint, Endpoint::new("localhost", 5050));
            }
            other => panic!("unexpected mode: {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_falls_back_to_token_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("token.json");
        TokenStore::new(&path)
            .save(&AuthResult {
                nickname: "Zoe".into(),
                account_hash: "xyz".into(),
            })
            .await
            .expect("save");

        let config = Config::resolve(send_args(None, path, "hi"))
            .await
            .expect("valid config");

        match config.mode {
            Mode::Send(send) => assert_eq!(send.token, Token::new("xyz")),
            other => panic!("unexpected mode: {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_without_any_token_is_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Config::resolve(send_args(None, dir.path().join("token.json"), "hi"))
            .await
            .expect_err("no token");
        assert!(matches!(err, ChatError::Config(_)));
    }

    #[tokio::test]
    async fn blank_message_and_token_are_rejected() {
        let err = Config::resolve(send_args(Some("abc"), "t.json".into(), "\n"))
            .await
            .expect_err("blank message");
        assert!(matches!(err, ChatError::Config(_)));

        let err = Config::resolve(send_args(Some("  "), "t.json".into(), "hi"))
            .await
            .expect_err("blank token");
        assert!(matches!(err, ChatError::Config(_)));
    }

    #[tokio::test]
    async fn register_strips_newlines_from_nickname() {
        let cli = Cli {
            host: "localhost".into(),
            debug: false,
            command: Command::Register(RegisterArgs {
                nickname: "Zo\ne".into(),
                port: 5050,
                token_path: "token.json".into(),
            }),
        };

        match Config::resolve(cli).await.expect("valid config").mode {
            Mode::Register(register) => assert_eq!(register.nickname, "Zoe"),
            other => panic!("unexpected mode: {other:?}"),
        }
    }
}
