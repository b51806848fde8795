use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Chat server host name.
    #[arg(long, global = true, env = "CHAT_HOST", default_value = "minechat.dvmn.org")]
    pub host: String,

    /// Log protocol traffic at debug level.
    #[arg(long, global = true, env = "DEBUG_MODE", value_parser = BoolishValueParser::new())]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Follow the chat and append every line to the history file.
    Listen(ListenArgs),
    /// Create an account and save its token.
    Register(RegisterArgs),
    /// Submit one message using a saved or supplied token.
    Send(SendArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ListenArgs {
    /// Port of the broadcast service.
    #[arg(long, env = "LISTEN_PORT", default_value_t = 5000, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    /// History file that received lines are appended to.
    #[arg(long, env = "LISTEN_FILE", default_value = "history.txt")]
    pub history: PathBuf,

    /// Also print received lines to stdout.
    #[arg(long)]
    pub console: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RegisterArgs {
    /// Display name for the new account.
    #[arg(long)]
    pub nickname: String,

    /// Port of the submission service.
    #[arg(long, env = "SEND_PORT", default_value_t = 5050, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    /// Where the account record is written.
    #[arg(long, env = "TOKEN_PATH", default_value = "token.json")]
    pub token_path: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct SendArgs {
    /// Text to submit; line breaks are removed.
    #[arg(long)]
    pub message: String,

    /// Account hash; falls back to the token file when absent.
    #[arg(long, env = "SEND_HASH", hide_env_values = true)]
    pub token: Option<String>,

    /// Port of the submission service.
    #[arg(long, env = "SEND_PORT", default_value_t = 5050, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    /// Account record written by `register`.
    #[arg(long, env = "TOKEN_PATH", default_value = "token.json")]
    pub token_path: PathBuf,
}
