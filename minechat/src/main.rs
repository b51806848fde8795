use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use minechat::{
    cli::Cli,
    codec::Credential,
    config::{Config, ListenConfig, Mode, RegisterConfig, SendConfig},
    history::HistoryFile,
    session::{HandshakeOnly, ListenSession, SendSession},
    supervisor::{Outcome, Supervisor},
    transport::TcpConnector,
};

fn init_tracing(debug: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Variables already in the environment win over `.env`, and flags win over both.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::resolve(cli).await?;
    init_tracing(config.debug);
    match config.mode {
        Mode::Listen(listen) => run_listen(listen).await,
        Mode::Register(register) => run_register(register).await,
        Mode::Send(send) => run_send(send).await,
    }
}

async fn run_listen(config: ListenConfig) -> Result<()> {
    let mut history = HistoryFile::open(&config.history, config.console).await?;
    let mut supervisor = Supervisor::new(TcpConnector, config.endpoint.clone());
    let mut session = ListenSession::new(&mut history);

    let outcome = supervisor
        .run_until_ctrl_c(None, &mut session)
        .await
        .with_context(|| format!("listening to {} failed", config.endpoint))?;

    if let Outcome::Completed(_) = outcome {
        info!(lines = session.total_received(), "chat stream ended");
    }
    Ok(())
}

async fn run_register(config: RegisterConfig) -> Result<()> {
    let credential = Credential::NicknameRequest(config.nickname.clone());
    let mut supervisor = Supervisor::new(TcpConnector, config.endpoint.clone());

    let outcome = supervisor
        .run_until_ctrl_c(Some(&credential), &mut HandshakeOnly)
        .await
        .with_context(|| format!("registration at {} failed", config.endpoint))?;

    let Outcome::Completed(completion) = outcome else {
        return Ok(());
    };
    let record = completion
        .auth
        .context("registration finished without an account record")?;
    config.token_store.save(&record).await?;
    info!(nickname = %record.nickname, "registered");
    Ok(())
}

async fn run_send(config: SendConfig) -> Result<()> {
    let credential = Credential::Token(config.token.clone());
    let mut supervisor = Supervisor::new(TcpConnector, config.endpoint.clone());
    let mut session = SendSession::new(config.message.clone());

    let outcome = supervisor
        .run_until_ctrl_c(Some(&credential), &mut session)
        .await
        .with_context(|| format!("sending to {} failed", config.endpoint))?;

    if let Outcome::Completed(completion) = outcome {
        let nickname = completion.auth.map(|auth| auth.nickname).unwrap_or_default();
        info!(%nickname, "message sent");
    }
    Ok(())
}
