//! A small in-process minechat server for integration tests.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::Result;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

pub const GREETING: &str = "Hello %username%! Enter your personal hash or leave it empty to create new account.";
pub const PROMPT: &str = "Enter preferred nickname below:";
pub const REGISTERED_HASH: &str = "xyz";

/// Shared view of what the server saw.
#[derive(Default)]
pub struct Observed {
    pub connections: AtomicUsize,
    pub messages: Mutex<Vec<String>>,
    pub nicknames: Mutex<Vec<String>>,
}

impl Observed {
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("messages lock").clone()
    }

    pub fn nicknames(&self) -> Vec<String> {
        self.nicknames.lock().expect("nicknames lock").clone()
    }

    /// Polls until `count` messages arrived; the server records them after the client is done.
    pub async fn wait_for_messages(&self, count: usize) -> Vec<String> {
        for _ in 0..200 {
            let messages = self.messages();
            if messages.len() >= count {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.messages()
    }
}

pub struct SubmitServer {
    pub addr: SocketAddr,
    pub observed: Arc<Observed>,
    task: JoinHandle<()>,
}

impl SubmitServer {
    /// Starts a submission server that knows `accounts` (hash → nickname).
    pub async fn start(accounts: &[(&str, &str)]) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let observed = Arc::new(Observed::default());
        let accounts: Arc<HashMap<String, String>> = Arc::new(
            accounts
                .iter()
                .map(|(hash, nickname)| (hash.to_string(), nickname.to_string()))
                .collect(),
        );

        let task_observed = Arc::clone(&observed);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                task_observed.connections.fetch_add(1, Ordering::SeqCst);
                let observed = Arc::clone(&task_observed);
                let accounts = Arc::clone(&accounts);
                tokio::spawn(async move {
                    let _ = serve_submission(stream, &accounts, &observed).await;
                });
            }
        });

        Ok(Self {
            addr,
            observed,
            task,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

impl Drop for SubmitServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_submission(
    stream: TcpStream,
    accounts: &HashMap<String, String>,
    observed: &Observed,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    write_line(&mut writer, GREETING).await?;
    let credential = read_line(&mut reader).await?.unwrap_or_default();

    let record = if credential.is_empty() {
        write_line(&mut writer, PROMPT).await?;
        let nickname = read_line(&mut reader).await?.unwrap_or_default();
        observed
            .nicknames
            .lock()
            .expect("nicknames lock")
            .push(nickname.clone());
        Some((nickname, REGISTERED_HASH.to_string()))
    } else {
        accounts
            .get(&credential)
            .map(|nickname| (nickname.clone(), credential.clone()))
    };

    let Some((nickname, hash)) = record else {
        write_line(&mut writer, "null").await?;
        return Ok(());
    };
    let reply = serde_json::json!({ "nickname": nickname, "account_hash": hash });
    write_line(&mut writer, &reply.to_string()).await?;

    while let Some(line) = read_line(&mut reader).await? {
        if !line.is_empty() {
            observed
                .messages
                .lock()
                .expect("messages lock")
                .push(line);
        }
    }
    Ok(())
}

/// Starts a broadcast server that sends `lines` to each client and hangs up.
pub async fn start_broadcast(lines: Vec<String>) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let task = tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            for line in &lines {
                if write_line(&mut stream, line).await.is_err() {
                    break;
                }
            }
            let _ = stream.shutdown().await;
        }
    });
    Ok((addr, task))
}

async fn write_line<W>(writer: &mut W, line: &str) -> std::io::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

async fn read_line<R>(reader: &mut R) -> std::io::Result<Option<String>>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}
