use std::{future::Future, io, path::PathBuf};

use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
};
use tracing::debug;

use crate::{codec::ChatLine, error::ChatError};

const DATE_FORMAT: &str = "%d.%m.%y %H:%M";

/// Append-only destination for received chat.
///
/// Each call writes one whole line or fails; callers never observe half a line.
pub trait Sink {
    fn append(&mut self, line: &ChatLine) -> impl Future<Output = Result<(), ChatError>>;

    fn append_raw(&mut self, text: &str) -> impl Future<Output = Result<(), ChatError>>;
}

/// Renders a chat line the way the history file stores it.
pub fn format_chat_line(line: &ChatLine) -> String {
    format!("[{}] {}", line.timestamp.format(DATE_FORMAT), line.raw_text)
}

/// The durable chat log, optionally mirrored to stdout.
pub struct HistoryFile {
    path: PathBuf,
    file: File,
    console: bool,
}

impl HistoryFile {
    pub async fn open(path: impl Into<PathBuf>, console: bool) -> Result<Self, ChatError> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| storage_error(&path, source))?;

        Ok(Self {
            path,
            file,
            console,
        })
    }

    async fn write_entry(&mut self, entry: &str) -> Result<(), ChatError> {
        debug!(entry, "listener");

        let mut encoded = Vec::with_capacity(entry.len() + 1);
        encoded.extend_from_slice(entry.as_bytes());
        encoded.push(b'\n');

        self.file
            .write_all(&encoded)
            .await
            .map_err(|source| storage_error(&self.path, source))?;
        self.file
            .flush()
            .await
            .map_err(|source| storage_error(&self.path, source))?;

        if self.console {
            write_stdout(&encoded)
                .await
                .map_err(|source| storage_error(&PathBuf::from("<stdout>"), source))?;
        }
        Ok(())
    }
}

impl Sink for HistoryFile {
    async fn append(&mut self, line: &ChatLine) -> Result<(), ChatError> {
        self.write_entry(&format_chat_line(line)).await
    }

    async fn append_raw(&mut self, text: &str) -> Result<(), ChatError> {
        self.write_entry(text).await
    }
}

async fn write_stdout(bytes: &[u8]) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(bytes).await?;
    stdout.flush().await
}

fn storage_error(path: &std::path::Path, source: io::Error) -> ChatError {
    ChatError::Storage {
        path: path.display().to_string(),
        source,
    }
}
