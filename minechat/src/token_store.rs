use std::{
    io,
    path::{Path, PathBuf},
};

use tracing::info;

use crate::{
    codec::{AuthResult, Token},
    error::ChatError,
};

/// Persists the account record as a small JSON file.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the saved record. A missing file is `Ok(None)`; a corrupt one is a config error.
    pub async fn load_record(&self) -> Result<Option<AuthResult>, ChatError> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ChatError::Storage {
                    path: self.path.display().to_string(),
                    source,
                });
            }
        };

        let record: AuthResult = serde_json::from_slice(&contents).map_err(|err| {
            ChatError::Config(format!(
                "token file {} is not an account record: {err}",
                self.path.display()
            ))
        })?;
        Ok(Some(record))
    }

    pub async fn load(&self) -> Result<Option<Token>, ChatError> {
        Ok(self.load_record().await?.map(|record| record.token()))
    }

    pub async fn save(&self, record: &AuthResult) -> Result<(), ChatError> {
        let encoded = serde_json::to_vec(record).map_err(|err| ChatError::Storage {
            path: self.path.display().to_string(),
            source: io::Error::new(io::ErrorKind::InvalidData, err),
        })?;

        // Staged beside the target, then renamed over it: readers see the old record or the new one.
        let staging = self.staging_path();
        tokio::fs::write(&staging, encoded)
            .await
            .map_err(|source| ChatError::Storage {
                path: staging.display().to_string(),
                source,
            })?;
        if let Err(source) = tokio::fs::rename(&staging, &self.path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(ChatError::Storage {
                path: self.path.display().to_string(),
                source,
            });
        }

        info!(path = %self.path.display(), nickname = %record.nickname, "saved account token");
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "token.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
