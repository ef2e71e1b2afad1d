//! On-disk persistence for chat history and theme
//!
//! One directory holds one JSON file for the message list and one plain
//! text file for the theme. Writes go through a temp file and a rename so a
//! crash never leaves a half-written history behind.

use crate::runtime::ConversationStore;
use crate::state_machine::{Message, Theme};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const HISTORY_FILE: &str = "aegis-chat-history.json";
pub const THEME_FILE: &str = "aegis-theme";
/// Where an unreadable history file is moved before it can be overwritten
pub const HISTORY_BACKUP_FILE: &str = "aegis-chat-history.json.bak";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Corrupt history in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// File-backed [`ConversationStore`]
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    fn theme_path(&self) -> PathBuf {
        self.dir.join(THEME_FILE)
    }

    /// Contents of `path`, `None` if it does not exist
    async fn read_optional(path: &Path) -> StorageResult<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    async fn back_up_history(&self, path: &Path) {
        let backup = self.dir.join(HISTORY_BACKUP_FILE);
        match tokio::fs::rename(path, &backup).await {
            Ok(()) => tracing::warn!(backup = %backup.display(), "Moved unreadable history aside"),
            Err(e) => tracing::error!(error = %e, "Failed to move unreadable history aside"),
        }
    }

    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> StorageResult<()> {
        let io_err = |source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        };
        tokio::fs::create_dir_all(&self.dir).await.map_err(io_err)?;

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, contents).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for FileStore {
    /// Entries that fail to parse are skipped. A file that is not a JSON
    /// array at all is moved to [`HISTORY_BACKUP_FILE`] and reported.
    async fn load_messages(&self) -> StorageResult<Vec<Message>> {
        let path = self.history_path();
        let Some(text) = Self::read_optional(&path).await? else {
            return Ok(Vec::new());
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let entries: Vec<serde_json::Value> = match serde_json::from_str(&text) {
            Ok(entries) => entries,
            Err(source) => {
                self.back_up_history(&path).await;
                return Err(StorageError::Json { path, source });
            }
        };

        let total = entries.len();
        let messages: Vec<Message> = entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value(entry) {
                Ok(message) => Some(message),
                Err(e) => {
                    tracing::warn!(index, error = %e, "Skipping unreadable history entry");
                    None
                }
            })
            .collect();
        if messages.len() < total {
            tracing::warn!(
                kept = messages.len(),
                skipped = total - messages.len(),
                "History loaded partially"
            );
        }
        Ok(messages)
    }

    async fn save_messages(&self, messages: &[Message]) -> StorageResult<()> {
        let path = self.history_path();
        let json = serde_json::to_vec(messages).map_err(|source| StorageError::Json {
            path: path.clone(),
            source,
        })?;
        self.write_atomic(&path, &json).await
    }

    async fn load_theme(&self) -> StorageResult<Option<Theme>> {
        let text = Self::read_optional(&self.theme_path()).await?;
        Ok(text.as_deref().map(str::trim).and_then(Theme::from_name))
    }

    async fn save_theme(&self, theme: Theme) -> StorageResult<()> {
        self.write_atomic(&self.theme_path(), theme.as_str().as_bytes())
            .await
    }
}
