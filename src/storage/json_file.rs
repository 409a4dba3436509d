use async_trait::async_trait;
use chrono::NaiveDate;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::{fs, sync::Mutex};

use crate::{
    errors::{AppError, Result},
    models::{Account, ChatTurn},
    storage::{Snapshot, Store},
};

/// Flat JSON file database. Mutations are staged on a copy of the snapshot,
/// written to a temp file and renamed over the target, and only published in
/// memory once the rename succeeded.
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<Snapshot>,
}

impl JsonFileStore {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let snapshot = match fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Snapshot::default(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                AppError::Storage(format!("Corrupt database file {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No database at {}, starting empty", path.display());
                Snapshot::default()
            }
            Err(e) => {
                return Err(AppError::Storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        tracing::info!(
            users = snapshot.users.len(),
            chats = snapshot.chats.len(),
            "Loaded database from {}",
            path.display()
        );

        Ok(Self {
            path,
            state: Mutex::new(snapshot),
        })
    }

    async fn mutate<T, F>(&self, apply: F) -> Result<T>
    where
        F: FnOnce(&mut Snapshot) -> Result<T>,
    {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let output = apply(&mut next)?;
        self.persist(&next).await?;
        *state = next;
        Ok(output)
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| AppError::Storage(format!("Failed to serialize database: {}", e)))?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
            .await
            .map_err(|e| AppError::Storage(format!("Database writer panicked: {}", e)))?
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| AppError::Storage(format!("Failed to create directory: {}", e)))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)
        .map_err(|e| AppError::Storage(format!("Failed to create temp file: {}", e)))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| AppError::Storage(format!("Failed to write database: {}", e)))?;
    tmp.persist(path)
        .map_err(|e| AppError::Storage(format!("Failed to replace database: {}", e.error)))?;

    Ok(())
}

#[async_trait]
impl Store for JsonFileStore {
    async fn create_account(&self, identity: &str, credential_hash: &str) -> Result<Account> {
        self.mutate(|s| s.create_account(identity, credential_hash)).await
    }

    async fn find_account(&self, identity: &str) -> Result<Option<Account>> {
        Ok(self.state.lock().await.find_account(identity).cloned())
    }

    async fn set_entitlement(&self, identity: &str, premium: bool) -> Result<Account> {
        {
            let state = self.state.lock().await;
            if let Some(account) = state.find_account(identity) {
                if account.premium == premium {
                    return Ok(account.clone());
                }
            }
        }
        self.mutate(|s| s.set_entitlement(identity, premium)).await
    }

    async fn daily_count(&self, identity: &str, day: NaiveDate) -> Result<u32> {
        Ok(self.state.lock().await.daily_count(identity, day))
    }

    async fn increment_daily(
        &self,
        identity: &str,
        day: NaiveDate,
        limit: u32,
    ) -> Result<Option<u32>> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();

        match next.increment_daily(identity, day, limit) {
            Some(count) => {
                self.persist(&next).await?;
                *state = next;
                Ok(Some(count))
            }
            None => Ok(None),
        }
    }

    async fn append_chat(&self, turn: ChatTurn) -> Result<()> {
        self.mutate(|s| {
            s.chats.push(turn);
            Ok(())
        })
        .await
    }

    async fn list_chats(&self, identity: &str) -> Result<Vec<ChatTurn>> {
        Ok(self.state.lock().await.list_chats(identity))
    }

    async fn ping(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let metadata = fs::metadata(&dir).await?;
        if metadata.permissions().readonly() {
            return Err(AppError::Storage(format!("{} is read-only", dir.display())));
        }
        Ok(())
    }
}
