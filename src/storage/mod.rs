use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::errors::{AppError, Result};
use crate::models::{Account, ChatTurn, DailyQuotaEntry};

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

/// Persistence for accounts, daily quota entries and chat history. Every
/// method is atomic: concurrent callers never observe a partial write, and a
/// failed call leaves stored state unchanged.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_account(&self, identity: &str, credential_hash: &str) -> Result<Account>;

    async fn find_account(&self, identity: &str) -> Result<Option<Account>>;

    async fn set_entitlement(&self, identity: &str, premium: bool) -> Result<Account>;

    async fn daily_count(&self, identity: &str, day: NaiveDate) -> Result<u32>;

    /// Compare-and-increment. Returns the new count, or `None` without
    /// mutating anything when the count is already at `limit`.
    async fn increment_daily(
        &self,
        identity: &str,
        day: NaiveDate,
        limit: u32,
    ) -> Result<Option<u32>>;

    async fn append_chat(&self, turn: ChatTurn) -> Result<()>;

    async fn list_chats(&self, identity: &str) -> Result<Vec<ChatTurn>>;

    async fn ping(&self) -> Result<()>;
}

pub async fn create_store(config: &Config) -> Result<Arc<dyn Store>> {
    let store = JsonFileStore::open(&config.db_path).await?;
    Ok(Arc::new(store))
}

/// Whole-database document, shaped like the on-disk JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub users: Vec<Account>,
    #[serde(default)]
    pub chats: Vec<ChatTurn>,
    #[serde(default)]
    pub daily_counts: Vec<DailyQuotaEntry>,
}

impl Snapshot {
    pub fn find_account(&self, identity: &str) -> Option<&Account> {
        self.users.iter().find(|u| u.identity == identity)
    }

    pub fn create_account(&mut self, identity: &str, credential_hash: &str) -> Result<Account> {
        if self.find_account(identity).is_some() {
            return Err(AppError::DuplicateIdentity(identity.to_string()));
        }

        let account = Account::new(identity, credential_hash);
        self.users.push(account.clone());
        Ok(account)
    }

    pub fn set_entitlement(&mut self, identity: &str, premium: bool) -> Result<Account> {
        let account = self
            .users
            .iter_mut()
            .find(|u| u.identity == identity)
            .ok_or_else(|| AppError::NotFound(identity.to_string()))?;

        account.premium = premium;
        Ok(account.clone())
    }

    pub fn daily_count(&self, identity: &str, day: NaiveDate) -> u32 {
        self.daily_counts
            .iter()
            .find(|d| d.email == identity && d.date == day)
            .map(|d| d.count)
            .unwrap_or(0)
    }

    pub fn increment_daily(&mut self, identity: &str, day: NaiveDate, limit: u32) -> Option<u32> {
        if self.daily_count(identity, day) >= limit {
            return None;
        }

        match self
            .daily_counts
            .iter_mut()
            .find(|d| d.email == identity && d.date == day)
        {
            Some(entry) => {
                entry.count += 1;
                Some(entry.count)
            }
            None => {
                self.daily_counts.push(DailyQuotaEntry {
                    email: identity.to_string(),
                    date: day,
                    count: 1,
                });
                Some(1)
            }
        }
    }

    pub fn list_chats(&self, identity: &str) -> Vec<ChatTurn> {
        let mut chats: Vec<ChatTurn> = self
            .chats
            .iter()
            .filter(|c| c.email == identity)
            .cloned()
            .collect();
        chats.sort_by_key(|c| c.timestamp);
        chats
    }
}
