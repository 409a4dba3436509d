use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use crate::errors::Result;
use crate::models::{Account, ChatTurn};
use crate::storage::{Snapshot, Store};

/// Non-persistent store with the same semantics as [`super::JsonFileStore`].
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.state.read().await.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_account(&self, identity: &str, credential_hash: &str) -> Result<Account> {
        self.state.write().await.create_account(identity, credential_hash)
    }

    async fn find_account(&self, identity: &str) -> Result<Option<Account>> {
        Ok(self.state.read().await.find_account(identity).cloned())
    }

    async fn set_entitlement(&self, identity: &str, premium: bool) -> Result<Account> {
        self.state.write().await.set_entitlement(identity, premium)
    }

    async fn daily_count(&self, identity: &str, day: NaiveDate) -> Result<u32> {
        Ok(self.state.read().await.daily_count(identity, day))
    }

    async fn increment_daily(
        &self,
        identity: &str,
        day: NaiveDate,
        limit: u32,
    ) -> Result<Option<u32>> {
        Ok(self.state.write().await.increment_daily(identity, day, limit))
    }

    async fn append_chat(&self, turn: ChatTurn) -> Result<()> {
        self.state.write().await.chats.push(turn);
        Ok(())
    }

    async fn list_chats(&self, identity: &str) -> Result<Vec<ChatTurn>> {
        Ok(self.state.read().await.list_chats(identity))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
