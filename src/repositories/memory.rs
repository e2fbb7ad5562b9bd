use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{BotAccount, ProgressRecord, TrackedCommunity},
};

use super::{AccountStore, CommunityStore, sort_by_staleness};

/// 内存存储，数据库不可用时使用，进程重启后数据丢失
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    communities: Arc<RwLock<Vec<TrackedCommunity>>>,
    accounts: Arc<RwLock<Vec<BotAccount>>>,
    progress_writes: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(communities: Vec<TrackedCommunity>, accounts: Vec<BotAccount>) -> Self {
        Self {
            communities: Arc::new(RwLock::new(communities)),
            accounts: Arc::new(RwLock::new(accounts)),
            progress_writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 进程启动以来的进度写入次数
    pub fn progress_writes(&self) -> usize {
        self.progress_writes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CommunityStore for MemoryStore {
    async fn load_all(&self) -> AppResult<Vec<TrackedCommunity>> {
        let mut communities = self.communities.read().await.clone();
        sort_by_staleness(&mut communities);
        Ok(communities)
    }

    async fn find(&self, host: &str, name: &str) -> AppResult<Option<TrackedCommunity>> {
        let communities = self.communities.read().await;
        Ok(communities
            .iter()
            .find(|c| c.host == host && c.name == name)
            .cloned())
    }

    async fn upsert(&self, community: &TrackedCommunity) -> AppResult<()> {
        let mut communities = self.communities.write().await;
        match communities
            .iter_mut()
            .find(|c| c.host == community.host && c.name == community.name)
        {
            Some(existing) => {
                let id = existing.id;
                *existing = community.clone();
                existing.id = id;
            }
            None => communities.push(community.clone()),
        }
        Ok(())
    }

    async fn replace_progress(
        &self,
        host: &str,
        name: &str,
        progress: &[ProgressRecord],
    ) -> AppResult<DateTime<Utc>> {
        let mut communities = self.communities.write().await;
        let community = communities
            .iter_mut()
            .find(|c| c.host == host && c.name == name)
            .ok_or_else(|| AppError::not_found(format!("社区 {}@{}", name, host)))?;

        let now = Utc::now();
        community.progress = progress.to_vec();
        community.updated_at = Some(now);
        self.progress_writes.fetch_add(1, Ordering::SeqCst);
        Ok(now)
    }

    async fn reset_all_progress(&self) -> AppResult<u64> {
        let mut communities = self.communities.write().await;
        for community in communities.iter_mut() {
            community.progress.clear();
        }
        Ok(communities.len() as u64)
    }
}

#[async_trait::async_trait]
impl AccountStore for MemoryStore {
    async fn load_active(&self) -> AppResult<Vec<BotAccount>> {
        let mut accounts: Vec<BotAccount> = self
            .accounts
            .read()
            .await
            .iter()
            .filter(|a| a.active)
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.position);
        Ok(accounts)
    }

    async fn load_all(&self) -> AppResult<Vec<BotAccount>> {
        let mut accounts = self.accounts.read().await.clone();
        accounts.sort_by_key(|a| a.position);
        Ok(accounts)
    }

    async fn find(&self, host: &str) -> AppResult<Option<BotAccount>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.iter().find(|a| a.host == host).cloned())
    }

    async fn upsert(&self, account: &BotAccount) -> AppResult<()> {
        let mut accounts = self.accounts.write().await;
        match accounts.iter_mut().find(|a| a.host == account.host) {
            Some(existing) => *existing = account.clone(),
            None => accounts.push(account.clone()),
        }
        Ok(())
    }

    async fn replace_all(&self, accounts: &[BotAccount]) -> AppResult<()> {
        *self.accounts.write().await = accounts.to_vec();
        Ok(())
    }
}
