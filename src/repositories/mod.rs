// 持久化层：社区与账号按键读写
pub mod account;
pub mod community;
pub mod memory;

pub use account::AccountRepository;
pub use community::CommunityRepository;
pub use memory::MemoryStore;

use crate::{
    error::AppResult,
    models::{BotAccount, ProgressRecord, TrackedCommunity},
};
use chrono::{DateTime, Utc};

/// 被跟踪社区的存储接口，以 (host, name) 为键
#[async_trait::async_trait]
pub trait CommunityStore: Send + Sync {
    /// 读取全部社区，从未更新过的排最前，其余按更新时间升序
    async fn load_all(&self) -> AppResult<Vec<TrackedCommunity>>;

    async fn find(&self, host: &str, name: &str) -> AppResult<Option<TrackedCommunity>>;

    /// 按 (host, name) 插入或整体覆盖
    async fn upsert(&self, community: &TrackedCommunity) -> AppResult<()>;

    /// 覆盖进度列表并刷新更新时间，返回新的更新时间
    async fn replace_progress(
        &self,
        host: &str,
        name: &str,
        progress: &[ProgressRecord],
    ) -> AppResult<DateTime<Utc>>;

    /// 清空所有社区的进度
    async fn reset_all_progress(&self) -> AppResult<u64>;
}

/// 机器人账号的存储接口，以实例域名为键
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    /// 读取启用的账号，按配置顺序
    async fn load_active(&self) -> AppResult<Vec<BotAccount>>;

    async fn load_all(&self) -> AppResult<Vec<BotAccount>>;

    async fn find(&self, host: &str) -> AppResult<Option<BotAccount>>;

    async fn upsert(&self, account: &BotAccount) -> AppResult<()>;

    /// 整体替换账号列表
    async fn replace_all(&self, accounts: &[BotAccount]) -> AppResult<()>;
}

/// 对社区按同步优先级排序
pub(crate) fn sort_by_staleness(communities: &mut [TrackedCommunity]) {
    // None < Some，从未更新过的社区最先处理
    communities.sort_by(|a, b| {
        a.updated_at
            .cmp(&b.updated_at)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}
