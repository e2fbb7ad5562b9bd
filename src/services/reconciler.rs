use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    error::AppResult,
    models::{
        BotAccount, CommunityView, FederationRelation, ProgressStatus, SubscribedType,
        TrackedCommunity,
    },
    repositories::{AccountStore, CommunityStore},
};

use super::{ClientCache, ClientProvider, FederationStatusCache, resolve_community};

/// 针对单个 (社区, 账号) 的订阅决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowDecision {
    /// 已有其他本地订阅者，内容已在实例上缓存，退订
    Propagated,
    /// 尚未订阅，发起订阅
    Subscribe,
    /// 订阅仍待对方接受，退订后下一轮重试
    Withdraw,
    /// 已订阅但没有其他本地订阅者，继续等待
    Wait,
}

impl FollowDecision {
    /// 需要发出的订阅请求，`None` 表示不调用
    pub fn follow_call(&self) -> Option<bool> {
        match self {
            FollowDecision::Subscribe => Some(true),
            FollowDecision::Propagated | FollowDecision::Withdraw => Some(false),
            FollowDecision::Wait => None,
        }
    }

    pub fn status(&self) -> ProgressStatus {
        match self {
            FollowDecision::Propagated => ProgressStatus::Done,
            FollowDecision::Subscribe | FollowDecision::Wait => ProgressStatus::Pending,
            FollowDecision::Withdraw => ProgressStatus::Error,
        }
    }
}

/// 根据社区当前视图做出决策
pub fn decide(view: &CommunityView) -> FollowDecision {
    if view.has_other_local_subscribers() {
        return FollowDecision::Propagated;
    }
    match view.subscribed {
        SubscribedType::NotSubscribed => FollowDecision::Subscribe,
        SubscribedType::Pending => FollowDecision::Withdraw,
        SubscribedType::Subscribed => FollowDecision::Wait,
    }
}

/// 单轮同步的统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassSummary {
    pub communities: usize,
    /// 实际评估的组合数
    pub evaluated: usize,
    /// 已完成而跳过的组合数
    pub skipped: usize,
    pub failed: usize,
    /// 写回进度的社区数
    pub persisted: usize,
}

/// 订阅同步器
///
/// 遍历所有被跟踪社区与启用账号的组合，决定订阅、退订或等待，并写回进度。
/// 同一时刻只允许一轮同步运行。
pub struct FollowReconciler {
    communities: Arc<dyn CommunityStore>,
    accounts: Arc<dyn AccountStore>,
    clients: Arc<dyn ClientProvider>,
    federation_status: Arc<FederationStatusCache>,
    pass_lock: Mutex<()>,
}

impl FollowReconciler {
    pub fn new(
        communities: Arc<dyn CommunityStore>,
        accounts: Arc<dyn AccountStore>,
        clients: Arc<dyn ClientProvider>,
        federation_status: Arc<FederationStatusCache>,
    ) -> Self {
        Self {
            communities,
            accounts,
            clients,
            federation_status,
            pass_lock: Mutex::new(()),
        }
    }

    /// 完整同步一轮，存储层错误直接返回
    pub async fn run_pass(&self) -> AppResult<PassSummary> {
        let _guard = self.pass_lock.lock().await;
        let started = Instant::now();

        let communities = self.communities.load_all().await?;
        let accounts = self.accounts.load_active().await?;
        info!(
            communities = communities.len(),
            accounts = accounts.len(),
            "开始同步"
        );

        let mut clients = ClientCache::new(self.clients.as_ref());
        let mut summary = PassSummary::default();
        for mut community in communities {
            self.reconcile_community(&mut community, &accounts, &mut clients, &mut summary)
                .await?;
        }

        info!(
            evaluated = summary.evaluated,
            skipped = summary.skipped,
            failed = summary.failed,
            persisted = summary.persisted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "同步完成"
        );
        Ok(summary)
    }

    /// 登记社区并立即为其执行一次同步
    ///
    /// 重置进度与同步在同一把锁内完成，进行中的定时同步不会用旧进度覆盖重置结果。
    /// 返回存储中的社区记录，以及是否为重新登记。
    pub async fn register(&self, host: &str, name: &str) -> AppResult<(TrackedCommunity, bool)> {
        let _guard = self.pass_lock.lock().await;

        let now = Utc::now();
        let (mut community, updated) = match self.communities.find(host, name).await? {
            Some(mut existing) => {
                existing.created_at = now;
                existing.updated_at = Some(now);
                existing.progress.clear();
                (existing, true)
            }
            None => (TrackedCommunity::new(host, name), false),
        };
        self.communities.upsert(&community).await?;
        let qualified = community.qualified_name();
        info!(community = %qualified, updated, "社区已登记");

        // 首次订阅失败不影响登记结果，下一轮定时同步会重试
        let first_pass = async {
            let accounts = self.accounts.load_active().await?;
            let mut clients = ClientCache::new(self.clients.as_ref());
            let mut summary = PassSummary::default();
            self.reconcile_community(&mut community, &accounts, &mut clients, &mut summary)
                .await
        };
        if let Err(e) = first_pass.await {
            warn!(community = %qualified, error = %e, "首次同步失败");
        }

        let stored = self.communities.find(host, name).await?;
        Ok((stored.unwrap_or(community), updated))
    }

    async fn reconcile_community(
        &self,
        community: &mut TrackedCommunity,
        accounts: &[BotAccount],
        clients: &mut ClientCache<'_>,
        summary: &mut PassSummary,
    ) -> AppResult<()> {
        summary.communities += 1;
        let qualified = community.qualified_name();
        let mut changed = false;

        for account in accounts {
            if community.is_done_for(&account.host) {
                summary.skipped += 1;
                continue;
            }
            summary.evaluated += 1;

            let status = match self.reconcile_pair(community, account, clients).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(
                        community = %qualified,
                        host = %account.host,
                        error = %e,
                        "同步失败"
                    );
                    summary.failed += 1;
                    ProgressStatus::Error
                }
            };

            changed |= community.set_status(&account.host, status);
        }

        if changed {
            let updated_at = self
                .communities
                .replace_progress(&community.host, &community.name, &community.progress)
                .await?;
            community.updated_at = Some(updated_at);
            summary.persisted += 1;
        } else {
            debug!(community = %qualified, "进度无变化");
        }

        Ok(())
    }

    async fn reconcile_pair(
        &self,
        community: &TrackedCommunity,
        account: &BotAccount,
        clients: &mut ClientCache<'_>,
    ) -> AppResult<ProgressStatus> {
        let qualified = community.qualified_name();
        let client = clients.get(account).await?;

        let relation = self
            .federation_status
            .relation(client.as_ref(), &community.host)
            .await?;
        if relation == FederationRelation::Blocked {
            info!(community = %qualified, host = %account.host, "实例之间已屏蔽，跳过");
            return Ok(ProgressStatus::Done);
        }

        let view = resolve_community(client.as_ref(), &qualified).await?;
        let decision = decide(&view);

        if let Some(follow) = decision.follow_call() {
            client.follow_community(view.id, follow).await?;
        }

        let status = decision.status();
        info!(
            community = %qualified,
            host = %account.host,
            subscribers = view.local_subscribers,
            ?decision,
            %status,
            "同步组合"
        );
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{ProgressRecord, ProtocolVersion},
        repositories::MemoryStore,
        services::{
            FederationClient,
            test_support::{FakeClient, FakeProvider, account, view},
        },
    };
    use std::time::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        provider: Arc<FakeProvider>,
        reconciler: FollowReconciler,
    }

    fn fixture(communities: Vec<TrackedCommunity>, clients: Vec<Arc<FakeClient>>) -> Fixture {
        let accounts = clients
            .iter()
            .enumerate()
            .map(|(i, c)| account(c.host(), i as i32))
            .collect();
        let store = Arc::new(MemoryStore::with_data(communities, accounts));
        let provider = Arc::new(
            clients
                .into_iter()
                .fold(FakeProvider::new(), |p, c| p.with_client(c)),
        );
        let reconciler = FollowReconciler::new(
            store.clone(),
            store.clone(),
            provider.clone(),
            Arc::new(FederationStatusCache::new(Duration::from_secs(3600))),
        );
        Fixture {
            store,
            provider,
            reconciler,
        }
    }

    async fn status(store: &MemoryStore, account_host: &str) -> Option<ProgressStatus> {
        CommunityStore::find(store, "lemmy.ml", "rust")
            .await
            .unwrap()
            .and_then(|c| c.status_for(account_host))
    }

    #[test]
    fn test_decide() {
        let cases = [
            (SubscribedType::NotSubscribed, 0, FollowDecision::Subscribe),
            (SubscribedType::NotSubscribed, 1, FollowDecision::Propagated),
            (SubscribedType::Subscribed, 1, FollowDecision::Wait),
            (SubscribedType::Subscribed, 2, FollowDecision::Propagated),
            (SubscribedType::Pending, 1, FollowDecision::Withdraw),
            (SubscribedType::Pending, 3, FollowDecision::Propagated),
        ];
        for (subscribed, count, expected) in cases {
            assert_eq!(decide(&view(1, subscribed, count)), expected);
        }
    }

    #[tokio::test]
    async fn test_subscribe_then_unfollow_once_propagated() {
        let client = Arc::new(
            FakeClient::new("lemmy.world")
                .with_community(view(9, SubscribedType::NotSubscribed, 0)),
        );
        let f = fixture(vec![TrackedCommunity::new("lemmy.ml", "rust")], vec![client.clone()]);

        // 首轮：未订阅且无本地订阅者，发起订阅
        let summary = f.reconciler.run_pass().await.unwrap();
        assert_eq!(summary.persisted, 1);
        assert_eq!(client.calls().follows, 1);
        assert_eq!(status(&f.store, "lemmy.world").await, Some(ProgressStatus::Pending));

        // 第二轮：有真实用户订阅，退订并完成
        client.set_local_subscribers(2);
        f.reconciler.run_pass().await.unwrap();
        assert_eq!(client.calls().unfollows, 1);
        assert_eq!(status(&f.store, "lemmy.world").await, Some(ProgressStatus::Done));
        assert_eq!(f.store.progress_writes(), 2);
    }

    #[tokio::test]
    async fn test_blocked_pair_is_done_without_follow() {
        let client = Arc::new(
            FakeClient::new("lemmy.world")
                .with_community(view(9, SubscribedType::NotSubscribed, 0))
                .with_blocked("lemmy.ml"),
        );
        let f = fixture(vec![TrackedCommunity::new("lemmy.ml", "rust")], vec![client.clone()]);

        f.reconciler.run_pass().await.unwrap();

        assert_eq!(status(&f.store, "lemmy.world").await, Some(ProgressStatus::Done));
        assert_eq!(client.calls().follows + client.calls().unfollows, 0);
    }

    #[tokio::test]
    async fn test_done_pairs_are_never_revisited() {
        let mut community = TrackedCommunity::new("lemmy.ml", "rust");
        community.progress = vec![ProgressRecord {
            host: "lemmy.world".to_string(),
            status: ProgressStatus::Done,
        }];
        let client = Arc::new(FakeClient::new("lemmy.world"));
        let f = fixture(vec![community], vec![client.clone()]);

        let summary = f.reconciler.run_pass().await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.evaluated, 0);
        assert_eq!(client.calls().total(), 0);
        assert_eq!(f.provider.constructions(), 0);
        assert_eq!(f.store.progress_writes(), 0);
    }

    #[tokio::test]
    async fn test_unchanged_pending_is_not_written() {
        let client = Arc::new(
            FakeClient::new("lemmy.world")
                .with_community(view(9, SubscribedType::NotSubscribed, 0)),
        );
        let f = fixture(vec![TrackedCommunity::new("lemmy.ml", "rust")], vec![client.clone()]);

        f.reconciler.run_pass().await.unwrap();
        // 已订阅，只有机器人自己，继续等待
        let summary = f.reconciler.run_pass().await.unwrap();

        assert_eq!(summary.persisted, 0);
        assert_eq!(f.store.progress_writes(), 1);
        assert_eq!(client.calls().follows, 1);
        assert_eq!(status(&f.store, "lemmy.world").await, Some(ProgressStatus::Pending));
    }

    #[tokio::test]
    async fn test_pending_acceptance_is_withdrawn() {
        let client = Arc::new(
            FakeClient::new("lemmy.world").with_community(view(9, SubscribedType::Pending, 1)),
        );
        let f = fixture(vec![TrackedCommunity::new("lemmy.ml", "rust")], vec![client.clone()]);

        f.reconciler.run_pass().await.unwrap();

        assert_eq!(client.calls().unfollows, 1);
        assert_eq!(status(&f.store, "lemmy.world").await, Some(ProgressStatus::Error));
    }

    #[tokio::test]
    async fn test_legacy_and_current_share_baseline() {
        // 两种协议版本对计数的解释不同，但决策只看归一化后的计数
        let legacy = Arc::new(
            FakeClient::new("old.example")
                .with_protocol(ProtocolVersion::Legacy)
                .with_community(view(3, SubscribedType::Subscribed, 1)),
        );
        let current = Arc::new(
            FakeClient::new("new.example").with_community(view(4, SubscribedType::Subscribed, 2)),
        );
        let f = fixture(
            vec![TrackedCommunity::new("lemmy.ml", "rust")],
            vec![legacy.clone(), current.clone()],
        );

        f.reconciler.run_pass().await.unwrap();

        assert_eq!(status(&f.store, "old.example").await, Some(ProgressStatus::Pending));
        assert_eq!(legacy.calls().unfollows, 0);
        assert_eq!(status(&f.store, "new.example").await, Some(ProgressStatus::Done));
        assert_eq!(current.calls().unfollows, 1);
    }

    #[tokio::test]
    async fn test_pair_failure_is_isolated() {
        let broken = Arc::new(FakeClient::new("down.example").failing());
        let healthy = Arc::new(
            FakeClient::new("lemmy.world")
                .with_community(view(9, SubscribedType::NotSubscribed, 0)),
        );
        let mut other = TrackedCommunity::new("lemmy.ml", "python");
        other.created_at -= chrono::Duration::minutes(1);
        let f = fixture(
            vec![other, TrackedCommunity::new("lemmy.ml", "rust")],
            vec![broken.clone(), healthy.clone()],
        );

        let summary = f.reconciler.run_pass().await.unwrap();

        assert_eq!(summary.communities, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(status(&f.store, "down.example").await, Some(ProgressStatus::Error));
        assert_eq!(status(&f.store, "lemmy.world").await, Some(ProgressStatus::Pending));
        assert_eq!(healthy.calls().lookups, 2);
    }

    #[tokio::test]
    async fn test_register_syncs_only_that_community() {
        let client = Arc::new(
            FakeClient::new("lemmy.world")
                .with_community(view(9, SubscribedType::NotSubscribed, 0)),
        );
        let f = fixture(vec![TrackedCommunity::new("lemmy.ml", "other")], vec![client.clone()]);

        let (community, updated) = f.reconciler.register("lemmy.ml", "rust").await.unwrap();

        assert!(!updated);
        assert_eq!(community.status_for("lemmy.world"), Some(ProgressStatus::Pending));
        assert_eq!(client.calls().follows, 1);
        let other = CommunityStore::find(f.store.as_ref(), "lemmy.ml", "other")
            .await
            .unwrap()
            .unwrap();
        assert!(other.progress.is_empty());
    }

    #[tokio::test]
    async fn test_register_keeps_community_when_first_pass_fails() {
        let client = Arc::new(FakeClient::new("lemmy.world").failing());
        let f = fixture(vec![], vec![client]);

        let (community, _) = f.reconciler.register("lemmy.ml", "rust").await.unwrap();

        assert_eq!(community.status_for("lemmy.world"), Some(ProgressStatus::Error));
        assert!(
            CommunityStore::find(f.store.as_ref(), "lemmy.ml", "rust")
                .await
                .unwrap()
                .is_some()
        );
    }
}
