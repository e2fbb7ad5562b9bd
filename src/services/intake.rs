use std::sync::Arc;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::AddCommunityResponse,
    repositories::CommunityStore,
};

use super::{ClientProvider, FollowReconciler, ReputationSource};

/// 解析 `name@host`，返回 (name, host)
pub fn parse_community_symbol(input: &str) -> AppResult<(String, String)> {
    let symbol = input.trim();
    let Some((name, host)) = symbol.split_once('@') else {
        return Err(AppError::validation(format!("Invalid community {}", symbol)));
    };

    if name.is_empty() || !is_bare_domain(host) || name.contains(is_separator) {
        return Err(AppError::validation(format!("Invalid community {}", symbol)));
    }

    Ok((name.to_string(), host.to_lowercase()))
}

fn is_separator(c: char) -> bool {
    matches!(c, '@' | '/' | ':' | '?' | '#' | '\\') || c.is_whitespace()
}

/// 只接受不带端口、路径和用户信息的域名，否则会被拼成指向别处的 URL
fn is_bare_domain(host: &str) -> bool {
    host.contains('.')
        && !host.starts_with('.')
        && !host.ends_with('.')
        && !host.contains(is_separator)
}

/// 新社区登记流程
///
/// 校验格式、黑名单与实例信誉后，用匿名客户端在社区所属实例上确认社区存在，
/// 再交给同步器登记并立即对该社区执行一次同步。
pub struct CommunityIntake {
    communities: Arc<dyn CommunityStore>,
    clients: Arc<dyn ClientProvider>,
    reputation: Arc<dyn ReputationSource>,
    reconciler: Arc<FollowReconciler>,
    config: Config,
}

impl CommunityIntake {
    pub fn new(
        config: &Config,
        communities: Arc<dyn CommunityStore>,
        clients: Arc<dyn ClientProvider>,
        reputation: Arc<dyn ReputationSource>,
        reconciler: Arc<FollowReconciler>,
    ) -> Self {
        Self {
            communities,
            clients,
            reputation,
            reconciler,
            config: config.clone(),
        }
    }

    pub async fn add(&self, input: &str) -> AppResult<AddCommunityResponse> {
        let (name, host) = parse_community_symbol(input)?;
        let symbol = format!("{}@{}", name, host);

        if self.config.is_blacklisted(&host) {
            return Err(AppError::validation(format!("Instance {} is blacklisted", host)));
        }

        let reputation = self.reputation.reputation(&host).await?;
        let fediseer = &self.config.fediseer;
        if let Some(reason) =
            reputation.rejection(&host, fediseer.min_guarantees, fediseer.max_censures)
        {
            return Err(AppError::validation(reason));
        }

        let client = self.clients.anonymous(&host).await?;
        let view = client
            .get_community(&name)
            .await?
            .ok_or_else(|| AppError::validation(format!("Community {} does not exist", symbol)))?;

        if view.nsfw {
            return Err(AppError::validation(format!("Community {} is NSFW", symbol)));
        }
        if view.deleted || view.removed {
            return Err(AppError::validation(format!(
                "Community {} is deleted or removed",
                symbol
            )));
        }

        let (community, updated) = self.reconciler.register(&host, &name).await?;
        Ok(AddCommunityResponse { updated, community })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{ProgressRecord, ProgressStatus, SubscribedType, TrackedCommunity},
        repositories::MemoryStore,
        services::{
            FederationStatusCache, Reputation,
            test_support::{FakeClient, FakeProvider, account, view},
        },
    };
    use std::time::Duration;
    use tokio::sync::Semaphore;

    struct FixedReputation(Reputation);

    #[async_trait::async_trait]
    impl ReputationSource for FixedReputation {
        async fn reputation(&self, _host: &str) -> AppResult<Reputation> {
            Ok(self.0)
        }
    }

    fn intake(
        store: Arc<MemoryStore>,
        provider: Arc<FakeProvider>,
        guarantees: usize,
    ) -> CommunityIntake {
        intake_with_reconciler(store, provider, guarantees).0
    }

    fn intake_with_reconciler(
        store: Arc<MemoryStore>,
        provider: Arc<FakeProvider>,
        guarantees: usize,
    ) -> (CommunityIntake, Arc<FollowReconciler>) {
        let reconciler = Arc::new(FollowReconciler::new(
            store.clone(),
            store.clone(),
            provider.clone(),
            Arc::new(FederationStatusCache::new(Duration::from_secs(3600))),
        ));
        let config = Config {
            blacklisted_instances: vec!["bad.example".to_string()],
            ..Config::default()
        };
        let intake = CommunityIntake::new(
            &config,
            store,
            provider,
            Arc::new(FixedReputation(Reputation {
                guarantees,
                censures: 0,
            })),
            reconciler.clone(),
        );
        (intake, reconciler)
    }

    #[test]
    fn test_parse_community_symbol() {
        assert_eq!(
            parse_community_symbol(" rust@Lemmy.ML ").unwrap(),
            ("rust".to_string(), "lemmy.ml".to_string())
        );
        assert!(parse_community_symbol("rust").is_err());
        assert!(parse_community_symbol("rust@localhost").is_err());
        assert!(parse_community_symbol("@lemmy.ml").is_err());
        // 主机部分只能是裸域名
        assert!(parse_community_symbol("rust@lemmy.ml@bad.example").is_err());
        assert!(parse_community_symbol("rust@evil.example/path?x=1").is_err());
        assert!(parse_community_symbol("rust@lemmy.ml:8080").is_err());
        assert!(parse_community_symbol("rust@lemmy .ml").is_err());
        assert!(parse_community_symbol("rust@lemmy.ml#frag").is_err());
        assert!(parse_community_symbol("ru/st@lemmy.ml").is_err());
    }

    #[tokio::test]
    async fn test_unguaranteed_host_rejected_before_any_client() {
        let provider = Arc::new(FakeProvider::new());
        let intake = intake(Arc::new(MemoryStore::new()), provider.clone(), 0);

        let err = intake.add("rust@shady.example").await.unwrap_err();

        assert!(matches!(err, AppError::Validation(ref msg) if msg.contains("not guaranteed")));
        assert_eq!(provider.constructions(), 0);
    }

    #[tokio::test]
    async fn test_blacklisted_host_rejected() {
        let provider = Arc::new(FakeProvider::new());
        let intake = intake(Arc::new(MemoryStore::new()), provider.clone(), 5);

        let err = intake.add("rust@bad.example").await.unwrap_err();

        assert!(matches!(err, AppError::Validation(ref msg) if msg.contains("blacklisted")));
        assert_eq!(provider.constructions(), 0);
    }

    #[tokio::test]
    async fn test_nsfw_community_rejected() {
        let mut nsfw = view(1, SubscribedType::NotSubscribed, 0);
        nsfw.nsfw = true;
        let provider =
            Arc::new(FakeProvider::new().with_client(Arc::new(FakeClient::new("lemmy.ml").with_community(nsfw))));
        let store = Arc::new(MemoryStore::new());
        let intake = intake(store.clone(), provider, 5);

        assert!(intake.add("rust@lemmy.ml").await.is_err());
        assert!(CommunityStore::find(store.as_ref(), "lemmy.ml", "rust").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deleted_or_removed_community_rejected() {
        for flag in ["deleted", "removed"] {
            let mut gone = view(1, SubscribedType::NotSubscribed, 0);
            gone.deleted = flag == "deleted";
            gone.removed = flag == "removed";
            let home = Arc::new(FakeClient::new("lemmy.ml").with_community(gone));
            let provider = Arc::new(FakeProvider::new().with_client(home));
            let store = Arc::new(MemoryStore::new());
            let intake = intake(store.clone(), provider, 5);

            let err = intake.add("rust@lemmy.ml").await.unwrap_err();

            assert!(matches!(err, AppError::Validation(ref msg) if msg.contains("deleted or removed")));
            assert!(CommunityStore::find(store.as_ref(), "lemmy.ml", "rust").await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_readding_resets_progress_and_follows() {
        let home = Arc::new(
            FakeClient::new("lemmy.ml").with_community(view(1, SubscribedType::NotSubscribed, 0)),
        );
        let bot = Arc::new(
            FakeClient::new("lemmy.world").with_community(view(8, SubscribedType::NotSubscribed, 0)),
        );
        let provider = Arc::new(FakeProvider::new().with_client(home).with_client(bot.clone()));

        let mut existing = TrackedCommunity::new("lemmy.ml", "rust");
        existing.progress = vec![ProgressRecord {
            host: "lemmy.world".to_string(),
            status: ProgressStatus::Done,
        }];
        let store = Arc::new(MemoryStore::with_data(
            vec![existing],
            vec![account("lemmy.world", 0)],
        ));
        let intake = intake(store.clone(), provider, 5);

        let response = intake.add("rust@lemmy.ml").await.unwrap();

        assert!(response.updated);
        assert_eq!(bot.calls().follows, 1);
        assert_eq!(
            response.community.status_for("lemmy.world"),
            Some(ProgressStatus::Pending)
        );
    }

    #[tokio::test]
    async fn test_readding_during_running_pass_keeps_reset() {
        let home = Arc::new(
            FakeClient::new("lemmy.ml").with_community(view(1, SubscribedType::NotSubscribed, 0)),
        );
        // 已有其他本地订阅者，每次评估都会退订并标记完成
        let gate = Arc::new(Semaphore::new(0));
        let bot = Arc::new(
            FakeClient::new("lemmy.world")
                .with_community(view(8, SubscribedType::NotSubscribed, 1))
                .with_follow_gate(gate.clone()),
        );
        let provider = Arc::new(FakeProvider::new().with_client(home.clone()).with_client(bot.clone()));
        let store = Arc::new(MemoryStore::with_data(
            vec![TrackedCommunity::new("lemmy.ml", "rust")],
            vec![account("lemmy.world", 0)],
        ));
        let (intake, reconciler) = intake_with_reconciler(store.clone(), provider, 5);

        // 定时同步停在退订请求上，持有旧的进度
        let pass = tokio::spawn(async move { reconciler.run_pass().await });
        while bot.calls().lookups == 0 {
            tokio::task::yield_now().await;
        }

        let intake = Arc::new(intake);
        let readd = tokio::spawn({
            let intake = intake.clone();
            async move { intake.add("rust@lemmy.ml").await }
        });
        while home.calls().lookups == 0 {
            tokio::task::yield_now().await;
        }
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }

        gate.add_permits(8);
        pass.await.unwrap().unwrap();
        let response = readd.await.unwrap().unwrap();

        assert!(response.updated);
        assert_eq!(bot.calls().unfollows, 2);
        assert_eq!(
            response.community.status_for("lemmy.world"),
            Some(ProgressStatus::Done)
        );
    }
}
