//! 单元测试共用的假实现
use axum::Router;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use crate::{
    error::{AppError, AppResult},
    models::{
        BotAccount, CommunityView, FederatedInstances, InstanceDomain, ProtocolVersion,
        SubscribedType,
    },
};

use super::{ClientProvider, FederationClient};

/// 在随机端口上启动路由，返回 `http://127.0.0.1:port`
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn view(id: i64, subscribed: SubscribedType, local_subscribers: i64) -> CommunityView {
    CommunityView {
        id,
        name: "rust".to_string(),
        nsfw: false,
        deleted: false,
        removed: false,
        subscribed,
        local_subscribers,
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub logins: usize,
    pub lookups: usize,
    pub resolves: usize,
    pub follows: usize,
    pub unfollows: usize,
    pub peer_lists: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.logins + self.lookups + self.resolves + self.follows + self.unfollows + self.peer_lists
    }
}

#[derive(Debug, Default)]
struct FakeState {
    community: Option<CommunityView>,
    remote_only: bool,
    instances: FederatedInstances,
    fail_lookups: bool,
    calls: CallCounts,
}

/// 记录调用次数的内存客户端，订阅操作会修改社区的订阅状态
#[derive(Debug)]
pub struct FakeClient {
    host: String,
    protocol: ProtocolVersion,
    state: Mutex<FakeState>,
    follow_gate: Option<Arc<Semaphore>>,
}

impl FakeClient {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            protocol: ProtocolVersion::Current,
            state: Mutex::new(FakeState::default()),
            follow_gate: None,
        }
    }

    pub fn with_protocol(mut self, protocol: ProtocolVersion) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_community(self, community: CommunityView) -> Self {
        self.set_community(community);
        self
    }

    /// 社区只能通过 resolve_object 拉取
    pub fn remote_only(self) -> Self {
        self.state.lock().unwrap().remote_only = true;
        self
    }

    pub fn with_blocked(self, domain: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .instances
            .blocked
            .push(InstanceDomain {
                domain: domain.to_string(),
            });
        self
    }

    /// 每次订阅请求先消耗一个许可，没有许可时挂起
    pub fn with_follow_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.follow_gate = Some(gate);
        self
    }

    pub fn failing(self) -> Self {
        self.state.lock().unwrap().fail_lookups = true;
        self
    }

    pub fn set_community(&self, community: CommunityView) {
        self.state.lock().unwrap().community = Some(community);
    }

    pub fn set_local_subscribers(&self, count: i64) {
        if let Some(community) = self.state.lock().unwrap().community.as_mut() {
            community.local_subscribers = count;
        }
    }

    pub fn calls(&self) -> CallCounts {
        self.state.lock().unwrap().calls
    }
}

#[async_trait::async_trait]
impl FederationClient for FakeClient {
    fn host(&self) -> &str {
        &self.host
    }

    fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    async fn login(&self, _username: &str, _password: &str) -> AppResult<String> {
        self.state.lock().unwrap().calls.logins += 1;
        Ok(format!("token-{}", self.host))
    }

    async fn get_community(&self, _name: &str) -> AppResult<Option<CommunityView>> {
        let mut state = self.state.lock().unwrap();
        state.calls.lookups += 1;
        if state.fail_lookups {
            return Err(AppError::peer_unreachable(&self.host, "connection refused"));
        }
        if state.remote_only {
            return Ok(None);
        }
        Ok(state.community.clone())
    }

    async fn resolve_community(&self, _query: &str) -> AppResult<Option<CommunityView>> {
        let mut state = self.state.lock().unwrap();
        state.calls.resolves += 1;
        if state.fail_lookups {
            return Err(AppError::peer_unreachable(&self.host, "connection refused"));
        }
        state.remote_only = false;
        Ok(state.community.clone())
    }

    async fn follow_community(&self, _community_id: i64, follow: bool) -> AppResult<()> {
        if let Some(gate) = &self.follow_gate {
            gate.acquire().await.unwrap().forget();
        }
        let mut state = self.state.lock().unwrap();
        if follow {
            state.calls.follows += 1;
        } else {
            state.calls.unfollows += 1;
        }
        if let Some(community) = state.community.as_mut() {
            let was = community.subscribed.own_contribution();
            community.subscribed = if follow {
                SubscribedType::Subscribed
            } else {
                SubscribedType::NotSubscribed
            };
            community.local_subscribers += community.subscribed.own_contribution() - was;
        }
        Ok(())
    }

    async fn federated_instances(&self) -> AppResult<FederatedInstances> {
        let mut state = self.state.lock().unwrap();
        state.calls.peer_lists += 1;
        Ok(state.instances.clone())
    }
}

/// 按域名返回预置客户端，并统计构建次数
#[derive(Debug, Default)]
pub struct FakeProvider {
    clients: HashMap<String, Arc<FakeClient>>,
    constructions: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, client: Arc<FakeClient>) -> Self {
        self.clients.insert(client.host().to_string(), client);
        self
    }

    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }

    fn lookup(&self, host: &str) -> AppResult<Arc<dyn FederationClient>> {
        self.constructions.fetch_add(1, Ordering::SeqCst);
        self.clients
            .get(host)
            .map(|client| client.clone() as Arc<dyn FederationClient>)
            .ok_or_else(|| AppError::peer_unreachable(host, "no fake client"))
    }
}

#[async_trait::async_trait]
impl ClientProvider for FakeProvider {
    async fn client_for(&self, account: &BotAccount) -> AppResult<Arc<dyn FederationClient>> {
        self.lookup(&account.host)
    }

    async fn anonymous(&self, host: &str) -> AppResult<Arc<dyn FederationClient>> {
        self.lookup(host)
    }
}

pub fn account(host: &str, position: i32) -> BotAccount {
    BotAccount {
        host: host.to_string(),
        username: "seedbot".to_string(),
        password: Some("pw".to_string()),
        jwt: Some("token".to_string()),
        active: true,
        position,
    }
}
