use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::AppResult,
    models::{CommunityView, FederatedInstances, ProtocolVersion, SubscribedType},
};

use super::federation_client::{
    FederatedInstancesResponse, FederationClient, LoginForm, LoginResponse, WireCommunity,
    community_view, execute, federated_instances, login_token,
};

/// Lemmy 0.18 客户端
///
/// 0.18 不读取请求头中的令牌，每个请求都要显式携带 `auth` 参数：
/// GET 放在查询串里，POST 放在请求体里。
#[derive(Debug, Clone)]
pub struct LemmyLegacyClient {
    http: Client,
    host: String,
    base_url: String,
    jwt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommunityAggregates {
    /// 0.18 没有本地订阅数，只能使用总订阅数
    subscribers: i64,
}

#[derive(Debug, Deserialize)]
struct LegacyCommunityView {
    community: WireCommunity,
    subscribed: SubscribedType,
    counts: CommunityAggregates,
}

impl From<LegacyCommunityView> for CommunityView {
    fn from(view: LegacyCommunityView) -> Self {
        community_view(view.community, view.subscribed, view.counts.subscribers)
    }
}

#[derive(Debug, Deserialize)]
struct GetCommunityResponse {
    community_view: LegacyCommunityView,
}

#[derive(Debug, Deserialize)]
struct ResolveObjectResponse {
    community: Option<LegacyCommunityView>,
}

#[derive(Debug, Serialize)]
struct FollowForm<'a> {
    community_id: i64,
    follow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth: Option<&'a str>,
}

impl LemmyLegacyClient {
    pub fn new(http: Client, host: &str, origin: &str, jwt: Option<String>) -> Self {
        Self {
            http,
            host: host.to_string(),
            base_url: format!("{}/api/v3", origin.trim_end_matches('/')),
            jwt,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// 在查询参数后追加 auth
    fn with_auth<'a>(&'a self, mut params: Vec<(&'a str, &'a str)>) -> Vec<(&'a str, &'a str)> {
        if let Some(jwt) = &self.jwt {
            params.push(("auth", jwt.as_str()));
        }
        params
    }
}

#[async_trait::async_trait]
impl FederationClient for LemmyLegacyClient {
    fn host(&self) -> &str {
        &self.host
    }

    fn protocol(&self) -> ProtocolVersion {
        ProtocolVersion::Legacy
    }

    async fn login(&self, username: &str, password: &str) -> AppResult<String> {
        debug!(host = %self.host, %username, "登录 (0.18)");
        let request = self.http.post(self.url("/user/login")).json(&LoginForm {
            username_or_email: username,
            password,
        });
        login_token(&self.host, execute::<LoginResponse>(&self.host, request).await?)
    }

    async fn get_community(&self, name: &str) -> AppResult<Option<CommunityView>> {
        let request = self
            .http
            .get(self.url("/community"))
            .query(&self.with_auth(vec![("name", name)]));
        let found = execute::<GetCommunityResponse>(&self.host, request)
            .await?
            .into_found(&self.host, "查找社区")?;
        Ok(found.map(|r| r.community_view.into()))
    }

    async fn resolve_community(&self, query: &str) -> AppResult<Option<CommunityView>> {
        let request = self
            .http
            .get(self.url("/resolve_object"))
            .query(&self.with_auth(vec![("q", query)]));
        let found = execute::<ResolveObjectResponse>(&self.host, request)
            .await?
            .into_found(&self.host, "解析远程对象")?;
        Ok(found.and_then(|r| r.community).map(Into::into))
    }

    async fn follow_community(&self, community_id: i64, follow: bool) -> AppResult<()> {
        let request = self.http.post(self.url("/community/follow")).json(&FollowForm {
            community_id,
            follow,
            auth: self.jwt.as_deref(),
        });
        execute::<serde_json::Value>(&self.host, request)
            .await?
            .into_data(&self.host, "切换订阅")?;
        Ok(())
    }

    async fn federated_instances(&self) -> AppResult<FederatedInstances> {
        let request = self
            .http
            .get(self.url("/federated_instances"))
            .query(&self.with_auth(Vec::new()));
        federated_instances(
            &self.host,
            execute::<FederatedInstancesResponse>(&self.host, request).await?,
        )
    }
}
