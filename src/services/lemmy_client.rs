use reqwest::{Client, RequestBuilder, header};
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

/// Lemmy 0.19+ 客户端，令牌通过 `Authorization` 头与 `jwt` cookie 传递
#[derive(Debug, Clone)]
pub struct LemmyClient {
    http: Client,
    host: String,
    base_url: String,
    jwt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommunityAggregates {
    /// 本实例用户的订阅数，`subscribers` 为全网订阅数
    #[serde(default)]
    subscribers_local: i64,
}

#[derive(Debug, Deserialize)]
struct CurrentCommunityView {
    community: WireCommunity,
    subscribed: SubscribedType,
    counts: CommunityAggregates,
}

impl From<CurrentCommunityView> for CommunityView {
    fn from(view: CurrentCommunityView) -> Self {
        community_view(
            view.community,
            view.subscribed,
            view.counts.subscribers_local,
        )
    }
}

#[derive(Debug, Deserialize)]
struct GetCommunityResponse {
    community_view: CurrentCommunityView,
}

#[derive(Debug, Deserialize)]
struct ResolveObjectResponse {
    community: Option<CurrentCommunityView>,
}

#[derive(Debug, Serialize)]
struct FollowForm {
    community_id: i64,
    follow: bool,
}

impl LemmyClient {
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

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.jwt {
            Some(jwt) => request
                .bearer_auth(jwt)
                .header(header::COOKIE, format!("jwt={}", jwt)),
            None => request,
        }
    }
}

#[async_trait::async_trait]
impl FederationClient for LemmyClient {
    fn host(&self) -> &str {
        &self.host
    }

    fn protocol(&self) -> ProtocolVersion {
        ProtocolVersion::Current
    }

    async fn login(&self, username: &str, password: &str) -> AppResult<String> {
        debug!(host = %self.host, %username, "登录");
        let request = self.http.post(self.url("/user/login")).json(&LoginForm {
            username_or_email: username,
            password,
        });
        login_token(&self.host, execute::<LoginResponse>(&self.host, request).await?)
    }

    async fn get_community(&self, name: &str) -> AppResult<Option<CommunityView>> {
        let request = self.authorized(
            self.http
                .get(self.url("/community"))
                .query(&[("name", name)]),
        );
        let found = execute::<GetCommunityResponse>(&self.host, request)
            .await?
            .into_found(&self.host, "查找社区")?;
        Ok(found.map(|r| r.community_view.into()))
    }

    async fn resolve_community(&self, query: &str) -> AppResult<Option<CommunityView>> {
        let request = self.authorized(
            self.http
                .get(self.url("/resolve_object"))
                .query(&[("q", query)]),
        );
        let found = execute::<ResolveObjectResponse>(&self.host, request)
            .await?
            .into_found(&self.host, "解析远程对象")?;
        Ok(found.and_then(|r| r.community).map(Into::into))
    }

    async fn follow_community(&self, community_id: i64, follow: bool) -> AppResult<()> {
        let request = self.authorized(
            self.http
                .post(self.url("/community/follow"))
                .json(&FollowForm {
                    community_id,
                    follow,
                }),
        );
        execute::<serde_json::Value>(&self.host, request)
            .await?
            .into_data(&self.host, "切换订阅")?;
        Ok(())
    }

    async fn federated_instances(&self) -> AppResult<FederatedInstances> {
        let request = self.authorized(self.http.get(self.url("/federated_instances")));
        federated_instances(
            &self.host,
            execute::<FederatedInstancesResponse>(&self.host, request).await?,
        )
    }
}
