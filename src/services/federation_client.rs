use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use std::sync::Arc;
use tracing::debug;

use crate::{
    error::{AppError, AppResult},
    models::{CommunityView, FederatedInstances, ProtocolVersion, SubscribedType},
};

use super::{LemmyClient, LemmyLegacyClient};

/// 远程实例能力集合，两个协议版本各有一个实现
#[async_trait::async_trait]
pub trait FederationClient: Send + Sync {
    /// 客户端所属实例
    fn host(&self) -> &str;

    fn protocol(&self) -> ProtocolVersion;

    /// 登录并返回会话令牌
    async fn login(&self, username: &str, password: &str) -> AppResult<String>;

    /// 在本实例上直接查找社区，不存在时返回 None
    async fn get_community(&self, name: &str) -> AppResult<Option<CommunityView>>;

    /// 让本实例从远端拉取对象，解析不到时返回 None
    async fn resolve_community(&self, query: &str) -> AppResult<Option<CommunityView>>;

    async fn follow_community(&self, community_id: i64, follow: bool) -> AppResult<()>;

    async fn federated_instances(&self) -> AppResult<FederatedInstances>;
}

/// 根据协议版本构建客户端
pub fn build_client(
    protocol: ProtocolVersion,
    http: reqwest::Client,
    host: &str,
    origin: &str,
    jwt: Option<String>,
) -> Arc<dyn FederationClient> {
    match protocol {
        ProtocolVersion::Legacy => Arc::new(LemmyLegacyClient::new(http, host, origin, jwt)),
        ProtocolVersion::Current => Arc::new(LemmyClient::new(http, host, origin, jwt)),
    }
}

/// 远程接口的返回：成功数据或业务拒绝
#[derive(Debug)]
pub(crate) enum Reply<T> {
    Data(T),
    Rejected { status: StatusCode, error: String },
}

impl<T> Reply<T> {
    /// Lemmy 以 400/404 + `couldnt_find_*` 表示对象不存在
    pub(crate) fn into_found(self, host: &str, action: &str) -> AppResult<Option<T>> {
        match self {
            Reply::Data(data) => Ok(Some(data)),
            Reply::Rejected { status, error }
                if status == StatusCode::NOT_FOUND || error.starts_with("couldnt_find") =>
            {
                debug!(%host, %status, %error, "{}: 对象不存在", action);
                Ok(None)
            }
            Reply::Rejected { status, error } => Err(AppError::service_unavailable(format!(
                "{} 失败 ({}): status={}, error={}",
                action, host, status, error
            ))),
        }
    }

    pub(crate) fn into_data(self, host: &str, action: &str) -> AppResult<T> {
        match self {
            Reply::Data(data) => Ok(data),
            Reply::Rejected { status, error } => Err(AppError::service_unavailable(format!(
                "{} 失败 ({}): status={}, error={}",
                action, host, status, error
            ))),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// 发送请求并解析JSON响应
pub(crate) async fn execute<T: DeserializeOwned>(
    host: &str,
    request: RequestBuilder,
) -> AppResult<Reply<T>> {
    let response = request
        .send()
        .await
        .map_err(|e| AppError::peer_unreachable(host, e))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| AppError::peer_unreachable(host, e))?;

    if !status.is_success() {
        let error = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or_else(|_| text.chars().take(200).collect());
        return Ok(Reply::Rejected { status, error });
    }

    let data = serde_json::from_str(&text).map_err(|e| {
        AppError::service_unavailable(format!(
            "解析 {} 响应失败: {}, body_preview={}",
            host,
            e,
            text.chars().take(200).collect::<String>()
        ))
    })?;
    Ok(Reply::Data(data))
}

// 两个版本共用的响应结构

#[derive(Debug, serde::Serialize)]
pub(crate) struct LoginForm<'a> {
    pub username_or_email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub jwt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireCommunity {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub removed: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FederatedInstancesResponse {
    pub federated_instances: Option<FederatedInstances>,
}

pub(crate) fn community_view(
    community: WireCommunity,
    subscribed: SubscribedType,
    local_subscribers: i64,
) -> CommunityView {
    CommunityView {
        id: community.id,
        name: community.name,
        nsfw: community.nsfw,
        deleted: community.deleted,
        removed: community.removed,
        subscribed,
        local_subscribers,
    }
}

pub(crate) fn login_token(host: &str, reply: Reply<LoginResponse>) -> AppResult<String> {
    match reply {
        Reply::Data(LoginResponse { jwt: Some(jwt) }) => Ok(jwt),
        Reply::Data(LoginResponse { jwt: None }) => {
            Err(AppError::authentication(host, "登录响应缺少 jwt"))
        }
        Reply::Rejected { status, error } => Err(AppError::authentication(
            host,
            format!("status={}, error={}", status, error),
        )),
    }
}

pub(crate) fn federated_instances(
    host: &str,
    reply: Reply<FederatedInstancesResponse>,
) -> AppResult<FederatedInstances> {
    reply
        .into_data(host, "获取联邦实例列表")?
        .federated_instances
        .ok_or_else(|| {
            AppError::service_unavailable(format!("{} 未返回联邦实例列表", host))
        })
}
