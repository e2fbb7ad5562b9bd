use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    config::FederationConfig,
    error::{AppError, AppResult},
    models::{BotAccount, ProtocolVersion},
    repositories::AccountStore,
};

use super::{FederationClient, NodeInfoCache, build_client};

/// 客户端构建接口，测试中以假实现替换
#[async_trait::async_trait]
pub trait ClientProvider: Send + Sync {
    /// 为账号构建客户端，必要时登录
    async fn client_for(&self, account: &BotAccount) -> AppResult<Arc<dyn FederationClient>>;

    /// 构建不带身份的客户端
    async fn anonymous(&self, host: &str) -> AppResult<Arc<dyn FederationClient>>;
}

/// 根据 nodeinfo 选择协议版本并构建客户端
pub struct ProtocolClientFactory {
    http: Client,
    config: FederationConfig,
    node_info: Arc<NodeInfoCache>,
    accounts: Arc<dyn AccountStore>,
}

impl ProtocolClientFactory {
    pub fn new(
        http: Client,
        config: FederationConfig,
        node_info: Arc<NodeInfoCache>,
        accounts: Arc<dyn AccountStore>,
    ) -> Self {
        Self {
            http,
            config,
            node_info,
            accounts,
        }
    }

    /// 探测实例协议版本
    pub async fn protocol_for(&self, host: &str) -> AppResult<ProtocolVersion> {
        let info = self.node_info.get(host).await?;
        ProtocolVersion::detect(&info, &self.config.legacy_version_prefix).ok_or_else(|| {
            AppError::unsupported_protocol(
                host,
                format!("{} {}", info.software.name, info.software.version),
            )
        })
    }

    fn build(
        &self,
        protocol: ProtocolVersion,
        host: &str,
        jwt: Option<String>,
    ) -> Arc<dyn FederationClient> {
        build_client(
            protocol,
            self.http.clone(),
            host,
            &self.config.origin(host),
            jwt,
        )
    }
}

#[async_trait::async_trait]
impl ClientProvider for ProtocolClientFactory {
    async fn client_for(&self, account: &BotAccount) -> AppResult<Arc<dyn FederationClient>> {
        let protocol = self.protocol_for(&account.host).await?;
        debug!(host = %account.host, %protocol, "构建客户端");

        let (true, Some(password)) = (account.needs_login(), account.password.as_deref()) else {
            return Ok(self.build(protocol, &account.host, account.jwt.clone()));
        };

        let token = self
            .build(protocol, &account.host, None)
            .login(&account.username, password)
            .await?;
        info!(host = %account.host, username = %account.username, "登录成功，写回令牌");

        let mut updated = account.clone();
        updated.jwt = Some(token.clone());
        // 写回失败只影响下一轮是否需要重新登录
        if let Err(e) = self.accounts.upsert(&updated).await {
            warn!(host = %account.host, error = %e, "保存令牌失败");
        }

        Ok(self.build(protocol, &account.host, Some(token)))
    }

    async fn anonymous(&self, host: &str) -> AppResult<Arc<dyn FederationClient>> {
        let protocol = self.protocol_for(host).await?;
        Ok(self.build(protocol, host, None))
    }
}
