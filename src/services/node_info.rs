use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::{
    error::{AppError, AppResult},
    models::NodeInfo,
};

use super::TtlCache;

/// 按实例缓存 nodeinfo，避免每次构建客户端都去请求
#[derive(Debug)]
pub struct NodeInfoCache {
    http: Client,
    scheme: String,
    cache: TtlCache<String, NodeInfo>,
}

impl NodeInfoCache {
    pub fn new(http: Client, scheme: impl Into<String>, ttl: Duration) -> Self {
        Self {
            http,
            scheme: scheme.into(),
            cache: TtlCache::new("node_info", ttl),
        }
    }

    /// 获取实例的 nodeinfo，缓存过期时重新拉取
    pub async fn get(&self, host: &str) -> AppResult<NodeInfo> {
        self.cache
            .get_or_try_insert_with(host.to_string(), || self.fetch(host))
            .await
    }

    async fn fetch(&self, host: &str) -> AppResult<NodeInfo> {
        let url = format!("{}://{}/nodeinfo/2.0.json", self.scheme, host);
        debug!(%host, %url, "拉取 nodeinfo");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::peer_unreachable(host, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::peer_unreachable(
                host,
                format!("nodeinfo 返回状态 {}", status),
            ));
        }

        response
            .json::<NodeInfo>()
            .await
            .map_err(|e| AppError::unsupported_protocol(host, format!("无法解析 nodeinfo: {}", e)))
    }
}
