use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{
    config::FediseerConfig,
    error::{AppError, AppResult},
};

/// 实例信誉：担保数与谴责数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reputation {
    pub guarantees: usize,
    pub censures: usize,
}

impl Reputation {
    /// 不满足阈值时返回拒绝原因
    pub fn rejection(&self, host: &str, min_guarantees: usize, max_censures: usize) -> Option<String> {
        if self.guarantees < min_guarantees {
            Some(format!("Instance {} is not guaranteed", host))
        } else if self.censures >= max_censures {
            Some(format!("Instance {} has {} censures", host, self.censures))
        } else {
            None
        }
    }
}

#[async_trait::async_trait]
pub trait ReputationSource: Send + Sync {
    async fn reputation(&self, host: &str) -> AppResult<Reputation>;
}

#[derive(Debug, Deserialize)]
struct DomainsResponse {
    domains: Option<Vec<String>>,
}

/// Fediseer 信任列表客户端
#[derive(Debug, Clone)]
pub struct FediseerClient {
    http: Client,
    config: FediseerConfig,
}

impl FediseerClient {
    pub fn new(http: Client, config: FediseerConfig) -> Self {
        Self { http, config }
    }

    async fn count_domains(&self, kind: &str, host: &str) -> AppResult<usize> {
        let url = self.config.get_api_url(&format!("{}/{}", kind, host));
        debug!(%url, "查询 Fediseer");

        let response = self
            .http
            .get(&url)
            .query(&[("domains", "true")])
            .send()
            .await
            .map_err(|e| AppError::reputation(format!("请求 {} 失败: {}", url, e)))?;

        let body: DomainsResponse = response
            .json()
            .await
            .map_err(|e| AppError::reputation(format!("解析 {} 失败: {}", url, e)))?;

        body.domains
            .map(|domains| domains.len())
            .ok_or_else(|| AppError::reputation(format!("{} 的 {} 响应缺少 domains", host, kind)))
    }
}

#[async_trait::async_trait]
impl ReputationSource for FediseerClient {
    async fn reputation(&self, host: &str) -> AppResult<Reputation> {
        let guarantees = self.count_domains("guarantees", host).await?;
        let censures = self.count_domains("censures", host).await?;
        debug!(%host, guarantees, censures, "实例信誉");
        Ok(Reputation {
            guarantees,
            censures,
        })
    }
}
