use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 远程实例访问配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FederationConfig {
    /// 访问远程实例使用的协议
    pub scheme: String,
    /// 所有出站请求携带的 User-Agent
    pub user_agent: String,
    /// 旧版协议（auth 作为请求参数传递）的版本前缀
    pub legacy_version_prefix: String,
    /// nodeinfo 缓存有效期（秒）
    pub node_info_ttl_secs: u64,
    /// 联邦实例列表缓存有效期（秒）
    pub federation_status_ttl_secs: u64,
    /// 单次HTTP请求超时（秒）
    pub request_timeout_secs: u64,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            user_agent: "lcb-bot/1.0.0".to_string(),
            legacy_version_prefix: "0.18".to_string(),
            node_info_ttl_secs: 60 * 60,
            federation_status_ttl_secs: 60 * 60,
            request_timeout_secs: 30,
        }
    }
}

impl FederationConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.scheme != "https" && self.scheme != "http" {
            return Err("scheme 只能是 http 或 https".to_string());
        }

        if self.user_agent.trim().is_empty() {
            return Err("user_agent 不能为空".to_string());
        }

        if self.legacy_version_prefix.trim().is_empty() {
            return Err("legacy_version_prefix 不能为空".to_string());
        }

        if self.request_timeout_secs == 0 {
            return Err("请求超时必须大于0".to_string());
        }

        Ok(())
    }

    /// 实例的访问根地址
    pub fn origin(&self, host: &str) -> String {
        format!("{}://{}", self.scheme, host)
    }

    pub fn node_info_ttl(&self) -> Duration {
        Duration::from_secs(self.node_info_ttl_secs)
    }

    pub fn federation_status_ttl(&self) -> Duration {
        Duration::from_secs(self.federation_status_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 构建带统一 User-Agent 与超时的HTTP客户端
    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .timeout(self.request_timeout())
            .build()
    }
}

/// Fediseer 信誉检查配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FediseerConfig {
    pub base_url: String,
    /// 至少需要的担保数
    pub min_guarantees: usize,
    /// 达到该数量的谴责即拒绝
    pub max_censures: usize,
}

impl Default for FediseerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://fediseer.com/api/v1".to_string(),
            min_guarantees: 1,
            max_censures: 3,
        }
    }
}

impl FediseerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err("Fediseer base_url 必须以 http:// 或 https:// 开头".to_string());
        }

        if self.max_censures == 0 {
            return Err("max_censures 必须大于0".to_string());
        }

        Ok(())
    }

    /// 获取完整的API URL
    pub fn get_api_url(&self, endpoint: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let endpoint = endpoint.trim_start_matches('/');
        format!("{}/{}", base, endpoint)
    }
}
