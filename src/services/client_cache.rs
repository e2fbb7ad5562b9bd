use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::{error::AppResult, models::BotAccount};

use super::{ClientProvider, FederationClient};

/// 单轮同步内的客户端缓存，同一实例只构建（登录）一次
///
/// 构建失败不缓存，下一次访问会重试。
pub struct ClientCache<'a> {
    provider: &'a dyn ClientProvider,
    clients: HashMap<String, Arc<dyn FederationClient>>,
}

impl<'a> ClientCache<'a> {
    pub fn new(provider: &'a dyn ClientProvider) -> Self {
        Self {
            provider,
            clients: HashMap::new(),
        }
    }

    pub async fn get(&mut self, account: &BotAccount) -> AppResult<Arc<dyn FederationClient>> {
        if let Some(client) = self.clients.get(&account.host) {
            debug!(host = %account.host, "复用客户端");
            return Ok(client.clone());
        }

        let client = self.provider.client_for(account).await?;
        self.clients.insert(account.host.clone(), client.clone());
        Ok(client)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
