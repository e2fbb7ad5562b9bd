use std::time::Duration;
use tracing::debug;

use crate::{
    error::AppResult,
    models::{FederatedInstances, FederationRelation},
};

use super::{FederationClient, TtlCache};

/// 按账号实例缓存其联邦对端列表
#[derive(Debug)]
pub struct FederationStatusCache {
    cache: TtlCache<String, FederatedInstances>,
}

impl FederationStatusCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: TtlCache::new("federation_status", ttl),
        }
    }

    /// 从 `client` 所在实例的视角查询与 `target_host` 的联邦关系
    pub async fn relation(
        &self,
        client: &dyn FederationClient,
        target_host: &str,
    ) -> AppResult<FederationRelation> {
        let host = client.host().to_string();
        let instances = self
            .cache
            .get_or_try_insert_with(host.clone(), || client.federated_instances())
            .await?;

        let relation = instances.relation_to(target_host);
        debug!(%host, %target_host, ?relation, "联邦关系");
        Ok(relation)
    }
}
