use tracing::debug;

use crate::{
    error::{AppError, AppResult},
    models::CommunityView,
};

use super::FederationClient;

/// 在客户端所在实例上解析 `name@host` 形式的社区
///
/// 先查本地，找不到再让实例从远端拉取；拉取本身会让实例开始缓存该社区。
/// 两步都失败时返回 `ResolutionFailure`，不区分社区不存在与临时错误。
pub async fn resolve_community(
    client: &dyn FederationClient,
    qualified_name: &str,
) -> AppResult<CommunityView> {
    match client.get_community(qualified_name).await {
        Ok(Some(view)) => return Ok(view),
        Ok(None) => debug!(host = client.host(), community = qualified_name, "本地未找到社区"),
        Err(e) => {
            debug!(host = client.host(), community = qualified_name, error = %e, "本地查找失败")
        }
    }

    match client.resolve_community(qualified_name).await {
        Ok(Some(view)) => Ok(view),
        Ok(None) => Err(AppError::resolution(
            qualified_name,
            format!("{} 无法解析该社区", client.host()),
        )),
        Err(e) => Err(AppError::resolution(qualified_name, e)),
    }
}
