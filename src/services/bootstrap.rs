use tracing::info;

use crate::{
    config::AccountConfig,
    error::AppResult,
    models::BotAccount,
    repositories::{AccountStore, CommunityStore},
};

/// 清空所有社区的同步进度，使下一轮重新评估每个组合
pub async fn reset_progress(store: &dyn CommunityStore) -> AppResult<u64> {
    let reset = store.reset_all_progress().await?;
    info!(communities = reset, "已重置同步进度");
    Ok(reset)
}

/// 用配置中的账号列表整体替换已存储的账号
///
/// 域名、用户名与密码都没变的账号保留已缓存的令牌，避免重启后重新登录。
/// 配置为空时不做任何改动。
pub async fn sync_accounts(store: &dyn AccountStore, configured: &[AccountConfig]) -> AppResult<usize> {
    if configured.is_empty() {
        info!("未配置账号，保留已存储的账号");
        return Ok(0);
    }

    let existing = store.load_all().await?;
    let accounts: Vec<BotAccount> = configured
        .iter()
        .enumerate()
        .map(|(position, config)| {
            let mut account = BotAccount::from_config(config, position as i32);
            account.jwt = existing
                .iter()
                .find(|old| old.same_identity(&account))
                .and_then(|old| old.jwt.clone());
            account
        })
        .collect();

    store.replace_all(&accounts).await?;
    info!(accounts = accounts.len(), "已同步账号");
    Ok(accounts.len())
}
