use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::config::AccountConfig;

/// 机器人账号，以实例域名为主键
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct BotAccount {
    pub host: String,
    pub username: String,
    pub password: Option<String>,
    /// 登录后缓存的会话令牌
    pub jwt: Option<String>,
    pub active: bool,
    /// 配置中的顺序，决定同一社区内账号的处理顺序
    pub position: i32,
}

impl BotAccount {
    pub fn from_config(config: &AccountConfig, position: i32) -> Self {
        Self {
            host: config.host.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            jwt: None,
            active: config.active,
            position,
        }
    }

    /// 没有令牌但有用户名密码时需要登录
    pub fn needs_login(&self) -> bool {
        self.jwt.is_none() && !self.username.is_empty() && self.password.is_some()
    }

    /// 判断两个账号是否为同一身份（用于同步时保留令牌）
    pub fn same_identity(&self, other: &BotAccount) -> bool {
        self.host == other.host && self.username == other.username && self.password == other.password
    }
}
