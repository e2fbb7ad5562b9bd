pub mod community;

use std::sync::Arc;
use std::time::Duration;

use crate::{
    database::Database,
    repositories::{AccountStore, CommunityStore},
    services::CommunityIntake,
};

pub use community::{add_community, list_communities};

/// 处理器共享状态
#[derive(Clone)]
pub struct AppState {
    /// 数据库不可用时为 None，此时使用内存存储
    pub database: Option<Database>,
    pub communities: Arc<dyn CommunityStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub intake: Arc<CommunityIntake>,
    /// 同步间隔，仅用于展示
    pub interval: Duration,
}
