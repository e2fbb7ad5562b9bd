use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// 单个(社区, 账号实例)组合的同步状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    /// 已订阅，等待下一轮确认
    Pending,
    /// 终态，之后不再处理
    Done,
    /// 本轮失败，下一轮重试
    Error,
}

impl std::fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressStatus::Pending => write!(f, "pending"),
            ProgressStatus::Done => write!(f, "done"),
            ProgressStatus::Error => write!(f, "error"),
        }
    }
}

/// 进度记录，每个账号实例在同一社区内唯一
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProgressRecord {
    /// 机器人账号所在实例
    pub host: String,
    pub status: ProgressStatus,
}

/// 被跟踪的社区
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrackedCommunity {
    pub id: Uuid,
    /// 社区所在实例
    pub host: String,
    /// 社区名称
    pub name: String,
    pub progress: Vec<ProgressRecord>,
    pub created_at: DateTime<Utc>,
    /// 最近一次写入进度的时间，从未写入时为空
    pub updated_at: Option<DateTime<Utc>>,
}

impl TrackedCommunity {
    pub fn new(host: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            host: host.into(),
            name: name.into(),
            progress: Vec::new(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// `name@host` 形式的完整社区标识
    pub fn qualified_name(&self) -> String {
        format!("{}@{}", self.name, self.host)
    }

    pub fn status_for(&self, account_host: &str) -> Option<ProgressStatus> {
        self.progress
            .iter()
            .find(|r| r.host == account_host)
            .map(|r| r.status)
    }

    /// 写入某账号实例的状态，返回状态是否发生了变化
    pub fn set_status(&mut self, account_host: &str, status: ProgressStatus) -> bool {
        match self.progress.iter_mut().find(|r| r.host == account_host) {
            Some(record) if record.status == status => false,
            Some(record) => {
                record.status = status;
                true
            }
            None => {
                self.progress.push(ProgressRecord {
                    host: account_host.to_string(),
                    status,
                });
                true
            }
        }
    }

    /// 该账号实例是否已进入终态
    pub fn is_done_for(&self, account_host: &str) -> bool {
        self.status_for(account_host) == Some(ProgressStatus::Done)
    }
}

/// 收录社区请求
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddCommunityRequest {
    /// `community@instance` 格式
    pub community: String,
}

/// 收录结果
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddCommunityResponse {
    /// 社区此前是否已被跟踪
    pub updated: bool,
    pub community: TrackedCommunity,
}

/// 机器人账号的公开信息（不含密码与令牌）
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InstanceSummary {
    pub host: String,
    pub username: String,
    pub active: bool,
}

/// 社区总览
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommunityOverview {
    pub communities: Vec<TrackedCommunity>,
    pub instances: Vec<InstanceSummary>,
    /// 同步间隔（分钟）
    pub interval_minutes: u64,
}
