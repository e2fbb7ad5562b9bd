use serde::{Deserialize, Serialize};

/// nodeinfo 2.0 中我们关心的部分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub software: NodeSoftware,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSoftware {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// 远程实例使用的协议版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    /// 0.18：令牌作为 `auth` 参数随请求传递，订阅数字段为 `subscribers`
    Legacy,
    /// 0.19 及以上：令牌放在请求头，订阅数字段为 `subscribers_local`
    Current,
}

impl ProtocolVersion {
    /// 根据 nodeinfo 选择协议版本
    pub fn detect(info: &NodeInfo, legacy_prefix: &str) -> Option<Self> {
        let software = &info.software;
        if !software.name.eq_ignore_ascii_case("lemmy") || software.version.trim().is_empty() {
            return None;
        }
        if software.version.starts_with(legacy_prefix) {
            Some(Self::Legacy)
        } else {
            Some(Self::Current)
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolVersion::Legacy => write!(f, "legacy"),
            ProtocolVersion::Current => write!(f, "current"),
        }
    }
}

/// 当前账号对社区的订阅状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscribedType {
    Subscribed,
    NotSubscribed,
    Pending,
}

impl SubscribedType {
    /// 机器人自身对本地订阅数的贡献
    pub fn own_contribution(&self) -> i64 {
        match self {
            SubscribedType::NotSubscribed => 0,
            SubscribedType::Subscribed | SubscribedType::Pending => 1,
        }
    }
}

/// 协议无关的社区视图，由各版本客户端从各自的响应结构转换而来
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityView {
    /// 社区在当前实例上的本地ID
    pub id: i64,
    pub name: String,
    pub nsfw: bool,
    pub deleted: bool,
    pub removed: bool,
    pub subscribed: SubscribedType,
    /// 当前实例上的本地订阅数（字段随协议版本不同）
    pub local_subscribers: i64,
}

impl CommunityView {
    /// 除机器人外已有真实用户订阅
    pub fn has_other_local_subscribers(&self) -> bool {
        self.local_subscribers > self.subscribed.own_contribution()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDomain {
    pub domain: String,
}

/// 实例已知的联邦对端列表
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederatedInstances {
    #[serde(default)]
    pub linked: Vec<InstanceDomain>,
    #[serde(default)]
    pub allowed: Vec<InstanceDomain>,
    #[serde(default)]
    pub blocked: Vec<InstanceDomain>,
}

/// 两个实例之间的联邦关系
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FederationRelation {
    Linked,
    Allowed,
    Blocked,
}

impl FederatedInstances {
    /// linked 优先于 allowed，allowed 优先于 blocked，均不在列表中视为 allowed
    pub fn relation_to(&self, target_host: &str) -> FederationRelation {
        let contains = |list: &[InstanceDomain]| list.iter().any(|i| i.domain == target_host);
        if contains(&self.linked) {
            FederationRelation::Linked
        } else if contains(&self.allowed) {
            FederationRelation::Allowed
        } else if contains(&self.blocked) {
            FederationRelation::Blocked
        } else {
            FederationRelation::Allowed
        }
    }
}
