// 服务层模块
pub mod bootstrap;
pub mod client_cache;
pub mod client_factory;
pub mod community_resolver;
pub mod federation_client;
pub mod federation_status;
pub mod fediseer;
pub mod intake;
pub mod lemmy_client;
pub mod lemmy_legacy_client;
pub mod node_info;
pub mod reconciler;
pub mod scheduler;
pub mod ttl_cache;

#[cfg(test)]
pub(crate) mod test_support;

pub use bootstrap::{reset_progress, sync_accounts};
pub use client_cache::ClientCache;
pub use client_factory::{ClientProvider, ProtocolClientFactory};
pub use community_resolver::resolve_community;
pub use federation_client::{FederationClient, build_client};
pub use federation_status::FederationStatusCache;
pub use fediseer::{FediseerClient, Reputation, ReputationSource};
pub use intake::{CommunityIntake, parse_community_symbol};
pub use lemmy_client::LemmyClient;
pub use lemmy_legacy_client::LemmyLegacyClient;
pub use node_info::NodeInfoCache;
pub use reconciler::{FollowDecision, FollowReconciler, PassSummary, decide};
pub use scheduler::PeriodicScheduler;
pub use ttl_cache::TtlCache;
