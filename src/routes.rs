use crate::handlers::{AppState, add_community, list_communities};
use axum::{Router, routing::get};

/// 创建API路由
pub fn create_api_routes() -> Router<AppState> {
    Router::new()
        // 社区登记与查询
        .route(
            "/api/communities",
            get(list_communities).post(add_community),
        )
}
