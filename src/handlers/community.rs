use axum::{extract::State, response::Json};

use crate::{
    error::AppError,
    handlers::AppState,
    models::{AddCommunityRequest, AddCommunityResponse, CommunityOverview, InstanceSummary},
    response::ApiResponse,
};

/// 获取被跟踪社区列表
///
/// 返回所有社区（按加入时间倒序）、全部机器人实例（含停用的）以及同步间隔
#[utoipa::path(
    get,
    path = "/api/communities",
    responses(
        (status = 200, description = "成功获取社区列表", body = ApiResponse<CommunityOverview>),
        (status = 500, description = "服务器内部错误", body = ApiResponse<String>)
    ),
    tag = "社区管理"
)]
pub async fn list_communities(
    State(app_state): State<AppState>,
) -> Result<Json<ApiResponse<CommunityOverview>>, AppError> {
    let mut communities = app_state.communities.load_all().await?;
    communities.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    // 只暴露域名和用户名，不返回密码与令牌
    let instances = app_state
        .accounts
        .load_all()
        .await?
        .into_iter()
        .map(|account| InstanceSummary {
            host: account.host,
            username: account.username,
            active: account.active,
        })
        .collect();

    Ok(Json(ApiResponse::success(CommunityOverview {
        communities,
        instances,
        interval_minutes: app_state.interval.as_secs() / 60,
    })))
}

/// 登记新社区
///
/// 校验社区与所属实例后写入存储，并立即尝试订阅
#[utoipa::path(
    post,
    path = "/api/communities",
    request_body = AddCommunityRequest,
    responses(
        (status = 200, description = "社区已登记", body = ApiResponse<AddCommunityResponse>),
        (status = 400, description = "社区或实例不符合要求", body = ApiResponse<String>),
        (status = 502, description = "远程实例不可用", body = ApiResponse<String>)
    ),
    tag = "社区管理"
)]
pub async fn add_community(
    State(app_state): State<AppState>,
    Json(request): Json<AddCommunityRequest>,
) -> Result<Json<ApiResponse<AddCommunityResponse>>, AppError> {
    let response = app_state.intake.add(&request.community).await?;
    let msg = if response.updated {
        format!("Community {} updated", response.community.qualified_name())
    } else {
        format!("Community {} added", response.community.qualified_name())
    };

    Ok(Json(ApiResponse::success_with_message(response, msg)))
}
