use crate::{
    models::{
        AddCommunityRequest, AddCommunityResponse, CommunityOverview, InstanceSummary,
        ProgressRecord, ProgressStatus, TrackedCommunity,
    },
    response::ApiResponse,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        // 社区管理API
        crate::handlers::community::list_communities,
        crate::handlers::community::add_community,
    ),
    components(
        schemas(
            TrackedCommunity,
            ProgressRecord,
            ProgressStatus,
            AddCommunityRequest,
            AddCommunityResponse,
            CommunityOverview,
            InstanceSummary,
            ApiResponse<CommunityOverview>,
            ApiResponse<AddCommunityResponse>,
            ApiResponse<String>,
        )
    ),
    tags(
        (name = "社区管理", description = "被跟踪社区的登记与查询")
    ),
    info(
        title = "Community Seeder API",
        version = "0.1.0",
        description = "联邦社区预热服务"
    )
)]
pub struct ApiDoc;
