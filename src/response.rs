use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 统一API响应格式
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// 业务响应码
    pub code: i32,
    /// 是否成功（与前端表单约定保持一致）
    pub success: bool,
    /// 响应消息
    pub msg: String,
    /// 响应数据
    pub data: Option<T>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self {
            code: ResponseCode::SUCCESS,
            success: true,
            msg: ResponseCode::get_message(ResponseCode::SUCCESS).to_string(),
            data: Some(data),
        }
    }

    /// 创建成功响应（自定义消息）
    pub fn success_with_message(data: T, msg: String) -> Self {
        Self {
            code: ResponseCode::SUCCESS,
            success: true,
            msg,
            data: Some(data),
        }
    }

    /// 创建错误响应
    pub fn error(code: i32, msg: String) -> ApiResponse<()> {
        ApiResponse {
            code,
            success: false,
            msg,
            data: None,
        }
    }
}

impl<T> IntoResponse for ApiResponse<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        // 根据业务响应码确定HTTP状态码
        let status = match self.code {
            ResponseCode::SUCCESS => StatusCode::OK,
            ResponseCode::BAD_REQUEST => StatusCode::BAD_REQUEST,
            ResponseCode::NOT_FOUND => StatusCode::NOT_FOUND,
            ResponseCode::REMOTE_ERROR => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

/// 业务响应码常量
pub struct ResponseCode;

impl ResponseCode {
    /// 成功响应码
    pub const SUCCESS: i32 = 200;

    /// 客户端错误 4xx
    pub const BAD_REQUEST: i32 = 400;
    pub const NOT_FOUND: i32 = 404;

    /// 服务器错误 5xx
    pub const INTERNAL_ERROR: i32 = 500;
    pub const DATABASE_ERROR: i32 = 501;
    pub const REMOTE_ERROR: i32 = 502;
}

impl ResponseCode {
    pub fn get_message(code: i32) -> &'static str {
        match code {
            Self::SUCCESS => "操作成功",
            Self::BAD_REQUEST => "请求参数错误",
            Self::NOT_FOUND => "资源不存在",
            Self::INTERNAL_ERROR => "服务器内部错误",
            Self::DATABASE_ERROR => "数据库错误",
            Self::REMOTE_ERROR => "远程实例错误",
            _ => "未知错误",
        }
    }
}
