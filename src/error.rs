use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::response::{ApiResponse, ResponseCode};

/// 应用程序错误类型
#[derive(Error, Debug)]
pub enum AppError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("验证错误: {0}")]
    Validation(String),

    /// 网络不可达或超时
    #[error("实例 {host} 不可达: {reason}")]
    PeerUnreachable { host: String, reason: String },

    /// nodeinfo 返回的软件版本无法识别
    #[error("实例 {host} 的协议版本不受支持: {version}")]
    UnsupportedProtocol { host: String, version: String },

    #[error("登录实例 {host} 失败: {reason}")]
    AuthenticationFailure { host: String, reason: String },

    /// 本地查找与远程解析均失败
    #[error("无法解析社区 {community}: {reason}")]
    ResolutionFailure { community: String, reason: String },

    #[error("信誉检查失败: {0}")]
    ReputationCheckFailure(String),

    #[error("内部错误: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("资源不存在: {resource}")]
    NotFound { resource: String },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, message) = match &self {
            AppError::Database(_) => (ResponseCode::DATABASE_ERROR, self.to_string()),
            AppError::Serialization(_) => {
                (ResponseCode::INTERNAL_ERROR, "数据序列化错误".to_string())
            }
            AppError::Io(_) => (ResponseCode::INTERNAL_ERROR, "文件IO错误".to_string()),
            AppError::Config(_) => (ResponseCode::INTERNAL_ERROR, "配置错误".to_string()),
            AppError::Validation(msg) => (ResponseCode::BAD_REQUEST, msg.clone()),
            AppError::ReputationCheckFailure(_) => (ResponseCode::BAD_REQUEST, self.to_string()),
            AppError::PeerUnreachable { .. }
            | AppError::UnsupportedProtocol { .. }
            | AppError::AuthenticationFailure { .. }
            | AppError::ResolutionFailure { .. } => (ResponseCode::REMOTE_ERROR, self.to_string()),
            AppError::Internal(e) => (ResponseCode::INTERNAL_ERROR, format!("服务器内部错误: {}", e)),
            AppError::NotFound { resource } => {
                (ResponseCode::NOT_FOUND, format!("资源不存在: {}", resource))
            }
        };

        tracing::error!("应用错误: {}", self);

        ApiResponse::<()>::error(code, message).into_response()
    }
}

/// 应用程序Result类型别名
pub type AppResult<T> = Result<T, AppError>;

/// 错误构造辅助函数
impl AppError {
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(resource: T) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn service_unavailable<T: Into<String>>(msg: T) -> Self {
        Self::Internal(anyhow::anyhow!(msg.into()))
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }

    pub fn peer_unreachable<H: Into<String>, R: ToString>(host: H, reason: R) -> Self {
        Self::PeerUnreachable {
            host: host.into(),
            reason: reason.to_string(),
        }
    }

    pub fn unsupported_protocol<H: Into<String>, V: Into<String>>(host: H, version: V) -> Self {
        Self::UnsupportedProtocol {
            host: host.into(),
            version: version.into(),
        }
    }

    pub fn authentication<H: Into<String>, R: ToString>(host: H, reason: R) -> Self {
        Self::AuthenticationFailure {
            host: host.into(),
            reason: reason.to_string(),
        }
    }

    pub fn resolution<C: Into<String>, R: ToString>(community: C, reason: R) -> Self {
        Self::ResolutionFailure {
            community: community.into(),
            reason: reason.to_string(),
        }
    }

    pub fn reputation<T: Into<String>>(msg: T) -> Self {
        Self::ReputationCheckFailure(msg.into())
    }
}
