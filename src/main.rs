/*
 * Community Seeder - Federated Community Bootstrapping Service
 * Copyright (c) 2024 Community Seeder Project
 *
 * This work is licensed under CC BY-NC-SA 4.0
 * https://creativecommons.org/licenses/by-nc-sa/4.0/
 */

use axum::{
    Router,
    extract::{Query, State},
    http::Method,
    response::Json,
    routing::get,
};
use community_seeder::{
    config::Config,
    database::Database,
    docs::ApiDoc,
    error::{AppError, AppResult},
    handlers::AppState,
    repositories::{AccountRepository, AccountStore, CommunityRepository, CommunityStore, MemoryStore},
    response::ApiResponse,
    routes::create_api_routes,
    services::{
        CommunityIntake, FederationStatusCache, FediseerClient, FollowReconciler, NodeInfoCache,
        PeriodicScheduler, ProtocolClientFactory, reset_progress, sync_accounts,
    },
};
use serde::Deserialize;
use std::future::IntoFuture;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

#[derive(Deserialize)]
struct HealthQuery {
    #[serde(default)]
    detail: bool,
}

/// 健康检查处理器
async fn health_check(Query(params): Query<HealthQuery>) -> Json<ApiResponse<serde_json::Value>> {
    if params.detail {
        Json(ApiResponse::success(serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })))
    } else {
        Json(ApiResponse::success(serde_json::json!({"status": "ok"})))
    }
}

/// 数据库健康检查处理器
async fn db_health_check(
    State(app_state): State<AppState>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let Some(db) = &app_state.database else {
        return Ok(Json(ApiResponse::success(
            serde_json::json!({"database": "memory"}),
        )));
    };

    if !db.health_check().await? {
        return Err(AppError::service_unavailable("数据库连接异常"));
    }
    Ok(Json(ApiResponse::success(
        serde_json::json!({"database": "healthy"}),
    )))
}

fn load_config() -> AppResult<Config> {
    let mut config = Config::load_or_default("config.toml")?;
    config.apply_env_overrides()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "community_seeder=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config()?;
    tracing::info!("服务器配置: {}", config.server_addr());

    // 初始化数据库（如果连接失败则改用内存存储，但记录警告）
    let database = match Database::new(&config.database).await {
        Ok(db) => {
            db.migrate().await?;
            Some(db)
        }
        Err(e) => {
            tracing::warn!("数据库连接失败，使用内存存储，重启后数据将丢失: {}", e);
            None
        }
    };

    let (communities, accounts): (Arc<dyn CommunityStore>, Arc<dyn AccountStore>) =
        match &database {
            Some(db) => (
                Arc::new(CommunityRepository::new(db.clone())) as Arc<dyn CommunityStore>,
                Arc::new(AccountRepository::new(db.clone())) as Arc<dyn AccountStore>,
            ),
            None => {
                let memory = Arc::new(MemoryStore::new());
                (memory.clone() as Arc<dyn CommunityStore>, memory as Arc<dyn AccountStore>)
            }
        };

    if config.scheduler.reset_progress_on_startup {
        reset_progress(communities.as_ref()).await?;
    }
    sync_accounts(accounts.as_ref(), &config.accounts).await?;

    // 进程级缓存与客户端工厂
    let http = config
        .federation
        .http_client()
        .map_err(|e| AppError::config(format!("创建HTTP客户端失败: {}", e)))?;
    let node_info = Arc::new(NodeInfoCache::new(
        http.clone(),
        config.federation.scheme.clone(),
        config.federation.node_info_ttl(),
    ));
    let federation_status = Arc::new(FederationStatusCache::new(
        config.federation.federation_status_ttl(),
    ));
    let clients = Arc::new(ProtocolClientFactory::new(
        http.clone(),
        config.federation.clone(),
        node_info,
        accounts.clone(),
    ));

    let reconciler = Arc::new(FollowReconciler::new(
        communities.clone(),
        accounts.clone(),
        clients.clone(),
        federation_status,
    ));
    let intake = Arc::new(CommunityIntake::new(
        &config,
        communities.clone(),
        clients,
        Arc::new(FediseerClient::new(http, config.fediseer.clone())),
        reconciler.clone(),
    ));

    let scheduler = PeriodicScheduler::new(
        reconciler,
        config.scheduler.interval(),
        config.scheduler.initial_delay(),
    );
    tracing::info!(
        "启动同步调度器，间隔: {}秒",
        config.scheduler.interval_secs
    );
    let scheduler_handle = tokio::spawn(async move { scheduler.run().await });

    // 创建应用状态
    let app_state = AppState {
        database,
        communities,
        accounts,
        intake,
        interval: config.scheduler.interval(),
    };

    // 创建CORS中间件
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let app = Router::new()
        // 健康检查
        .route("/health", get(health_check))
        .route("/api/health/db", get(db_health_check))
        // OpenAPI JSON 路由
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        // 业务API路由
        .merge(create_api_routes())
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // 启动服务器
    let listener = tokio::net::TcpListener::bind(&config.server_addr()).await?;
    tracing::info!("🚀 服务器启动成功，监听地址: {}", config.server_addr());

    // 调度器出错即退出，交由外部进程管理重启
    tokio::select! {
        result = axum::serve(listener, app).into_future() => result?,
        result = scheduler_handle => match result {
            Ok(Err(e)) => {
                tracing::error!("同步调度器退出: {}", e);
                return Err(e);
            }
            Ok(Ok(never)) => match never {},
            Err(e) => {
                return Err(AppError::Internal(anyhow::anyhow!("同步调度器异常终止: {}", e)));
            }
        },
    }

    Ok(())
}
