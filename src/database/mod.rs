use crate::{config::DatabaseConfig, error::AppResult};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

/// 数据库连接池
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("pool", &"<PgPool>")
            .finish()
    }
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tracked_communities (
        id UUID PRIMARY KEY,
        host TEXT NOT NULL,
        name TEXT NOT NULL,
        progress JSONB NOT NULL DEFAULT '[]'::jsonb,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ,
        UNIQUE (host, name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS bot_accounts (
        host TEXT PRIMARY KEY,
        username TEXT NOT NULL,
        password TEXT,
        jwt TEXT,
        active BOOLEAN NOT NULL DEFAULT TRUE,
        position INTEGER NOT NULL DEFAULT 0
    )
    "#,
];

impl Database {
    /// 创建数据库连接池
    pub async fn new(config: &DatabaseConfig) -> AppResult<Self> {
        tracing::info!("正在连接数据库: {}", mask_database_url(&config.url));

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&config.url)
            .await?;

        sqlx::query("SELECT 1").fetch_one(&pool).await?;

        tracing::info!("数据库连接成功，最大连接数: {}", config.max_connections);

        Ok(Self { pool })
    }

    /// 获取连接池引用
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 创建缺失的表
    pub async fn migrate(&self) -> AppResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("数据库表结构检查完成");
        Ok(())
    }

    /// 检查数据库健康状态
    pub async fn health_check(&self) -> AppResult<bool> {
        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(result == 1)
    }
}

/// 隐藏数据库URL中的密码
fn mask_database_url(url: &str) -> String {
    let (Some(protocol_end), Some(at_pos)) = (url.find("://"), url.rfind('@')) else {
        return url.to_string();
    };
    let auth_start = protocol_end + 3;
    if at_pos < auth_start {
        return url.to_string();
    }
    match url[auth_start..at_pos].find(':') {
        Some(colon_pos) => {
            let mut masked = url.to_string();
            masked.replace_range(auth_start + colon_pos + 1..at_pos, "***");
            masked
        }
        None => url.to_string(),
    }
}
