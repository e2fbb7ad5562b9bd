use crate::{
    database::Database,
    error::AppResult,
    models::{ProgressRecord, TrackedCommunity},
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

use super::CommunityStore;

/// 社区仓库（PostgreSQL）
#[derive(Debug, Clone)]
pub struct CommunityRepository {
    db: Database,
}

#[derive(FromRow)]
struct CommunityRow {
    id: Uuid,
    host: String,
    name: String,
    progress: Json<Vec<ProgressRecord>>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<CommunityRow> for TrackedCommunity {
    fn from(row: CommunityRow) -> Self {
        Self {
            id: row.id,
            host: row.host,
            name: row.name,
            progress: row.progress.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl CommunityRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl CommunityStore for CommunityRepository {
    async fn load_all(&self) -> AppResult<Vec<TrackedCommunity>> {
        let rows = sqlx::query_as::<_, CommunityRow>(
            r#"
            SELECT id, host, name, progress, created_at, updated_at
            FROM tracked_communities
            ORDER BY updated_at ASC NULLS FIRST, created_at ASC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find(&self, host: &str, name: &str) -> AppResult<Option<TrackedCommunity>> {
        let row = sqlx::query_as::<_, CommunityRow>(
            r#"
            SELECT id, host, name, progress, created_at, updated_at
            FROM tracked_communities
            WHERE host = $1 AND name = $2
            "#,
        )
        .bind(host)
        .bind(name)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn upsert(&self, community: &TrackedCommunity) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tracked_communities (id, host, name, progress, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (host, name)
            DO UPDATE SET
                progress = EXCLUDED.progress,
                created_at = EXCLUDED.created_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(community.id)
        .bind(&community.host)
        .bind(&community.name)
        .bind(Json(&community.progress))
        .bind(community.created_at)
        .bind(community.updated_at)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    async fn replace_progress(
        &self,
        host: &str,
        name: &str,
        progress: &[ProgressRecord],
    ) -> AppResult<DateTime<Utc>> {
        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE tracked_communities
            SET progress = $3, updated_at = $4
            WHERE host = $1 AND name = $2
            "#,
        )
        .bind(host)
        .bind(name)
        .bind(Json(progress))
        .bind(now)
        .execute(self.db.pool())
        .await?;

        Ok(now)
    }

    async fn reset_all_progress(&self) -> AppResult<u64> {
        let result = sqlx::query("UPDATE tracked_communities SET progress = '[]'::jsonb")
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected())
    }
}
