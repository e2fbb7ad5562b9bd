use crate::{database::Database, error::AppResult, models::BotAccount};

use super::AccountStore;

/// 机器人账号仓库（PostgreSQL）
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: Database,
}

impl AccountRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl AccountStore for AccountRepository {
    async fn load_active(&self) -> AppResult<Vec<BotAccount>> {
        let accounts = sqlx::query_as::<_, BotAccount>(
            r#"
            SELECT host, username, password, jwt, active, position
            FROM bot_accounts
            WHERE active = TRUE
            ORDER BY position ASC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(accounts)
    }

    async fn load_all(&self) -> AppResult<Vec<BotAccount>> {
        let accounts = sqlx::query_as::<_, BotAccount>(
            "SELECT host, username, password, jwt, active, position FROM bot_accounts ORDER BY position ASC",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(accounts)
    }

    async fn find(&self, host: &str) -> AppResult<Option<BotAccount>> {
        let account = sqlx::query_as::<_, BotAccount>(
            "SELECT host, username, password, jwt, active, position FROM bot_accounts WHERE host = $1",
        )
        .bind(host)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(account)
    }

    async fn upsert(&self, account: &BotAccount) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bot_accounts (host, username, password, jwt, active, position)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (host)
            DO UPDATE SET
                username = EXCLUDED.username,
                password = EXCLUDED.password,
                jwt = EXCLUDED.jwt,
                active = EXCLUDED.active,
                position = EXCLUDED.position
            "#,
        )
        .bind(&account.host)
        .bind(&account.username)
        .bind(&account.password)
        .bind(&account.jwt)
        .bind(account.active)
        .bind(account.position)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    async fn replace_all(&self, accounts: &[BotAccount]) -> AppResult<()> {
        let mut tx = self.db.pool().begin().await?;

        sqlx::query("DELETE FROM bot_accounts")
            .execute(&mut *tx)
            .await?;

        for account in accounts {
            sqlx::query(
                r#"
                INSERT INTO bot_accounts (host, username, password, jwt, active, position)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(&account.host)
            .bind(&account.username)
            .bind(&account.password)
            .bind(&account.jwt)
            .bind(account.active)
            .bind(account.position)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!("账号列表已同步，共 {} 个", accounts.len());
        Ok(())
    }
}
