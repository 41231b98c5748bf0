use super::util::{bounded, is_dup_key};
use crate::domain_model::*;
use crate::domain_port::*;
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use std::time::Duration;
use tokio::time::timeout;

pub struct MySqlRefreshTokenRepo {
    pool: MySqlPool,
    op_timeout: Duration,
}

impl MySqlRefreshTokenRepo {
    pub fn new(pool: MySqlPool, op_timeout: Duration) -> Self {
        MySqlRefreshTokenRepo { pool, op_timeout }
    }

    fn row_to_record(row: MySqlRow) -> Result<RefreshTokenRecord, StoreError> {
        Ok(RefreshTokenRecord {
            id: row.try_get("id")?,
            subject_id: row.try_get("subject_id")?,
            token_value: row.try_get("token_value")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
            rotated_at: row.try_get("rotated_at")?,
            revoked: row.try_get("revoked")?,
        })
    }
}

#[async_trait::async_trait]
impl RefreshTokenRepo for MySqlRefreshTokenRepo {
    async fn insert(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, StoreError> {
        let insert = sqlx::query(
            r#"
INSERT INTO refresh_token (subject_id, token_value, created_at, expires_at, rotated_at, revoked)
VALUES (?, ?, ?, ?, ?, FALSE)
"#,
        )
        .bind(token.subject_id)
        .bind(&token.token_value)
        .bind(token.created_at)
        .bind(token.expires_at)
        .bind(token.rotated_at)
        .execute(&self.pool);
        let result = timeout(self.op_timeout, insert).await?.map_err(|e| {
            if is_dup_key(&e) {
                StoreError::Internal(anyhow!("duplicate refresh token value"))
            } else {
                StoreError::from(e)
            }
        })?;

        Ok(RefreshTokenRecord {
            id: RefreshTokenId(result.last_insert_id() as i64),
            subject_id: token.subject_id,
            token_value: token.token_value,
            created_at: token.created_at,
            expires_at: token.expires_at,
            rotated_at: token.rotated_at,
            revoked: false,
        })
    }

    async fn find_by_token_value(
        &self,
        token_value: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let query = sqlx::query(
            r#"
SELECT id, subject_id, token_value, created_at, expires_at, rotated_at, revoked
FROM refresh_token
WHERE token_value = ?
"#,
        )
        .bind(token_value);
        let row_opt: Option<MySqlRow> =
            bounded(self.op_timeout, query.fetch_optional(&self.pool)).await?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn mark_revoked(&self, id: RefreshTokenId) -> Result<(), StoreError> {
        let query = sqlx::query("UPDATE refresh_token SET revoked = TRUE WHERE id = ?").bind(id);
        bounded(self.op_timeout, query.execute(&self.pool)).await?;
        Ok(())
    }

    async fn revoke_if_active(&self, id: RefreshTokenId) -> Result<bool, StoreError> {
        let query =
            sqlx::query("UPDATE refresh_token SET revoked = TRUE WHERE id = ? AND revoked = FALSE")
                .bind(id);
        let result = bounded(self.op_timeout, query.execute(&self.pool)).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn revoke_all_by_subject(&self, subject_id: SubjectId) -> Result<u64, StoreError> {
        let query = sqlx::query(
            "UPDATE refresh_token SET revoked = TRUE WHERE subject_id = ? AND revoked = FALSE",
        )
        .bind(subject_id);
        let result = bounded(self.op_timeout, query.execute(&self.pool)).await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let query = sqlx::query("DELETE FROM refresh_token WHERE expires_at <= ?").bind(now);
        let result = bounded(self.op_timeout, query.execute(&self.pool)).await?;
        Ok(result.rows_affected())
    }
}
