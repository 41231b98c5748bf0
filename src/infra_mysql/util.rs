use crate::domain_port::StoreError;
use sqlx::MySqlPool;
use sqlx::mysql::{MySqlDatabaseError, MySqlPoolOptions};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

pub async fn connect_pool(dsn: &str, acquire_timeout: Duration) -> anyhow::Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .acquire_timeout(acquire_timeout)
        .connect(dsn)
        .await?;
    Ok(pool)
}

/// Runs one query under `op_timeout`; a stalled server surfaces as
/// `StoreError::Timeout` instead of holding the request.
pub async fn bounded<T, F>(op_timeout: Duration, query: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    Ok(timeout(op_timeout, query).await??)
}

pub fn is_dup_key(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db) = err {
        if let Some(mysql_err) = db.try_downcast_ref::<MySqlDatabaseError>() {
            return mysql_err.number() == 1062; // ER_DUP_ENTRY
        }
    }

    false
}
