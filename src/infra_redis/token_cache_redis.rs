use crate::domain_port::*;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tokio::time::timeout;

pub struct RedisTokenCache {
    conn: ConnectionManager,
    op_timeout: Duration,
}

impl RedisTokenCache {
    pub fn new(conn: ConnectionManager, op_timeout: Duration) -> Self {
        RedisTokenCache { conn, op_timeout }
    }
}

#[async_trait::async_trait]
impl TokenCache for RedisTokenCache {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let millis = ttl.as_millis().max(1) as u64;
        let _: () = timeout(self.op_timeout, conn.pset_ex(key, value, millis)).await??;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = timeout(self.op_timeout, conn.get(key)).await??;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = timeout(self.op_timeout, conn.del(key)).await??;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.conn.clone();
        // -2: missing key, -1: no expiry
        let millis: i64 = timeout(self.op_timeout, conn.pttl(key)).await??;
        Ok((millis > 0).then(|| Duration::from_millis(millis as u64)))
    }
}
