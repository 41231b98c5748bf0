use crate::domain_port::*;
use nanoid::nanoid;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tokio::time::timeout;

/// Sorted sets scored by epoch millis. Members carry a random suffix so
/// events landing in the same millisecond are all counted.
pub struct RedisRateWindowStore {
    conn: ConnectionManager,
    op_timeout: Duration,
}

impl RedisRateWindowStore {
    pub fn new(conn: ConnectionManager, op_timeout: Duration) -> Self {
        RedisRateWindowStore { conn, op_timeout }
    }
}

#[async_trait::async_trait]
impl RateWindowStore for RedisRateWindowStore {
    async fn prune_and_count(&self, key: &str, window_start_ms: i64) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let (count,): (u64,) = timeout(
            self.op_timeout,
            redis::pipe()
                .atomic()
                .zrembyscore(key, "-inf", window_start_ms)
                .ignore()
                .zcard(key)
                .query_async(&mut conn),
        )
        .await??;
        Ok(count)
    }

    async fn record(
        &self,
        sets: &[(String, Duration)],
        now_ms: i64,
        weight: u32,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, keep_for) in sets {
            for _ in 0..weight {
                pipe.zadd(key, format!("{}-{}", now_ms, nanoid!(8)), now_ms)
                    .ignore();
            }
            pipe.pexpire(key, keep_for.as_millis() as i64).ignore();
        }

        let _: () = timeout(self.op_timeout, pipe.query_async(&mut conn)).await??;
        Ok(())
    }
}
