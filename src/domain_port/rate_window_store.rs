use super::StoreError;
use std::time::Duration;

/// Ordered event sets keyed by string, scored by epoch milliseconds.
#[async_trait::async_trait]
pub trait RateWindowStore: Send + Sync {
    /// Drops events scored at or before `window_start_ms` and returns
    /// how many remain.
    async fn prune_and_count(&self, key: &str, window_start_ms: i64) -> Result<u64, StoreError>;

    /// Adds `weight` events at `now_ms` to every set in `sets`, each paired
    /// with the expiry it should carry afterwards. All sets are written in
    /// one call: either every set gets the events or none does.
    async fn record(
        &self,
        sets: &[(String, Duration)],
        now_ms: i64,
        weight: u32,
    ) -> Result<(), StoreError>;
}
