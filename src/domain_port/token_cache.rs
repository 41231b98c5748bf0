use super::StoreError;
use std::time::Duration;

/// Shared key/value store with native TTL (tier-1).
#[async_trait::async_trait]
pub trait TokenCache: Send + Sync {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Remaining lifetime, `None` when the key is missing or has no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;
}
