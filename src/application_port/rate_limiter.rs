use crate::domain_model::{RateClass, RateKey, RateLimitInfo};

#[async_trait::async_trait]
pub trait RateLimiter: Send + Sync {
    /// Records `weight` events when every window of `class` has room for them.
    /// Returns false on rejection and on any store failure.
    async fn try_consume(&self, key: &RateKey, class: RateClass, weight: u32) -> bool;

    async fn remaining_requests(&self, key: &RateKey, class: RateClass) -> u64;

    async fn limit_info(&self, key: &RateKey, class: RateClass) -> RateLimitInfo;
}
