use crate::application_port::RateLimiter;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Extra lifetime given to each event set beyond its window.
const EXPIRY_SLACK: Duration = Duration::from_secs(1);

/// Sliding-window limiter over one ordered event set per (class, key, window).
///
/// Fails closed: when the store cannot be reached the request is refused.
pub struct RealRateLimiter {
    store: Arc<dyn RateWindowStore>,
    policy: RatePolicy,
    clock: Arc<dyn Clock>,
    prefix: String,
}

impl RealRateLimiter {
    pub fn new(
        store: Arc<dyn RateWindowStore>,
        policy: RatePolicy,
        clock: Arc<dyn Clock>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            policy,
            clock,
            prefix: prefix.into(),
        }
    }

    pub fn policy(&self) -> &RatePolicy {
        &self.policy
    }

    fn window_key(&self, key: &RateKey, class: RateClass, window: &RateWindow) -> String {
        format!("{}:{}:{}:{}", self.prefix, class, key, window.label)
    }

    fn window_start(now_ms: i64, window: &RateWindow) -> i64 {
        now_ms - window.size.as_millis() as i64
    }

    async fn check_and_record(
        &self,
        key: &RateKey,
        class: RateClass,
        weight: u32,
    ) -> Result<bool, StoreError> {
        let now_ms = self.clock.now().timestamp_millis();
        let windows = self.policy.windows(class);

        // Every window must have room before anything is recorded.
        for window in &windows {
            let count = self
                .store
                .prune_and_count(
                    &self.window_key(key, class, window),
                    Self::window_start(now_ms, window),
                )
                .await?;
            if count + u64::from(weight) > u64::from(window.limit) {
                warn!(
                    target: "security",
                    %key,
                    %class,
                    window = window.label,
                    count,
                    limit = window.limit,
                    "rate limit exceeded"
                );
                return Ok(false);
            }
        }

        let sets: Vec<(String, Duration)> = windows
            .iter()
            .map(|window| {
                (
                    self.window_key(key, class, window),
                    window.size + EXPIRY_SLACK,
                )
            })
            .collect();
        self.store.record(&sets, now_ms, weight).await?;
        Ok(true)
    }
}

#[async_trait::async_trait]
impl RateLimiter for RealRateLimiter {
    async fn try_consume(&self, key: &RateKey, class: RateClass, weight: u32) -> bool {
        let weight = weight.max(1);
        let (allowed, outcome) = match self.check_and_record(key, class, weight).await {
            Ok(true) => (true, "allowed"),
            Ok(false) => (false, "blocked"),
            Err(e) => {
                error!(
                    target: "security",
                    %key,
                    %class,
                    error = %e,
                    "rate limit store failure, rejecting request"
                );
                (false, "store_error")
            }
        };
        info!(target: "rate_limit", %class, outcome, weight, "rate_limit.requests");
        allowed
    }

    async fn remaining_requests(&self, key: &RateKey, class: RateClass) -> u64 {
        let [minute, _] = self.policy.windows(class);
        let now_ms = self.clock.now().timestamp_millis();
        match self
            .store
            .prune_and_count(
                &self.window_key(key, class, &minute),
                Self::window_start(now_ms, &minute),
            )
            .await
        {
            Ok(count) => u64::from(minute.limit).saturating_sub(count),
            Err(e) => {
                warn!(target: "security", %key, %class, error = %e, "rate limit lookup failed");
                0
            }
        }
    }

    async fn limit_info(&self, key: &RateKey, class: RateClass) -> RateLimitInfo {
        let limits = self.policy.limits(class);
        RateLimitInfo {
            per_minute: limits.per_minute,
            per_hour: limits.per_hour,
            remaining_this_minute: self.remaining_requests(key, class).await,
        }
    }
}
