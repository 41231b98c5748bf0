use crate::application_impl::{constant_time_eq, generate_anti_forgery_token};
use crate::application_port::*;
use crate::domain_model::has_text;
use crate::domain_port::*;
use crate::infra_memory::LocalTokenStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Issues per-session anti-forgery tokens.
///
/// Every call picks its tier independently: the shared cache when it
/// answers, the process-local store when it does not. Issuing never fails
/// because of storage; validation never fails open.
pub struct RealAntiForgeryTokenProvider {
    cache: Arc<dyn TokenCache>,
    local: Arc<LocalTokenStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    prefix: String,
}

impl RealAntiForgeryTokenProvider {
    pub fn new(
        cache: Arc<dyn TokenCache>,
        local: Arc<LocalTokenStore>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            local,
            clock,
            ttl,
            prefix: prefix.into(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(&self, session_key: &str) -> String {
        format!("{}:{}", self.prefix, session_key)
    }

    fn write_local(&self, session_key: &str, token: &str) -> Result<(), StoreError> {
        let ttl = chrono::Duration::from_std(self.ttl).map_err(|e| StoreError::Internal(e.into()))?;
        let now = self.clock.now();
        self.local.put(session_key, token, now + ttl);
        self.local.sweep_expired(now);
        Ok(())
    }
}

#[async_trait::async_trait]
impl AntiForgeryTokenProvider for RealAntiForgeryTokenProvider {
    async fn issue(&self, session_key: &str) -> Result<AntiForgeryToken, AntiForgeryError> {
        if !has_text(session_key) {
            return Err(AntiForgeryError::BlankSessionKey);
        }

        self.invalidate(session_key).await;

        let token = generate_anti_forgery_token();
        let tier = match self
            .cache
            .set_with_ttl(&self.key(session_key), &token, self.ttl)
            .await
        {
            Ok(()) => TokenTier::Primary,
            Err(e) => {
                warn!(
                    target: "security",
                    %session_key,
                    error = %e,
                    "anti-forgery cache write failed, using local store"
                );
                if let Err(e) = self.write_local(session_key, &token) {
                    // The token is still returned; validation will refuse it.
                    warn!(target: "security", %session_key, error = %e, "local store write failed");
                }
                TokenTier::Fallback
            }
        };

        debug!(target: "security", %session_key, ?tier, "anti-forgery token issued");
        Ok(AntiForgeryToken { value: token, tier })
    }

    async fn validate(&self, session_key: &str, presented: &str) -> bool {
        if !has_text(session_key) || !has_text(presented) {
            return false;
        }

        // A live local entry is always newer than whatever the cache holds:
        // a successful cache write clears the local store first.
        if let Some(entry) = self.local.get_live(session_key, self.clock.now()) {
            return constant_time_eq(&entry.token, presented);
        }

        match self.cache.get(&self.key(session_key)).await {
            Ok(Some(stored)) => constant_time_eq(&stored, presented),
            Ok(None) => false,
            Err(e) => {
                warn!(
                    target: "security",
                    %session_key,
                    error = %e,
                    "anti-forgery cache read failed, no local token"
                );
                false
            }
        }
    }

    async fn invalidate(&self, session_key: &str) {
        if !has_text(session_key) {
            return;
        }

        if let Err(e) = self.cache.delete(&self.key(session_key)).await {
            warn!(
                target: "security",
                %session_key,
                error = %e,
                "anti-forgery cache delete failed, clearing local store only"
            );
        }
        self.local.remove(session_key);
    }

    async fn remaining_ttl(&self, session_key: &str) -> Option<Duration> {
        if !has_text(session_key) {
            return None;
        }

        let now = self.clock.now();
        if let Some(entry) = self.local.get_live(session_key, now) {
            return entry.remaining(now);
        }

        match self.cache.ttl(&self.key(session_key)).await {
            Ok(Some(ttl)) if !ttl.is_zero() => Some(ttl),
            Ok(_) => None,
            Err(e) => {
                warn!(
                    target: "security",
                    %session_key,
                    error = %e,
                    "anti-forgery cache ttl lookup failed"
                );
                None
            }
        }
    }

    fn fallback_active(&self) -> bool {
        self.local.has_live(self.clock.now())
    }
}
