use super::OutageSwitch;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// In-memory stand-in for the shared TTL store.
pub struct MemoryTokenCache {
    entries: DashMap<String, (String, DateTime<Utc>)>,
    clock: Arc<dyn Clock>,
    switch: OutageSwitch,
}

impl MemoryTokenCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            switch: OutageSwitch::default(),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.switch.set_offline(offline);
    }

    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.entries
            .get(key)
            .map(|e| now < e.value().1)
            .unwrap_or(false)
    }

    fn live(&self, key: &str) -> Option<(String, DateTime<Utc>)> {
        let now = self.clock.now();
        let entry = self.entries.get(key).map(|e| e.value().clone())?;
        if now >= entry.1 {
            self.entries.remove_if(key, |_, e| now >= e.1);
            return None;
        }
        Some(entry)
    }
}

#[async_trait::async_trait]
impl TokenCache for MemoryTokenCache {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.switch.check("token cache")?;
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| StoreError::Internal(e.into()))?;
        let expires_at = self.clock.now() + ttl;
        self.entries
            .insert(key.to_owned(), (value.to_owned(), expires_at));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.switch.check("token cache")?;
        Ok(self.live(key).map(|(value, _)| value))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.switch.check("token cache")?;
        self.entries.remove(key);
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        self.switch.check("token cache")?;
        let now = self.clock.now();
        Ok(self
            .live(key)
            .and_then(|(_, expires_at)| (expires_at - now).to_std().ok()))
    }
}
