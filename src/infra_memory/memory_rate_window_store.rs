use super::OutageSwitch;
use crate::domain_port::*;
use dashmap::DashMap;
use std::time::Duration;

#[derive(Debug, Default)]
struct EventSet {
    scores: Vec<i64>,
    expires_at_ms: i64,
}

/// In-memory stand-in for the shared ordered-event store.
#[derive(Debug, Default)]
pub struct MemoryRateWindowStore {
    sets: DashMap<String, EventSet>,
    switch: OutageSwitch,
}

impl MemoryRateWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.switch.set_offline(offline);
    }

    pub fn event_count(&self, key: &str) -> usize {
        self.sets.get(key).map(|s| s.scores.len()).unwrap_or(0)
    }

    pub fn key_count(&self) -> usize {
        self.sets.len()
    }
}

#[async_trait::async_trait]
impl RateWindowStore for MemoryRateWindowStore {
    async fn prune_and_count(&self, key: &str, window_start_ms: i64) -> Result<u64, StoreError> {
        self.switch.check("rate window store")?;
        let Some(mut set) = self.sets.get_mut(key) else {
            return Ok(0);
        };
        set.scores.retain(|&score| score > window_start_ms);
        Ok(set.scores.len() as u64)
    }

    async fn record(
        &self,
        sets: &[(String, Duration)],
        now_ms: i64,
        weight: u32,
    ) -> Result<(), StoreError> {
        self.switch.check("rate window store")?;
        // Idle sets expire the way keys with a TTL would.
        self.sets.retain(|_, set| set.expires_at_ms > now_ms);

        for (key, keep_for) in sets {
            let mut set = self.sets.entry(key.clone()).or_default();
            for _ in 0..weight {
                set.scores.push(now_ms);
            }
            set.expires_at_ms = now_ms + keep_for.as_millis() as i64;
        }
        Ok(())
    }
}
