use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LocalTokenEntry {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl LocalTokenEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        (self.expires_at - now)
            .to_std()
            .ok()
            .filter(|d| !d.is_zero())
    }
}

/// Process-local anti-forgery tokens with manually tracked expiry.
///
/// Written only while the shared store is unreachable. Entries are never
/// copied back to the shared store; they leave through expiry, the periodic
/// sweep or an explicit removal.
#[derive(Debug, Default)]
pub struct LocalTokenStore {
    entries: DashMap<String, LocalTokenEntry>,
}

impl LocalTokenStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn put(&self, key: &str, token: &str, expires_at: DateTime<Utc>) {
        self.entries.insert(
            key.to_owned(),
            LocalTokenEntry {
                token: token.to_owned(),
                expires_at,
            },
        );
    }

    /// Returns the entry when present and not expired; stale entries are dropped.
    pub fn get_live(&self, key: &str, now: DateTime<Utc>) -> Option<LocalTokenEntry> {
        let entry = self.entries.get(key).map(|e| e.value().clone())?;
        if entry.is_expired(now) {
            self.entries.remove_if(key, |_, e| e.is_expired(now));
            return None;
        }
        Some(entry)
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn has_live(&self, now: DateTime<Utc>) -> bool {
        self.entries.iter().any(|e| !e.value().is_expired(now))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn expired_entry_is_not_returned_and_is_dropped() {
        let store = LocalTokenStore::new();
        let now = Utc::now();
        store.put("s1", "tok", now + ChronoDuration::seconds(10));

        assert_eq!(store.get_live("s1", now).map(|e| e.token), Some("tok".into()));
        assert!(store.get_live("s1", now + ChronoDuration::seconds(10)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let store = LocalTokenStore::new();
        let now = Utc::now();
        store.put("old", "a", now - ChronoDuration::seconds(1));
        store.put("new", "b", now + ChronoDuration::minutes(60));

        assert_eq!(store.sweep_expired(now), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get_live("new", now).is_some());
        assert!(store.has_live(now));
    }

    #[test]
    fn remaining_is_none_at_expiry() {
        let now = Utc::now();
        let entry = LocalTokenEntry {
            token: "t".into(),
            expires_at: now + ChronoDuration::seconds(30),
        };
        assert_eq!(entry.remaining(now), Some(Duration::from_secs(30)));
        assert_eq!(entry.remaining(entry.expires_at), None);
    }

    #[test]
    fn concurrent_writers_and_sweeper_do_not_lose_live_entries() {
        let store = std::sync::Arc::new(LocalTokenStore::new());
        let now = Utc::now();
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        store.put(
                            &format!("k{n}-{i}"),
                            "tok",
                            now + ChronoDuration::minutes(5),
                        );
                        store.sweep_expired(now);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 800);
    }
}
