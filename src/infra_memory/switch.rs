use crate::domain_port::StoreError;
use std::sync::atomic::{AtomicBool, Ordering};

/// Availability toggle for in-memory adapters, used to simulate outages.
#[derive(Debug, Default)]
pub struct OutageSwitch {
    offline: AtomicBool,
}

impl OutageSwitch {
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    pub fn check(&self, store: &str) -> Result<(), StoreError> {
        if self.is_offline() {
            Err(StoreError::Unavailable(format!("{store} offline")))
        } else {
            Ok(())
        }
    }
}
