use super::OutageSwitch;
use crate::domain_model::*;
use crate::domain_port::*;
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Default)]
pub struct MemoryRefreshTokenRepo {
    records: DashMap<RefreshTokenId, RefreshTokenRecord>,
    next_id: AtomicI64,
    switch: OutageSwitch,
    insert_switch: OutageSwitch,
}

impl MemoryRefreshTokenRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.switch.set_offline(offline);
    }

    /// Makes only inserts fail, leaving reads and revocations working.
    pub fn fail_inserts(&self, fail: bool) {
        self.insert_switch.set_offline(fail);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every record owned by `subject_id`, oldest first.
    pub fn records_for(&self, subject_id: SubjectId) -> Vec<RefreshTokenRecord> {
        let mut records: Vec<_> = self
            .records
            .iter()
            .filter(|r| r.value().subject_id == subject_id)
            .map(|r| r.value().clone())
            .collect();
        records.sort_by_key(|r| r.id);
        records
    }
}

#[async_trait::async_trait]
impl RefreshTokenRepo for MemoryRefreshTokenRepo {
    async fn insert(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, StoreError> {
        self.switch.check("refresh token repo")?;
        self.insert_switch.check("refresh token repo")?;
        if self
            .records
            .iter()
            .any(|r| r.value().token_value == token.token_value)
        {
            return Err(StoreError::Internal(anyhow!("duplicate token value")));
        }

        let id = RefreshTokenId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let record = RefreshTokenRecord {
            id,
            subject_id: token.subject_id,
            token_value: token.token_value,
            created_at: token.created_at,
            expires_at: token.expires_at,
            rotated_at: token.rotated_at,
            revoked: false,
        };
        self.records.insert(id, record.clone());
        Ok(record)
    }

    async fn find_by_token_value(
        &self,
        token_value: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        self.switch.check("refresh token repo")?;
        Ok(self
            .records
            .iter()
            .find(|r| r.value().token_value == token_value)
            .map(|r| r.value().clone()))
    }

    async fn mark_revoked(&self, id: RefreshTokenId) -> Result<(), StoreError> {
        self.switch.check("refresh token repo")?;
        if let Some(mut record) = self.records.get_mut(&id) {
            record.revoked = true;
        }
        Ok(())
    }

    async fn revoke_if_active(&self, id: RefreshTokenId) -> Result<bool, StoreError> {
        self.switch.check("refresh token repo")?;
        match self.records.get_mut(&id) {
            Some(mut record) if !record.revoked => {
                record.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_by_subject(&self, subject_id: SubjectId) -> Result<u64, StoreError> {
        self.switch.check("refresh token repo")?;
        let mut touched = 0;
        for mut record in self.records.iter_mut() {
            if record.subject_id == subject_id && !record.revoked {
                record.revoked = true;
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.switch.check("refresh token repo")?;
        let before = self.records.len();
        self.records.retain(|_, r| !r.is_expired(now));
        Ok(before.saturating_sub(self.records.len()) as u64)
    }
}
