use super::StoreError;
use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[async_trait::async_trait]
pub trait RefreshTokenRepo: Send + Sync {
    async fn insert(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, StoreError>;

    /// Lookup by the unique token value.
    async fn find_by_token_value(
        &self,
        token_value: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Unconditionally sets `revoked = true` on one record.
    async fn mark_revoked(&self, id: RefreshTokenId) -> Result<(), StoreError>;

    /// Sets `revoked = true` only when it is currently false.
    /// Returns whether this call performed the transition.
    async fn revoke_if_active(&self, id: RefreshTokenId) -> Result<bool, StoreError>;

    async fn revoke_all_by_subject(&self, subject_id: SubjectId) -> Result<u64, StoreError>;

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}
