use crate::domain_model::{RefreshToken, SubjectId};
use crate::domain_port::StoreError;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum RefreshTokenError {
    /// Unknown, revoked or expired. The cause is never exposed.
    #[error("unauthorized")]
    Unauthorized,
    #[error("subject not found")]
    NotFound,
    #[error("store error: {0}")]
    Store(String),
}

impl From<StoreError> for RefreshTokenError {
    fn from(err: StoreError) -> Self {
        RefreshTokenError::Store(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedRefreshToken {
    pub token: RefreshToken,
    pub expires_at: DateTime<Utc>,
}

/// How `rotate` consumes the presented token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationMode {
    /// Read, then an unconditional revoke. Two concurrent rotations of the
    /// same token may both succeed.
    ReadThenWrite,
    /// Conditional revoke; exactly one concurrent rotation succeeds.
    CompareAndSet,
}

#[async_trait::async_trait]
pub trait RefreshTokenService: Send + Sync {
    async fn issue(&self, subject_id: SubjectId) -> Result<IssuedRefreshToken, RefreshTokenError>;
    async fn rotate(&self, presented: &str) -> Result<IssuedRefreshToken, RefreshTokenError>;
    async fn revoke_all(&self, subject_id: SubjectId) -> Result<u64, RefreshTokenError>;
    async fn sweep_expired(&self) -> Result<u64, RefreshTokenError>;
}
