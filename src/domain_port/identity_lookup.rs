use super::StoreError;
use crate::domain_model::SubjectId;

#[async_trait::async_trait]
pub trait IdentityLookup: Send + Sync {
    async fn exists(&self, subject_id: SubjectId) -> Result<bool, StoreError>;
}
