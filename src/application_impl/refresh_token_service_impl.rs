use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::application_impl::generate_refresh_token;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct RealRefreshTokenService {
    repo: Arc<dyn RefreshTokenRepo>,
    identity: Arc<dyn IdentityLookup>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
    rotation: RotationMode,
}

impl RealRefreshTokenService {
    pub fn new(
        repo: Arc<dyn RefreshTokenRepo>,
        identity: Arc<dyn IdentityLookup>,
        clock: Arc<dyn Clock>,
        ttl: chrono::Duration,
        rotation: RotationMode,
    ) -> Self {
        Self {
            repo,
            identity,
            clock,
            ttl,
            rotation,
        }
    }

    /// Consumes the presented record. Revocation happens before any new
    /// token exists, so a failed reissue leaves the old token dead.
    async fn consume(&self, record: &RefreshTokenRecord) -> Result<(), RefreshTokenError> {
        match self.rotation {
            RotationMode::ReadThenWrite => {
                self.repo.mark_revoked(record.id).await?;
            }
            RotationMode::CompareAndSet => {
                if !self.repo.revoke_if_active(record.id).await? {
                    warn!(
                        target: "security",
                        subject_id = %record.subject_id,
                        "refresh token already consumed by a concurrent rotation"
                    );
                    return Err(RefreshTokenError::Unauthorized);
                }
            }
        }
        debug!(target: "security", subject_id = %record.subject_id, "old refresh token revoked");
        Ok(())
    }
}

#[async_trait::async_trait]
impl RefreshTokenService for RealRefreshTokenService {
    async fn issue(&self, subject_id: SubjectId) -> Result<IssuedRefreshToken, RefreshTokenError> {
        if !self.identity.exists(subject_id).await? {
            return Err(RefreshTokenError::NotFound);
        }

        // One live token per subject.
        self.repo.revoke_all_by_subject(subject_id).await?;

        let now = self.clock.now();
        let record = self
            .repo
            .insert(NewRefreshToken {
                subject_id,
                token_value: generate_refresh_token(),
                created_at: now,
                expires_at: now + self.ttl,
                rotated_at: now,
            })
            .await?;

        debug!(target: "security", %subject_id, "refresh token created");
        Ok(IssuedRefreshToken {
            token: RefreshToken(record.token_value),
            expires_at: record.expires_at,
        })
    }

    async fn rotate(&self, presented: &str) -> Result<IssuedRefreshToken, RefreshTokenError> {
        if !has_text(presented) {
            return Err(RefreshTokenError::Unauthorized);
        }

        let Some(record) = self.repo.find_by_token_value(presented).await? else {
            warn!(target: "security", "unknown refresh token presented");
            return Err(RefreshTokenError::Unauthorized);
        };

        let state = record.state(self.clock.now());
        if state != RefreshTokenState::Active {
            warn!(
                target: "security",
                subject_id = %record.subject_id,
                ?state,
                "refresh token rejected"
            );
            return Err(RefreshTokenError::Unauthorized);
        }

        self.consume(&record).await?;
        self.issue(record.subject_id).await
    }

    async fn revoke_all(&self, subject_id: SubjectId) -> Result<u64, RefreshTokenError> {
        let revoked = self.repo.revoke_all_by_subject(subject_id).await?;
        info!(target: "security", %subject_id, revoked, "all refresh tokens revoked");
        Ok(revoked)
    }

    async fn sweep_expired(&self) -> Result<u64, RefreshTokenError> {
        let deleted = self.repo.delete_expired(self.clock.now()).await?;
        info!(target: "security", deleted, "expired refresh tokens cleaned up");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::*;

    struct Fixture {
        repo: Arc<MemoryRefreshTokenRepo>,
        identity: Arc<MemoryIdentityLookup>,
        clock: Arc<ManualClock>,
        service: RealRefreshTokenService,
    }

    fn fixture(rotation: RotationMode) -> Fixture {
        let repo = Arc::new(MemoryRefreshTokenRepo::new());
        let identity = Arc::new(MemoryIdentityLookup::with_subjects([SubjectId(7)]));
        let clock = Arc::new(ManualClock::default());
        let service = RealRefreshTokenService::new(
            repo.clone(),
            identity.clone(),
            clock.clone(),
            chrono::Duration::days(7),
            rotation,
        );
        Fixture {
            repo,
            identity,
            clock,
            service,
        }
    }

    async fn active_count(f: &Fixture, subject_id: SubjectId) -> usize {
        let now = f.clock.now();
        f.repo
            .records_for(subject_id)
            .iter()
            .filter(|r| r.is_active(now))
            .count()
    }

    #[tokio::test]
    async fn issue_unknown_subject_is_not_found() {
        let f = fixture(RotationMode::CompareAndSet);
        let err = f.service.issue(SubjectId(99)).await.unwrap_err();
        assert!(matches!(err, RefreshTokenError::NotFound));
        assert!(f.repo.is_empty());
    }

    #[tokio::test]
    async fn issue_leaves_exactly_one_active_record() {
        let f = fixture(RotationMode::CompareAndSet);
        for _ in 0..3 {
            let issued = f.service.issue(SubjectId(7)).await.unwrap();
            assert_eq!(issued.expires_at, f.clock.now() + chrono::Duration::days(7));
            assert_eq!(active_count(&f, SubjectId(7)).await, 1);
        }
        assert_eq!(f.repo.len(), 3);
    }

    #[tokio::test]
    async fn reissue_invalidates_the_previous_token() {
        let f = fixture(RotationMode::CompareAndSet);
        let first = f.service.issue(SubjectId(7)).await.unwrap();
        let second = f.service.issue(SubjectId(7)).await.unwrap();

        let err = f.service.rotate(&first.token.0).await.unwrap_err();
        assert!(matches!(err, RefreshTokenError::Unauthorized));

        let rotated = f.service.rotate(&second.token.0).await.unwrap();
        assert_ne!(rotated.token, second.token);
    }

    #[tokio::test]
    async fn rotate_consumes_the_old_token() {
        let f = fixture(RotationMode::ReadThenWrite);
        let issued = f.service.issue(SubjectId(7)).await.unwrap();
        let rotated = f.service.rotate(&issued.token.0).await.unwrap();

        assert!(f.service.rotate(&issued.token.0).await.is_err());
        assert!(f.service.rotate(&rotated.token.0).await.is_ok());
    }

    #[tokio::test]
    async fn rotate_rejects_blank_unknown_and_expired_alike() {
        let f = fixture(RotationMode::CompareAndSet);
        let issued = f.service.issue(SubjectId(7)).await.unwrap();

        assert!(matches!(
            f.service.rotate("  ").await,
            Err(RefreshTokenError::Unauthorized)
        ));
        assert!(matches!(
            f.service.rotate("not-a-token").await,
            Err(RefreshTokenError::Unauthorized)
        ));

        f.clock.advance(std::time::Duration::from_secs(7 * 24 * 60 * 60));
        assert!(matches!(
            f.service.rotate(&issued.token.0).await,
            Err(RefreshTokenError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn failed_reissue_still_leaves_old_token_revoked() {
        let f = fixture(RotationMode::CompareAndSet);
        let issued = f.service.issue(SubjectId(7)).await.unwrap();

        f.repo.fail_inserts(true);
        let err = f.service.rotate(&issued.token.0).await.unwrap_err();
        assert!(matches!(err, RefreshTokenError::Store(_)));

        f.repo.fail_inserts(false);
        assert!(matches!(
            f.service.rotate(&issued.token.0).await,
            Err(RefreshTokenError::Unauthorized)
        ));
        assert_eq!(active_count(&f, SubjectId(7)).await, 0);
    }

    #[tokio::test]
    async fn deleted_subject_cannot_rotate_and_old_token_dies() {
        let f = fixture(RotationMode::CompareAndSet);
        let issued = f.service.issue(SubjectId(7)).await.unwrap();
        f.identity.remove(SubjectId(7));

        assert!(matches!(
            f.service.rotate(&issued.token.0).await,
            Err(RefreshTokenError::NotFound)
        ));
        assert_eq!(active_count(&f, SubjectId(7)).await, 0);
    }

    #[tokio::test]
    async fn revoke_all_kills_every_token_of_the_subject() {
        let f = fixture(RotationMode::CompareAndSet);
        let issued = f.service.issue(SubjectId(7)).await.unwrap();

        assert_eq!(f.service.revoke_all(SubjectId(7)).await.unwrap(), 1);
        assert!(f.service.rotate(&issued.token.0).await.is_err());
        assert_eq!(active_count(&f, SubjectId(7)).await, 0);
    }

    #[tokio::test]
    async fn sweep_deletes_only_expired_rows() {
        let f = fixture(RotationMode::CompareAndSet);
        f.identity.add(SubjectId(8));
        f.service.issue(SubjectId(7)).await.unwrap();
        f.clock.advance(std::time::Duration::from_secs(3 * 24 * 60 * 60));
        let fresh = f.service.issue(SubjectId(8)).await.unwrap();
        f.clock.advance(std::time::Duration::from_secs(5 * 24 * 60 * 60));

        assert_eq!(f.service.sweep_expired().await.unwrap(), 1);
        assert_eq!(f.repo.len(), 1);
        assert!(f.service.rotate(&fresh.token.0).await.is_ok());
    }

    #[tokio::test]
    async fn store_outage_surfaces_as_store_error() {
        let f = fixture(RotationMode::CompareAndSet);
        f.repo.set_offline(true);
        assert!(matches!(
            f.service.issue(SubjectId(7)).await,
            Err(RefreshTokenError::Store(_))
        ));
    }
}
