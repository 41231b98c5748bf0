use super::SubjectId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, sqlx::Type)]
#[sqlx(transparent)]
pub struct RefreshTokenId(pub i64);

impl fmt::Display for RefreshTokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque refresh token value handed to the client.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct RefreshToken(pub String);

// Token values stay out of logs.
impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshToken(..)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTokenState {
    Active,
    Revoked,
    Expired,
}

#[derive(Clone)]
pub struct RefreshTokenRecord {
    pub id: RefreshTokenId,
    pub subject_id: SubjectId,
    pub token_value: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub rotated_at: DateTime<Utc>,
    pub revoked: bool,
}

impl RefreshTokenRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Revocation is reported before expiry when both hold.
    pub fn state(&self, now: DateTime<Utc>) -> RefreshTokenState {
        if self.revoked {
            RefreshTokenState::Revoked
        } else if self.is_expired(now) {
            RefreshTokenState::Expired
        } else {
            RefreshTokenState::Active
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.state(now) == RefreshTokenState::Active
    }
}

impl fmt::Debug for RefreshTokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshTokenRecord")
            .field("id", &self.id)
            .field("subject_id", &self.subject_id)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("rotated_at", &self.rotated_at)
            .field("revoked", &self.revoked)
            .finish_non_exhaustive()
    }
}

/// Insert payload; the store assigns the id.
#[derive(Clone)]
pub struct NewRefreshToken {
    pub subject_id: SubjectId,
    pub token_value: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub rotated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(revoked: bool, expires_in: Duration) -> RefreshTokenRecord {
        let now = Utc::now();
        RefreshTokenRecord {
            id: RefreshTokenId(1),
            subject_id: SubjectId(7),
            token_value: "abc".to_string(),
            created_at: now,
            expires_at: now + expires_in,
            rotated_at: now,
            revoked,
        }
    }

    #[test]
    fn fresh_record_is_active() {
        let rec = record(false, Duration::days(7));
        assert_eq!(rec.state(Utc::now()), RefreshTokenState::Active);
    }

    #[test]
    fn revoked_wins_over_expired() {
        let rec = record(true, Duration::seconds(-5));
        assert_eq!(rec.state(Utc::now()), RefreshTokenState::Revoked);
    }

    #[test]
    fn expiry_boundary_counts_as_expired() {
        let rec = record(false, Duration::zero());
        assert!(rec.is_expired(rec.expires_at));
        assert!(!rec.is_active(rec.expires_at));
    }

    #[test]
    fn debug_output_hides_token_value() {
        let rec = record(false, Duration::days(1));
        let out = format!("{rec:?}");
        assert!(!out.contains("abc"));
        assert_eq!(format!("{:?}", RefreshToken("secret".into())), "RefreshToken(..)");
    }
}
