use serde::Serialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum AntiForgeryError {
    #[error("session key must not be blank")]
    BlankSessionKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenTier {
    Primary,
    Fallback,
}

#[derive(Clone)]
pub struct AntiForgeryToken {
    pub value: String,
    pub tier: TokenTier,
}

impl fmt::Debug for AntiForgeryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AntiForgeryToken")
            .field("tier", &self.tier)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
pub trait AntiForgeryTokenProvider: Send + Sync {
    async fn issue(&self, session_key: &str) -> Result<AntiForgeryToken, AntiForgeryError>;
    async fn validate(&self, session_key: &str, presented: &str) -> bool;
    async fn invalidate(&self, session_key: &str);
    async fn remaining_ttl(&self, session_key: &str) -> Option<Duration>;
    /// True while the process-local store holds a live token.
    fn fallback_active(&self) -> bool;
}
