use crate::application_port::RefreshTokenService;
use crate::domain_port::Clock;
use crate::infra_memory::LocalTokenStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Periodic storage-growth bounds: expired refresh-token rows and expired
/// entries of the local anti-forgery store.
pub struct MaintenanceSweeper {
    refresh_tokens: Arc<dyn RefreshTokenService>,
    local_tokens: Arc<LocalTokenStore>,
    clock: Arc<dyn Clock>,
    refresh_interval: Duration,
    local_interval: Duration,
    cancellation_token: CancellationToken,
}

impl MaintenanceSweeper {
    pub fn new(
        refresh_tokens: Arc<dyn RefreshTokenService>,
        local_tokens: Arc<LocalTokenStore>,
        clock: Arc<dyn Clock>,
        refresh_interval: Duration,
        local_interval: Duration,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            refresh_tokens,
            local_tokens,
            clock,
            refresh_interval,
            local_interval,
            cancellation_token,
        }
    }

    pub async fn sweep_refresh_tokens(&self) {
        if let Err(e) = self.refresh_tokens.sweep_expired().await {
            error!("refresh token sweep failed: {e}");
        }
    }

    pub fn sweep_local_tokens(&self) -> usize {
        let removed = self.local_tokens.sweep_expired(self.clock.now());
        if removed > 0 {
            debug!(removed, "expired local anti-forgery tokens removed");
        }
        removed
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let mut refresh_tick = tokio::time::interval(self.refresh_interval);
        refresh_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut local_tick = tokio::time::interval(self.local_interval);
        local_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    info!("Maintenance sweeper shutting down...");
                    break;
                }
                _ = refresh_tick.tick() => self.sweep_refresh_tokens().await,
                _ = local_tick.tick() => {
                    self.sweep_local_tokens();
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::RealRefreshTokenService;
    use crate::application_port::RotationMode;
    use crate::domain_model::SubjectId;
    use crate::domain_port::RefreshTokenRepo;
    use crate::infra_memory::*;

    #[tokio::test]
    async fn run_sweeps_and_stops_on_cancel() {
        let clock = Arc::new(ManualClock::default());
        let repo = Arc::new(MemoryRefreshTokenRepo::new());
        let service = Arc::new(RealRefreshTokenService::new(
            repo.clone(),
            Arc::new(MemoryIdentityLookup::with_subjects([SubjectId(1)])),
            clock.clone(),
            chrono::Duration::seconds(30),
            RotationMode::CompareAndSet,
        ));
        service.issue(SubjectId(1)).await.unwrap();

        let local = Arc::new(LocalTokenStore::new());
        local.put("s1", "tok", clock.now() + chrono::Duration::seconds(5));
        clock.advance(Duration::from_secs(60));

        let cancel = CancellationToken::new();
        let sweeper = Arc::new(MaintenanceSweeper::new(
            service,
            local.clone(),
            clock.clone(),
            Duration::from_millis(10),
            Duration::from_millis(10),
            cancel.clone(),
        ));
        let handle = tokio::spawn({
            let sweeper = sweeper.clone();
            async move { sweeper.run().await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert!(local.is_empty());
        assert!(repo.records_for(SubjectId(1)).is_empty());
    }
}
