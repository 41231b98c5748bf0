use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::server::TrustedProxies;
use crate::settings::Settings;
use anyhow::anyhow;
use sqlx::MySqlPool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The storage ports every service is built on.
pub struct Stores {
    pub refresh_token_repo: Arc<dyn RefreshTokenRepo>,
    pub identity_lookup: Arc<dyn IdentityLookup>,
    pub token_cache: Arc<dyn TokenCache>,
    pub rate_windows: Arc<dyn RateWindowStore>,
    pub clock: Arc<dyn Clock>,
    pub mysql_pool: Option<MySqlPool>,
}

impl Stores {
    /// In-process adapters; every subject exists.
    pub fn fake() -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            refresh_token_repo: Arc::new(MemoryRefreshTokenRepo::new()),
            identity_lookup: Arc::new(MemoryIdentityLookup::accept_any()),
            token_cache: Arc::new(MemoryTokenCache::new(clock.clone())),
            rate_windows: Arc::new(MemoryRateWindowStore::new()),
            clock,
            mysql_pool: None,
        }
    }

    pub async fn connect(settings: &Settings) -> anyhow::Result<Self> {
        let storage = &settings.storage;
        let redis_timeout = Duration::from_millis(storage.redis_timeout_ms);
        let mysql_timeout = Duration::from_millis(storage.mysql_timeout_ms);

        let redis_client = redis::Client::open(storage.redis_dsn.as_str())?;
        let redis_manager = redis_client.get_connection_manager().await?;

        let pool = connect_pool(
            &storage.mysql_dsn,
            Duration::from_millis(storage.mysql_acquire_timeout_ms),
        )
        .await?;

        Ok(Self {
            refresh_token_repo: Arc::new(MySqlRefreshTokenRepo::new(pool.clone(), mysql_timeout)),
            identity_lookup: Arc::new(MySqlIdentityLookup::new(pool.clone(), mysql_timeout)),
            token_cache: Arc::new(RedisTokenCache::new(redis_manager.clone(), redis_timeout)),
            rate_windows: Arc::new(RedisRateWindowStore::new(redis_manager, redis_timeout)),
            clock: Arc::new(SystemClock),
            mysql_pool: Some(pool),
        })
    }
}

pub struct Server {
    pub refresh_token_service: Arc<dyn RefreshTokenService>,
    pub anti_forgery_provider: Arc<dyn AntiForgeryTokenProvider>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub trusted_proxies: Arc<TrustedProxies>,
    pub anti_forgery_ttl: Duration,
    sweeper: Arc<MaintenanceSweeper>,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pool: Option<MySqlPool>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let stores = match settings.storage.backend.as_str() {
            "fake" => Stores::fake(),
            "real" => Stores::connect(settings).await?,
            other => return Err(anyhow!("Unknown storage backend: {}", other)),
        };
        Self::with_stores(settings, stores)
    }

    /// Builds the services over `stores` and spawns the maintenance sweeper.
    /// Must be called inside a tokio runtime.
    pub fn with_stores(settings: &Settings, stores: Stores) -> anyhow::Result<Self> {
        let refresh_ttl = i64::try_from(settings.refresh_token.ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .filter(|ttl| *ttl > chrono::Duration::zero())
            .ok_or_else(|| anyhow!("refresh_token.ttl_secs out of range"))?;
        if settings.anti_forgery.ttl_secs == 0 {
            return Err(anyhow!("anti_forgery.ttl_secs must be positive"));
        }
        let anti_forgery_ttl = Duration::from_secs(settings.anti_forgery.ttl_secs);
        let rotation = parse_rotation(&settings.refresh_token.rotation)?;

        let refresh_token_service: Arc<dyn RefreshTokenService> =
            Arc::new(RealRefreshTokenService::new(
                stores.refresh_token_repo,
                stores.identity_lookup,
                stores.clock.clone(),
                refresh_ttl,
                rotation,
            ));

        let local_tokens = Arc::new(LocalTokenStore::new());
        let anti_forgery_provider: Arc<dyn AntiForgeryTokenProvider> =
            Arc::new(RealAntiForgeryTokenProvider::new(
                stores.token_cache,
                local_tokens.clone(),
                stores.clock.clone(),
                anti_forgery_ttl,
                settings.anti_forgery.key_prefix.clone(),
            ));

        let rate_limiter: Arc<dyn RateLimiter> = Arc::new(RealRateLimiter::new(
            stores.rate_windows,
            settings.rate_limit.policy(),
            stores.clock.clone(),
            settings.rate_limit.key_prefix.clone(),
        ));

        let trusted_proxies = Arc::new(TrustedProxies::parse(&settings.security.trusted_proxies));

        // region runtime infra
        let cancel = CancellationToken::new();
        let sweeper = Arc::new(MaintenanceSweeper::new(
            refresh_token_service.clone(),
            local_tokens,
            stores.clock,
            Duration::from_secs(settings.refresh_token.sweep_interval_secs.max(1)),
            Duration::from_secs(settings.anti_forgery.local_sweep_interval_secs.max(1)),
            cancel.clone(),
        ));
        let sweeper_handle = tokio::spawn({
            let sweeper = sweeper.clone();
            async move {
                if let Err(e) = sweeper.run().await {
                    error!("maintenance sweeper stopped: {e}");
                }
            }
        });
        // endregion

        info!(backend = %settings.storage.backend, ?rotation, "server started");

        Ok(Self {
            refresh_token_service,
            anti_forgery_provider,
            rate_limiter,
            trusted_proxies,
            anti_forgery_ttl,
            sweeper,
            sweeper_handle: Mutex::new(Some(sweeper_handle)),
            cancel,
            pool: stores.mysql_pool,
        })
    }

    /// One pass of both maintenance sweeps, outside the periodic schedule.
    pub async fn sweep_once(&self) {
        self.sweeper.sweep_refresh_tokens().await;
        let removed = self.sweeper.sweep_local_tokens();
        info!(local_removed = removed, "maintenance sweep finished");
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = match self.sweeper_handle.lock() {
            Ok(mut lock) => lock.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let r = handle.await;
            info!("sweeper handle dropped: {:?}", r);
        }

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

fn parse_rotation(mode: &str) -> anyhow::Result<RotationMode> {
    match mode {
        "cas" => Ok(RotationMode::CompareAndSet),
        "read_then_write" => Ok(RotationMode::ReadThenWrite),
        other => Err(anyhow!("Unknown refresh token rotation mode: {}", other)),
    }
}
