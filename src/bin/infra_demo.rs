/// Exercises the three components against the real redis and MySQL stores.
///
/// Requires the stores named in the settings file and the schema in
/// `sql/refresh_token.sql`, plus a `subject` row for the id passed with
/// `DEMO_SUBJECT_ID` (default 1).
///
/// $ cargo run --bin infra_demo -- --settings=settings/release.toml
use nanoid::nanoid;
use session_guard::application_impl::*;
use session_guard::application_port::*;
use session_guard::domain_model::*;
use session_guard::infra_memory::*;
use session_guard::server::Stores;
use session_guard::settings::*;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::new("infra_demo=debug,session_guard=debug,security=debug");

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    let alphabet: [char; 16] = [
        '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', 'a', 'b', 'c', 'd', 'e', 'f',
    ];
    let run_id = nanoid!(10, &alphabet);

    let cli = Cli::parse();
    let settings = parse_settings(cli.settings.as_deref())?;

    // region prepare connection

    let redis_client = redis::Client::open(settings.storage.redis_dsn.as_str())?;
    let mut redis_manager = redis_client.get_connection_manager().await?;
    let pong: String = redis::cmd("PING").query_async(&mut redis_manager).await?;
    println!("PING -> {}", pong);

    let stores = Stores::connect(&settings).await?;
    if let Some(pool) = &stores.mysql_pool {
        let value: i32 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await?;
        println!("MySQL -> {}", value);
    }

    // endregion

    // region initialization

    let refresh_tokens: Arc<dyn RefreshTokenService> = Arc::new(RealRefreshTokenService::new(
        stores.refresh_token_repo,
        stores.identity_lookup,
        stores.clock.clone(),
        chrono::Duration::minutes(5),
        RotationMode::CompareAndSet,
    ));
    let anti_forgery: Arc<dyn AntiForgeryTokenProvider> =
        Arc::new(RealAntiForgeryTokenProvider::new(
            stores.token_cache,
            Arc::new(LocalTokenStore::new()),
            stores.clock.clone(),
            Duration::from_secs(60),
            format!("csrf:{}", run_id),
        ));
    let rate_limiter: Arc<dyn RateLimiter> = Arc::new(RealRateLimiter::new(
        stores.rate_windows,
        RatePolicy::default(),
        stores.clock,
        format!("rate_limit:{}", run_id),
    ));

    // endregion

    // region refresh tokens

    let subject_id: SubjectId = std::env::var("DEMO_SUBJECT_ID")
        .unwrap_or_else(|_| "1".to_string())
        .parse()?;
    let issued = refresh_tokens.issue(subject_id).await?;
    println!("issued, expires at {}", issued.expires_at);

    let rotated = refresh_tokens.rotate(&issued.token.0).await?;
    println!("rotated, expires at {}", rotated.expires_at);

    let replay = refresh_tokens.rotate(&issued.token.0).await;
    println!("replaying the first token -> {:?}", replay.err());

    let revoked = refresh_tokens.revoke_all(subject_id).await?;
    println!("revoked {} token(s)", revoked);

    // endregion

    // region anti-forgery

    let session_key = format!("demo-{}", run_id);
    let token = anti_forgery.issue(&session_key).await?;
    println!("csrf token stored in {:?} tier", token.tier);
    println!(
        "validate -> {}",
        anti_forgery.validate(&session_key, &token.value).await
    );
    println!(
        "remaining ttl -> {:?}",
        anti_forgery.remaining_ttl(&session_key).await
    );
    anti_forgery.invalidate(&session_key).await;
    println!(
        "validate after invalidate -> {}",
        anti_forgery.validate(&session_key, &token.value).await
    );

    // endregion

    // region rate limiting

    let key = RateKey::ip("203.0.113.1");
    for attempt in 1..=6 {
        let allowed = rate_limiter.try_consume(&key, RateClass::Auth, 1).await;
        println!("auth attempt {} -> {}", attempt, allowed);
    }
    println!(
        "limit info -> {:?}",
        rate_limiter.limit_info(&key, RateClass::Auth).await
    );

    // endregion

    Ok(())
}
