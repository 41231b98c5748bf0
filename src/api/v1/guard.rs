use super::error::ApiErrorCode;
use crate::application_port::*;
use crate::domain_model::*;
use crate::logger::*;
use crate::server::TrustedProxies;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use warp::http::Method;
use warp::{Filter, Rejection, reject};

const SESSION_KEY_HEADER: &str = "x-session-key";
const CSRF_TOKEN_HEADER: &str = "x-csrf-token";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Caller address, or `None` when the transport does not expose a peer.
pub fn client_ip(
    proxies: Arc<TrustedProxies>,
) -> impl Filter<Extract = (Option<IpAddr>,), Error = Rejection> + Clone {
    warp::addr::remote()
        .and(warp::header::optional::<String>(FORWARDED_FOR_HEADER))
        .map(move |peer: Option<SocketAddr>, forwarded: Option<String>| {
            peer.map(|peer| proxies.resolve(peer.ip(), forwarded.as_deref()))
        })
}

/// The session key set by the authentication layer in front of this service.
pub fn optional_session_key() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone
{
    warp::header::optional::<String>(SESSION_KEY_HEADER)
        .map(|key: Option<String>| key.map(|k| k.trim().to_string()).filter(|k| has_text(k)))
}

pub fn session_key() -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    optional_session_key().and_then(|key: Option<String>| async move {
        key.ok_or_else(|| reject::custom(ApiErrorCode::Unauthorized))
    })
}

pub fn presented_csrf_token() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone
{
    warp::header::optional::<String>(CSRF_TOKEN_HEADER)
}

/// Consumes one event of `class` for the caller address and extracts the
/// limits to report back.
pub fn rate_limited(
    limiter: Arc<dyn RateLimiter>,
    class: RateClass,
    proxies: Arc<TrustedProxies>,
) -> impl Filter<Extract = (RateLimitInfo,), Error = Rejection> + Clone {
    client_ip(proxies).and_then(move |ip: Option<IpAddr>| {
        let limiter = limiter.clone();
        async move {
            let key = match ip {
                Some(ip) => RateKey::ip(ip),
                None => RateKey::ip("unknown"),
            };
            if !limiter.try_consume(&key, class, 1).await {
                debug!(key = %key, class = %class, "request refused by rate limit");
                return Err(reject::custom(ApiErrorCode::RateLimited));
            }
            Ok(limiter.limit_info(&key, class).await)
        }
    })
}

fn requires_anti_forgery(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Unsafe methods must carry the session's current CSRF token.
pub fn anti_forgery(
    provider: Arc<dyn AntiForgeryTokenProvider>,
) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::method()
        .and(optional_session_key())
        .and(presented_csrf_token())
        .and_then(
            move |method: Method, session_key: Option<String>, presented: Option<String>| {
                let provider = provider.clone();
                async move {
                    if !requires_anti_forgery(&method) {
                        return Ok(());
                    }
                    let (Some(session_key), Some(presented)) = (session_key, presented) else {
                        warn!(target: "security", %method, "request without session or CSRF token");
                        return Err(reject::custom(ApiErrorCode::CsrfInvalid));
                    };
                    if provider.validate(&session_key, &presented).await {
                        Ok(())
                    } else {
                        warn!(target: "security", session_key = %session_key, %method, "CSRF token rejected");
                        Err(reject::custom(ApiErrorCode::CsrfInvalid))
                    }
                }
            },
        )
        .untuple_one()
}

pub fn with_rate_limit_headers(info: RateLimitInfo, reply: impl warp::Reply) -> impl warp::Reply {
    let reply = warp::reply::with_header(reply, "X-RateLimit-Limit-Minute", info.per_minute.to_string());
    let reply = warp::reply::with_header(reply, "X-RateLimit-Limit-Hour", info.per_hour.to_string());
    warp::reply::with_header(
        reply,
        "X-RateLimit-Remaining",
        info.remaining_this_minute.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::*;
    use crate::infra_memory::*;
    use std::time::Duration;

    fn peer(ip: &str) -> SocketAddr {
        SocketAddr::new(ip.parse().unwrap(), 40000)
    }

    fn limiter(store: Arc<MemoryRateWindowStore>) -> Arc<dyn RateLimiter> {
        Arc::new(RealRateLimiter::new(
            store,
            RatePolicy::default(),
            Arc::new(ManualClock::default()),
            "rate_limit",
        ))
    }

    fn provider() -> Arc<RealAntiForgeryTokenProvider> {
        let clock = Arc::new(ManualClock::default());
        Arc::new(RealAntiForgeryTokenProvider::new(
            Arc::new(MemoryTokenCache::new(clock.clone())),
            Arc::new(LocalTokenStore::new()),
            clock,
            Duration::from_secs(3600),
            "csrf",
        ))
    }

    #[tokio::test]
    async fn client_ip_trusts_forwarded_header_only_from_proxies() {
        let filter = client_ip(Arc::new(TrustedProxies::default()));

        let direct = warp::test::request()
            .remote_addr(peer("203.0.113.7"))
            .header("x-forwarded-for", "198.51.100.1")
            .filter(&filter)
            .await
            .unwrap();
        assert_eq!(direct, Some("203.0.113.7".parse().unwrap()));

        let proxied = warp::test::request()
            .remote_addr(peer("127.0.0.1"))
            .header("x-forwarded-for", "198.51.100.1, 127.0.0.1")
            .filter(&filter)
            .await
            .unwrap();
        assert_eq!(proxied, Some("198.51.100.1".parse().unwrap()));
    }

    #[tokio::test]
    async fn sixth_auth_request_in_a_minute_is_rejected() {
        let filter = rate_limited(
            limiter(Arc::new(MemoryRateWindowStore::new())),
            RateClass::Auth,
            Arc::new(TrustedProxies::default()),
        );

        for expected_remaining in (0..5).rev() {
            let info = warp::test::request()
                .remote_addr(peer("203.0.113.7"))
                .filter(&filter)
                .await
                .unwrap();
            assert_eq!(info.remaining_this_minute, expected_remaining);
        }

        let rejection = warp::test::request()
            .remote_addr(peer("203.0.113.7"))
            .filter(&filter)
            .await
            .unwrap_err();
        assert_eq!(
            rejection.find::<ApiErrorCode>(),
            Some(&ApiErrorCode::RateLimited)
        );

        // Another caller still has its own budget.
        assert!(
            warp::test::request()
                .remote_addr(peer("203.0.113.8"))
                .filter(&filter)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn rate_limit_store_outage_rejects() {
        let store = Arc::new(MemoryRateWindowStore::new());
        store.set_offline(true);
        let filter = rate_limited(
            limiter(store),
            RateClass::Api,
            Arc::new(TrustedProxies::default()),
        );

        let rejection = warp::test::request()
            .remote_addr(peer("203.0.113.7"))
            .filter(&filter)
            .await
            .unwrap_err();
        assert_eq!(
            rejection.find::<ApiErrorCode>(),
            Some(&ApiErrorCode::RateLimited)
        );
    }

    #[tokio::test]
    async fn safe_methods_skip_anti_forgery() {
        let filter = anti_forgery(provider());
        assert!(
            warp::test::request()
                .method("GET")
                .filter(&filter)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn unsafe_methods_require_a_matching_token() {
        let provider = provider();
        let token = provider.issue("7").await.unwrap();
        let filter = anti_forgery(provider.clone());

        let missing = warp::test::request()
            .method("POST")
            .header("x-session-key", "7")
            .filter(&filter)
            .await
            .unwrap_err();
        assert_eq!(
            missing.find::<ApiErrorCode>(),
            Some(&ApiErrorCode::CsrfInvalid)
        );

        let wrong = warp::test::request()
            .method("DELETE")
            .header("x-session-key", "7")
            .header("x-csrf-token", "not-the-token")
            .filter(&filter)
            .await
            .unwrap_err();
        assert_eq!(wrong.find::<ApiErrorCode>(), Some(&ApiErrorCode::CsrfInvalid));

        let other_session = warp::test::request()
            .method("POST")
            .header("x-session-key", "8")
            .header("X-CSRF-TOKEN", token.value.as_str())
            .filter(&filter)
            .await;
        assert!(other_session.is_err());

        assert!(
            warp::test::request()
                .method("POST")
                .header("x-session-key", "7")
                .header("X-CSRF-TOKEN", token.value.as_str())
                .filter(&filter)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn blank_session_key_is_unauthorized() {
        let rejection = warp::test::request()
            .header("x-session-key", "   ")
            .filter(&session_key())
            .await
            .unwrap_err();
        assert_eq!(
            rejection.find::<ApiErrorCode>(),
            Some(&ApiErrorCode::Unauthorized)
        );
    }
}
