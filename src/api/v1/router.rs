use super::guard::*;
use super::handler;
use crate::domain_model::{RateClass, RateLimitInfo};
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::Filter;

/// Every route passes the rate-limit guard first, then the anti-forgery
/// guard, then its handler.
pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let csrf_token = warp::get()
        .and(warp::path("csrf-token"))
        .and(warp::path::end())
        .and(session_key())
        .and(with(server.anti_forgery_provider.clone()))
        .and(warp::any().map({
            let ttl = server.anti_forgery_ttl;
            move || ttl
        }))
        .and_then(handler::issue_csrf_token);

    let csrf_status = warp::get()
        .and(warp::path("csrf-status"))
        .and(warp::path::end())
        .and(session_key())
        .and(presented_csrf_token())
        .and(with(server.anti_forgery_provider.clone()))
        .and_then(handler::csrf_status);

    let refresh = warp::post()
        .and(warp::path("refresh"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(4 * 1024))
        .and(warp::body::json())
        .and(with(server.refresh_token_service.clone()))
        .and_then(handler::refresh);

    let logout = warp::post()
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(session_key())
        .and(with(server.refresh_token_service.clone()))
        .and(with(server.anti_forgery_provider.clone()))
        .and_then(handler::logout);

    let auth = warp::path("auth")
        .and(rate_limited(
            server.rate_limiter.clone(),
            RateClass::Auth,
            server.trusted_proxies.clone(),
        ))
        .and(anti_forgery(server.anti_forgery_provider.clone()))
        .and(csrf_token.or(csrf_status).or(refresh).or(logout))
        .map(|info: RateLimitInfo, reply| with_rate_limit_headers(info, reply));

    let health = warp::get()
        .and(warp::path("health"))
        .and(warp::path::end())
        .and(rate_limited(
            server.rate_limiter.clone(),
            RateClass::Api,
            server.trusted_proxies.clone(),
        ))
        .and(with(server.anti_forgery_provider.clone()).and_then(handler::health))
        .map(|info: RateLimitInfo, reply| with_rate_limit_headers(info, reply));

    auth.or(health)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}
