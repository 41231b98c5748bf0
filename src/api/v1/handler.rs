use super::error::*;
use crate::application_port::*;
use crate::domain_model::SubjectId;
use crate::logger::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use warp::{self, reject};

pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct CsrfTokenResponse {
    csrf_token: String,
    header_name: &'static str,
    expiry_minutes: u64,
    storage: TokenTier,
    issued_at: DateTime<Utc>,
}

pub async fn issue_csrf_token(
    session_key: String,
    anti_forgery: Arc<dyn AntiForgeryTokenProvider>,
    ttl: Duration,
) -> Result<impl warp::Reply, warp::Rejection> {
    let token = anti_forgery
        .issue(&session_key)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let response = CsrfTokenResponse {
        csrf_token: token.value,
        header_name: CSRF_HEADER,
        expiry_minutes: ttl.as_secs() / 60,
        storage: token.tier,
        issued_at: Utc::now(),
    };
    Ok(warp::reply::json(&ApiResponse::ok(response)))
}

#[derive(Debug, Serialize)]
struct CsrfStatusResponse {
    session_key: String,
    csrf_token_present: bool,
    csrf_token_valid: bool,
    remaining_seconds: Option<u64>,
    fallback_active: bool,
}

pub async fn csrf_status(
    session_key: String,
    presented: Option<String>,
    anti_forgery: Arc<dyn AntiForgeryTokenProvider>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let csrf_token_valid = match presented.as_deref() {
        Some(presented) => anti_forgery.validate(&session_key, presented).await,
        None => false,
    };
    let remaining_seconds = anti_forgery
        .remaining_ttl(&session_key)
        .await
        .map(|ttl| ttl.as_secs());

    let response = CsrfStatusResponse {
        csrf_token_present: presented.is_some(),
        csrf_token_valid,
        remaining_seconds,
        fallback_active: anti_forgery.fallback_active(),
        session_key,
    };
    Ok(warp::reply::json(&ApiResponse::ok(response)))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    body: RefreshRequest,
    refresh_tokens: Arc<dyn RefreshTokenService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let issued = refresh_tokens
        .rotate(&body.refresh_token)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(issued)))
}

#[derive(Debug, Serialize)]
struct LogoutResponse {
    revoked: u64,
}

pub async fn logout(
    session_key: String,
    refresh_tokens: Arc<dyn RefreshTokenService>,
    anti_forgery: Arc<dyn AntiForgeryTokenProvider>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let subject_id: SubjectId = session_key
        .parse()
        .map_err(|_| reject::custom(ApiErrorCode::Unauthorized))?;

    let revoked = refresh_tokens
        .revoke_all(subject_id)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;
    anti_forgery.invalidate(&session_key).await;

    info!(target: "security", subject_id = %subject_id, revoked, "logged out");
    Ok(warp::reply::json(&ApiResponse::ok(LogoutResponse { revoked })))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    anti_forgery_fallback_active: bool,
}

pub async fn health(
    anti_forgery: Arc<dyn AntiForgeryTokenProvider>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let response = HealthResponse {
        status: "ok",
        anti_forgery_fallback_active: anti_forgery.fallback_active(),
    };
    Ok(warp::reply::json(&ApiResponse::ok(response)))
}
