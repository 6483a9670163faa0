use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use oja_core::Role;

use crate::api::{ApiError, AppState};
use crate::credentials::{hash_session_token, SESSION_COOKIE};

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// The signed-in user, inserted by [`require_session`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: i64,
    pub public_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub session_id: i64,
    pub session_public_id: Uuid,
}

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window limiter keyed by client address.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<HashMap<String, RateLimitWindow>>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[derive(Debug, Serialize)]
struct MiddlewareErrorBody {
    error: MiddlewareError,
}

#[derive(Debug, Serialize)]
struct MiddlewareError {
    code: &'static str,
    message: &'static str,
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware resolving the session token (bearer header or `oja_session`
/// cookie) to a [`CurrentUser`]. Missing, expired or revoked sessions get 401.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let rid = request_id_of(&req);

    let Some(token) = session_token(req.headers()) else {
        return ApiError::new(rid, "unauthorized", "sign in required").into_response();
    };
    let token_hash = hash_session_token(&state.config.session_secret, &token);

    let session = match oja_db::find_active_session(&state.pool, &token_hash).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            return ApiError::new(rid, "unauthorized", "session expired or invalid")
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "session lookup failed");
            return ApiError::new(rid, "internal_error", "session lookup failed").into_response();
        }
    };

    let role = match session.role.parse::<Role>() {
        Ok(role) => role,
        Err(e) => {
            tracing::error!(error = %e, user_id = session.user_id, "user has unknown role");
            return ApiError::new(rid, "internal_error", "session lookup failed").into_response();
        }
    };

    if let Err(e) = oja_db::touch_session(&state.pool, session.session_id).await {
        tracing::warn!(error = %e, session_id = session.session_id, "failed to touch session");
    }

    req.extensions_mut().insert(CurrentUser {
        user_id: session.user_id,
        public_id: session.user_public_id,
        email: session.email,
        full_name: session.full_name,
        role,
        session_id: session.session_id,
        session_public_id: session.session_public_id,
    });

    next.run(req).await
}

/// Middleware admitting only admins. Must run inside [`require_session`].
pub async fn require_admin(req: Request, next: Next) -> Response {
    let rid = request_id_of(&req);
    match req.extensions().get::<CurrentUser>() {
        Some(user) if user.role == Role::Admin => next.run(req).await,
        Some(_) => ApiError::new(rid, "forbidden", "admin access required").into_response(),
        None => ApiError::new(rid, "unauthorized", "sign in required").into_response(),
    }
}

/// Middleware enforcing a fixed request-per-window limit per client.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_address(req.headers()).unwrap_or_else(|| "unknown".to_owned());

    let mut windows = rate_limit.state.lock().await;
    let now = Instant::now();
    windows.retain(|_, w| now.duration_since(w.started_at) < rate_limit.window);

    let window = windows.entry(client).or_insert(RateLimitWindow {
        started_at: now,
        count: 0,
    });

    if window.count >= rate_limit.max_requests {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(MiddlewareErrorBody {
                error: MiddlewareError {
                    code: "rate_limited",
                    message: "rate limit exceeded",
                },
            }),
        )
            .into_response();
    }

    window.count += 1;
    drop(windows);

    next.run(req).await
}

fn request_id_of(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map_or_else(String::new, |id| id.0.clone())
}

/// Bearer token first, then the session cookie.
pub(crate) fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers.get(AUTHORIZATION)) {
        return Some(token.trim().to_owned());
    }
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| extract_cookie(v, SESSION_COOKIE))
        .map(ToOwned::to_owned)
}

/// First hop of `x-forwarded-for`, else `x-real-ip`.
pub(crate) fn client_address(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|s| !s.trim().is_empty())
}

fn extract_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then_some(value)
    })
}
