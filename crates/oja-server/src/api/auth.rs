//! Registration, login, logout and account/session management.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use oja_core::password::{hash_password, verify_password};
use oja_core::validation::{normalize_email, normalize_ng_phone, validate_password};
use oja_db::{SessionRow, UserRow};

use crate::credentials::{
    expired_session_cookie, generate_session_token, hash_session_token, session_cookie,
};
use crate::middleware::{client_address, CurrentUser, RequestId};

use super::{map_db_error, parse_public_id, ApiError, ApiResponse, AppState, ResponseMeta};

const INVALID_CREDENTIALS: &str = "invalid email or password";

#[derive(Debug, Deserialize)]
pub(super) struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
pub(super) struct UpdateProfileRequest {
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
}

#[allow(clippy::option_option)]
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize)]
pub(super) struct AccountItem {
    id: Uuid,
    email: String,
    full_name: String,
    phone: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct SessionData {
    /// Raw bearer token; returned once and never stored.
    token: String,
    expires_at: DateTime<Utc>,
    user: AccountItem,
}

#[derive(Debug, Serialize)]
pub(super) struct SessionItem {
    id: Uuid,
    user_agent: Option<String>,
    ip_address: Option<String>,
    created_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    current: bool,
}

impl From<UserRow> for AccountItem {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.public_id,
            email: row.email,
            full_name: row.full_name,
            phone: row.phone,
            role: row.role,
            created_at: row.created_at,
        }
    }
}

fn session_item(row: SessionRow, current_session: i64) -> SessionItem {
    SessionItem {
        id: row.public_id,
        user_agent: row.user_agent,
        ip_address: row.ip_address,
        created_at: row.created_at,
        last_seen_at: row.last_seen_at,
        expires_at: row.expires_at,
        current: row.id == current_session,
    }
}

type SessionResponse = (
    StatusCode,
    [(header::HeaderName, String); 1],
    Json<ApiResponse<SessionData>>,
);

fn validate_full_name(req_id: &str, raw: &str) -> Result<String, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().count() > 120 {
        return Err(ApiError::new(
            req_id,
            "validation_error",
            "full_name must be 1-120 characters",
        ));
    }
    Ok(trimmed.to_owned())
}

fn optional_phone(req_id: &str, raw: Option<&str>) -> Result<Option<String>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(phone) => normalize_ng_phone(phone)
            .map(Some)
            .map_err(|e| ApiError::new(req_id, "validation_error", e.to_string())),
        None => Ok(None),
    }
}

/// Issues a session for `user` and builds the response carrying both the
/// token body and the cookie.
async fn open_session(
    state: &AppState,
    req_id: RequestId,
    headers: &HeaderMap,
    user: UserRow,
    status: StatusCode,
) -> Result<SessionResponse, ApiError> {
    let token = generate_session_token();
    let token_hash = hash_session_token(&state.config.session_secret, &token);
    let ttl_hours = i64::try_from(state.config.session_ttl_hours).unwrap_or(i64::MAX / 3600);
    let expires_at = Utc::now() + Duration::hours(ttl_hours);

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|ua| ua.chars().take(512).collect::<String>());
    let ip = client_address(headers);

    oja_db::create_session(
        &state.pool,
        user.id,
        &token_hash,
        user_agent.as_deref(),
        ip.as_deref(),
        expires_at,
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let cookie = session_cookie(
        &token,
        state.config.session_ttl_hours.saturating_mul(3600),
        !state.config.is_development(),
    );

    Ok((
        status,
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse {
            data: SessionData {
                token,
                expires_at,
                user: user.into(),
            },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// POST /api/v1/auth/register — always creates a customer account.
pub(super) async fn register(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    Json(body): Json<RegisterRequest>,
) -> Result<SessionResponse, ApiError> {
    let rid = req_id.0.clone();
    let email = normalize_email(&body.email)
        .map_err(|e| ApiError::new(&rid, "validation_error", e.to_string()))?;
    validate_password(&body.password)
        .map_err(|e| ApiError::new(&rid, "validation_error", e.to_string()))?;
    let full_name = validate_full_name(&rid, &body.full_name)?;
    let phone = optional_phone(&rid, body.phone.as_deref())?;

    let password = body.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| {
            tracing::error!(request_id = %rid, error = %e, "password hashing task failed");
            ApiError::new(&rid, "internal_error", "failed to create account")
        })?
        .map_err(|e| {
            tracing::error!(request_id = %rid, error = %e, "password hashing failed");
            ApiError::new(&rid, "internal_error", "failed to create account")
        })?;

    let user = oja_db::create_user(
        &state.pool,
        &email,
        &password_hash,
        &full_name,
        phone.as_deref(),
        oja_core::Role::Customer.as_str(),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(user_id = user.id, "account registered");

    open_session(&state, req_id, &headers, user, StatusCode::CREATED).await
}

/// POST /api/v1/auth/login
///
/// Unknown email, wrong password and deactivated account all produce the
/// same 401 so the endpoint cannot be used to enumerate accounts.
pub(super) async fn login(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<SessionResponse, ApiError> {
    let rid = req_id.0.clone();
    let unauthorized = || ApiError::new(&rid, "unauthorized", INVALID_CREDENTIALS);

    let Ok(email) = normalize_email(&body.email) else {
        return Err(unauthorized());
    };
    let user = oja_db::get_user_by_email(&state.pool, &email)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .filter(|u| u.is_active)
        .ok_or_else(unauthorized)?;

    let password = body.password;
    let stored = user.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| {
            tracing::error!(request_id = %rid, error = %e, "password verification task failed");
            ApiError::new(&rid, "internal_error", "failed to sign in")
        })?;
    if !verified {
        tracing::info!(user_id = user.id, "login rejected");
        return Err(unauthorized());
    }

    tracing::info!(user_id = user.id, "login succeeded");
    open_session(&state, req_id, &headers, user, StatusCode::OK).await
}

/// POST /api/v1/auth/logout — revokes the calling session.
pub(super) async fn logout(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1]), ApiError> {
    oja_db::revoke_session(&state.pool, user.user_id, user.session_public_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, expired_session_cookie())],
    ))
}

/// GET /api/v1/account/me
pub(super) async fn get_me(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<AccountItem>>, ApiError> {
    let row = oja_db::get_user_by_id(&state.pool, user.user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(&req_id.0, "not_found", "account not found"))?;

    Ok(Json(ApiResponse {
        data: row.into(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// PATCH /api/v1/account/me — `phone: null` clears the number.
pub(super) async fn update_me(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<AccountItem>>, ApiError> {
    let rid = &req_id.0;
    let full_name = match body.full_name.as_deref() {
        Some(raw) => Some(validate_full_name(rid, raw)?),
        None => None,
    };
    let phone = match body.phone {
        Some(raw) => Some(optional_phone(rid, raw.as_deref())?),
        None => None,
    };

    let row = oja_db::update_user_profile(
        &state.pool,
        user.user_id,
        full_name.as_deref(),
        phone.as_ref().map(Option::as_deref),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: row.into(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// GET /api/v1/account/sessions
pub(super) async fn list_sessions(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<SessionItem>>>, ApiError> {
    let rows = oja_db::list_sessions_for_user(&state.pool, user.user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows
            .into_iter()
            .map(|row| session_item(row, user.session_id))
            .collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// DELETE /api/v1/account/sessions/{id}
pub(super) async fn revoke_session(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session_id = parse_public_id(&req_id.0, &id)?;
    let revoked = oja_db::revoke_session(&state.pool, user.user_id, session_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    if !revoked {
        return Err(ApiError::new(req_id.0, "not_found", "session not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_is_trimmed_and_bounded() {
        assert_eq!(validate_full_name("req", "  Ada Obi ").unwrap(), "Ada Obi");
        assert!(validate_full_name("req", "   ").is_err());
        assert!(validate_full_name("req", &"a".repeat(121)).is_err());
    }

    #[test]
    fn blank_phone_is_treated_as_absent() {
        assert_eq!(optional_phone("req", Some("  ")).unwrap(), None);
        assert_eq!(
            optional_phone("req", Some("08031234567")).unwrap(),
            Some("+2348031234567".to_owned())
        );
        assert!(optional_phone("req", Some("12345")).is_err());
    }

    #[test]
    fn profile_patch_distinguishes_null_phone() {
        let cleared: UpdateProfileRequest = serde_json::from_str(r#"{"phone": null}"#).unwrap();
        assert_eq!(cleared.phone, Some(None));
        let untouched: UpdateProfileRequest =
            serde_json::from_str(r#"{"full_name": "Ada"}"#).unwrap();
        assert_eq!(untouched.phone, None);
    }
}
