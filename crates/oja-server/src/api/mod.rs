mod admin;
mod auth;
mod banks;
mod cart;
mod catalog;
mod checkout;
mod notifications;
mod orders;
mod payments;
mod refunds;
mod supplier;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use oja_core::AppConfig;
use oja_paystack::{PaystackClient, PaystackError};

use crate::middleware::{
    enforce_rate_limit, request_id, require_admin, require_session, RateLimitState, RequestId,
};

pub use banks::BankCache;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    /// `None` when `PAYSTACK_SECRET_KEY` is unset; payment routes answer 503.
    pub paystack: Option<PaystackClient>,
    pub banks: BankCache,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
    payments: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "payment_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            "bad_gateway" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn normalize_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

pub(super) fn map_db_error(request_id: String, error: &oja_db::DbError) -> ApiError {
    match error {
        oja_db::DbError::NotFound => ApiError::new(request_id, "not_found", "record not found"),
        oja_db::DbError::Conflict(message) => ApiError::new(request_id, "conflict", message),
        oja_db::DbError::InsufficientStock { .. } => ApiError::new(
            request_id,
            "conflict",
            "stock changed while placing the order; please review your cart",
        ),
        e if e.is_unique_violation() => {
            ApiError::new(request_id, "conflict", "record already exists")
        }
        e => {
            tracing::error!(error = %e, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

pub(super) fn map_paystack_error(request_id: String, error: &PaystackError) -> ApiError {
    tracing::warn!(error = %error, "paystack call failed");
    match error {
        PaystackError::Api(message) => ApiError::new(
            request_id,
            "bad_gateway",
            format!("payment provider rejected the request: {message}"),
        ),
        _ => ApiError::new(request_id, "bad_gateway", "payment provider unavailable"),
    }
}

pub(super) fn require_paystack<'a>(
    state: &'a AppState,
    request_id: &str,
) -> Result<&'a PaystackClient, ApiError> {
    state.paystack.as_ref().ok_or_else(|| {
        ApiError::new(
            request_id,
            "payment_unavailable",
            "payments are not configured",
        )
    })
}

pub(super) fn parse_public_id(request_id: &str, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::new(request_id, "validation_error", format!("invalid id '{raw}'")))
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn public_router(rate_limit: RateLimitState) -> Router<AppState> {
    let auth_routes = Router::new()
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ));

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/banks", get(banks::list_banks))
        .route("/api/v1/categories", get(catalog::list_categories))
        .route("/api/v1/catalog", get(catalog::list_catalog))
        .route("/api/v1/catalog/{slug}", get(catalog::get_catalog_product))
        .route("/api/v1/availability", get(catalog::check_availability))
        .route("/api/v1/cart/quote", post(cart::quote_cart))
        .route("/api/v1/payments/webhook", post(payments::paystack_webhook))
        .merge(auth_routes)
}

fn supplier_router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/supplier/purchase-orders",
            get(supplier::list_purchase_orders),
        )
        .route(
            "/api/v1/supplier/purchase-orders/{id}",
            get(supplier::get_purchase_order),
        )
        .route(
            "/api/v1/supplier/purchase-orders/{id}/status",
            post(supplier::update_purchase_order_status),
        )
        .route("/api/v1/supplier/offers", put(supplier::upsert_offer))
        .route(
            "/api/v1/supplier/bank-account",
            put(supplier::update_bank_account),
        )
}

fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/admin/categories", post(admin::create_category))
        .route("/api/v1/admin/products", post(admin::create_product))
        .route(
            "/api/v1/admin/products/{id}",
            patch(admin::update_product).delete(admin::delete_product),
        )
        .route(
            "/api/v1/admin/products/{id}/variants",
            post(admin::create_variant),
        )
        .route(
            "/api/v1/admin/pricing-settings",
            get(admin::get_pricing_settings).put(admin::update_pricing_settings),
        )
        .route("/api/v1/admin/refunds", get(refunds::list_all_refunds))
        .route(
            "/api/v1/admin/refunds/{id}/resolve",
            post(refunds::resolve_refund),
        )
        .route(
            "/api/v1/admin/purchase-orders/{id}/payout",
            post(admin::mark_purchase_order_paid_out),
        )
        .layer(axum::middleware::from_fn(require_admin))
}

fn session_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/logout", post(auth::logout))
        .route(
            "/api/v1/account/me",
            get(auth::get_me).patch(auth::update_me),
        )
        .route("/api/v1/account/sessions", get(auth::list_sessions))
        .route(
            "/api/v1/account/sessions/{id}",
            delete(auth::revoke_session),
        )
        .route("/api/v1/checkout", post(checkout::checkout))
        .route("/api/v1/orders", get(orders::list_orders))
        .route("/api/v1/orders/{id}", get(orders::get_order))
        .route("/api/v1/orders/{id}/cancel", post(orders::cancel_order))
        .route(
            "/api/v1/orders/{id}/refunds",
            post(refunds::request_refund),
        )
        .route("/api/v1/refunds", get(refunds::list_my_refunds))
        .route(
            "/api/v1/payments/initialize",
            post(payments::initialize_payment),
        )
        .route(
            "/api/v1/payments/verify/{reference}",
            get(payments::verify_payment),
        )
        .route(
            "/api/v1/notifications",
            get(notifications::list_notifications),
        )
        .route(
            "/api/v1/notifications/unread-count",
            get(notifications::unread_count),
        )
        .route(
            "/api/v1/notifications/{id}/read",
            post(notifications::mark_read),
        )
        .route(
            "/api/v1/notifications/read-all",
            post(notifications::mark_all_read),
        )
        .merge(supplier_router())
        .merge(admin_router())
        .layer(axum::middleware::from_fn_with_state(state, require_session))
}

pub fn build_app(state: AppState, rate_limit: RateLimitState) -> Router {
    Router::new()
        .merge(public_router(rate_limit))
        .merge(session_router(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(request_id))
                .layer(TraceLayer::new_for_http())
                .layer(build_cors()),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);
    let payments = if state.paystack.is_some() {
        "configured"
    } else {
        "disabled"
    };

    match oja_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                    payments,
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                        payments,
                    },
                    meta,
                }),
            )
        }
    }
}

/// Login and registration budget per client address.
pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(20, Duration::from_secs(60))
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
