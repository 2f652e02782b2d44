use anyhow::Result;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use std::fmt;
use std::net::SocketAddr;
use tm_core::auth::JwtConfig;
use tm_core::{config, db, http, logging, migrations, server};

mod auth;
mod content;
mod feed;
mod follows;
mod groups;
mod interactions;
mod join_requests;
mod messages;
mod notifications;
mod openapi;
mod search;
mod users;
mod validation;

#[cfg(test)]
mod contract_tests;

pub(crate) const SERVICE_NAME: &str = "tm-api";

#[derive(Clone)]
pub(crate) struct AppState {
    pool: SqlitePool,
    jwt_config: JwtConfig,
    feed_window: i64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub(crate) struct ErrorResponse {
    code: String,
    message: String,
    details: Option<Value>,
}

#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<Value>,
    headers: Vec<(&'static str, String)>,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
            headers: Vec::new(),
        }
    }

    pub(crate) fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub(crate) fn with_header(mut self, name: &'static str, value: String) -> Self {
        self.headers.push((name, value));
        self
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub(crate) fn invalid_operation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_OPERATION", message)
    }

    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub(crate) fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }

    pub(crate) fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, message)
    }

    pub(crate) fn status(&self) -> StatusCode {
        self.status
    }

    pub(crate) fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.status.as_u16(), self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = %err, "database error");
        ApiError::internal("DB_ERROR", err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let payload = ErrorResponse {
            code: self.code.to_string(),
            message: self.message,
            details: self.details,
        };
        let mut response = (self.status, Json(payload)).into_response();
        for (name, value) in self.headers {
            if let Ok(value) = HeaderValue::from_str(&value) {
                response.headers_mut().insert(name, value);
            }
        }
        response
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize, utoipa::ToSchema)]
pub(crate) struct HealthStatus {
    status: String,
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub struct ApiConfig {
    pub addr: SocketAddr,
    pub database_url: String,
    pub jwt: JwtConfig,
    pub feed_window: i64,
    pub limits: http::HttpLimits,
}

pub fn load_config() -> Result<ApiConfig> {
    let addr = config::socket_addr_from_env("TM_API_ADDR", "0.0.0.0:8080")?;
    let database_url = config::required_env("DATABASE_URL")?;
    let jwt = JwtConfig {
        issuer: config::env_or("TM_JWT_ISSUER", "tripmates"),
        audience: config::env_or("TM_JWT_AUDIENCE", "tripmates-api"),
        secret: config::required_env("TM_JWT_SECRET")?,
        access_ttl_seconds: config::u64_from_env("TM_ACCESS_TOKEN_TTL_SECONDS", 3600)?,
        refresh_ttl_seconds: config::u64_from_env("TM_REFRESH_TOKEN_TTL_SECONDS", 7 * 24 * 3600)?,
    };
    let feed_window = config::u64_from_env("TM_FEED_WINDOW", 20)?.min(200) as i64;
    Ok(ApiConfig {
        addr,
        database_url,
        jwt,
        feed_window,
        limits: http::HttpLimits::from_env()?,
    })
}

pub async fn run(config: ApiConfig) -> Result<()> {
    logging::init(SERVICE_NAME);
    let pool = db::connect(&config.database_url).await?;
    migrations::run(&pool).await?;

    let state = AppState {
        pool,
        jwt_config: config.jwt,
        feed_window: config.feed_window,
    };

    let router = http::apply_standard_layers(build_router(state), SERVICE_NAME, config.limits);
    server::serve(config.addr, router).await
}

/// Creates an account outside the HTTP surface (used by the CLI).
pub async fn create_account(
    pool: &SqlitePool,
    username: &str,
    email: &str,
    password: &str,
    full_name: &str,
) -> Result<i64> {
    let account = auth::NewAccount {
        username: username.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        full_name: full_name.to_string(),
    };
    let user = auth::register_account(pool, account).await?;
    Ok(user.id)
}

pub(crate) fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/openapi.json", get(openapi_json))
        .route("/v1/auth/register", post(auth::register))
        .route("/v1/auth/token", post(auth::token))
        .route("/v1/auth/token/refresh", post(auth::refresh))
        .route(
            "/v1/profile",
            get(users::get_profile).patch(users::update_profile),
        )
        .route("/v1/counts", get(users::counts))
        .route("/v1/users/:username", get(users::get_user))
        .route("/v1/users/:username/posts", get(users::user_posts))
        .route("/v1/users/:username/follow", post(follows::toggle))
        .route("/v1/users/:username/follow-status", get(follows::status))
        .route("/v1/users/:username/followers", get(follows::followers))
        .route("/v1/users/:username/following", get(follows::following))
        .route("/v1/follows/mates", get(follows::mates))
        .route("/v1/follows/requests", get(follows::requests))
        .route("/v1/follows/:edge_id/accept", post(follows::accept))
        .route("/v1/follows/:edge_id/decline", post(follows::decline))
        .route(
            "/v1/trips",
            get(content::trips::list_handler).post(content::trips::create_handler),
        )
        .route(
            "/v1/trips/:id",
            get(content::trips::get_handler)
                .patch(content::trips::update_handler)
                .delete(content::trips::delete_handler),
        )
        .route("/v1/trips/:id/days", post(content::trips::add_day_handler))
        .route(
            "/v1/trips/:id/days/:day_id/photos",
            post(content::trips::add_photo_handler),
        )
        .route(
            "/v1/experiences",
            get(content::experiences::list_handler).post(content::experiences::create_handler),
        )
        .route(
            "/v1/experiences/:id",
            get(content::experiences::get_handler)
                .patch(content::experiences::update_handler)
                .delete(content::experiences::delete_handler),
        )
        .route(
            "/v1/experiences/:id/days",
            post(content::experiences::add_day_handler),
        )
        .route(
            "/v1/experiences/:id/days/:day_id/photos",
            post(content::experiences::add_photo_handler),
        )
        .route(
            "/v1/joinable-trips",
            get(content::joinable::list_handler).post(content::joinable::create_handler),
        )
        .route(
            "/v1/joinable-trips/:id",
            get(content::joinable::get_handler)
                .patch(content::joinable::update_handler)
                .delete(content::joinable::delete_handler),
        )
        .route(
            "/v1/joinable-trips/:id/requests",
            get(join_requests::list_for_trip).post(join_requests::create),
        )
        .route("/v1/join-requests/:id/accept", post(join_requests::accept))
        .route("/v1/join-requests/:id/reject", post(join_requests::reject))
        .route(
            "/v1/general-posts",
            get(content::general::list_handler).post(content::general::create_handler),
        )
        .route(
            "/v1/general-posts/:id",
            get(content::general::get_handler)
                .patch(content::general::update_handler)
                .delete(content::general::delete_handler),
        )
        .route("/v1/content/:kind/:id/like", post(interactions::like))
        .route("/v1/content/:kind/:id/save", post(interactions::save))
        .route(
            "/v1/content/:kind/:id/comments",
            get(interactions::comments).post(interactions::comment),
        )
        .route("/v1/comments/:id", delete(interactions::delete_comment))
        .route("/v1/saved", get(interactions::saved))
        .route("/v1/feed/for-you", get(feed::for_you))
        .route("/v1/feed/following", get(feed::following))
        .route("/v1/search", get(search::search))
        .route("/v1/messages/conversations", get(messages::conversations))
        .route(
            "/v1/messages/:user_id",
            get(messages::chat).post(messages::send),
        )
        .route("/v1/groups", get(groups::my_groups))
        .route("/v1/groups/:id/members", get(groups::members))
        .route(
            "/v1/groups/:id/messages",
            get(groups::messages).post(groups::send),
        )
        .route("/v1/notifications", get(notifications::list))
        .route(
            "/v1/notifications/mark-all-read",
            post(notifications::mark_all_read),
        )
        .with_state(state)
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    match db::check_ready(&state.pool).await {
        Ok(_) => (StatusCode::OK, Json(HealthStatus { status: "ok".into() })),
        Err(err) => {
            tracing::warn!(error = %err, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthStatus {
                    status: "unavailable".into(),
                }),
            )
        }
    }
}

pub(crate) async fn openapi_json(headers: HeaderMap) -> impl IntoResponse {
    let server_url = openapi::infer_server_url(&headers);
    Json(openapi::document(server_url.as_deref()))
}
