use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tm_core::auth::{self, TokenUse};
use tm_core::password;

use crate::users::{self, UserSummary};
use crate::validation::FieldErrors;
use crate::{now_millis, ApiError, ApiResult, AppState};

const AUTHENTICATE_BEARER_CHALLENGE: &str = r#"Bearer realm="tm-api""#;
const MIN_PASSWORD_CHARS: usize = 8;

#[derive(Deserialize)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: String,
}

#[derive(Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    pub token_type: &'static str,
    pub expires_at: i64,
    pub user: UserSummary,
}

#[derive(Serialize)]
pub struct AccessToken {
    pub access: String,
    pub token_type: &'static str,
    pub expires_at: i64,
}

/// The authenticated caller, threaded explicitly into every operation.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AuthContext {
    pub user_id: i64,
    pub username: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<NewAccount>,
) -> ApiResult<(StatusCode, Json<UserSummary>)> {
    let user = register_account(&state.pool, payload).await?;
    tracing::info!(user_id = user.id, username = %user.username, "account registered");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn token(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> ApiResult<Json<TokenPair>> {
    let row = sqlx::query_as::<_, (i64, String)>(
        "SELECT id, password_hash FROM users WHERE username = ?",
    )
    .bind(payload.username.trim())
    .fetch_optional(&state.pool)
    .await?;

    let Some((user_id, password_hash)) = row else {
        return Err(auth_failed_error());
    };
    let verified = password::verify_password(&payload.password, &password_hash).map_err(|err| {
        tracing::error!(user_id, error = %err, "stored password hash is unreadable");
        ApiError::internal("AUTH_ERROR", "credential check failed")
    })?;
    if !verified {
        return Err(auth_failed_error());
    }

    let (access, access_claims) = issue(user_id, TokenUse::Access, &state)?;
    let (refresh, _) = issue(user_id, TokenUse::Refresh, &state)?;
    let user = users::summary(&state.pool, user_id).await?;

    Ok(Json(TokenPair {
        access,
        refresh,
        token_type: "Bearer",
        expires_at: access_claims.exp as i64,
        user,
    }))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<Json<AccessToken>> {
    let claims = auth::verify_token(&payload.refresh, TokenUse::Refresh, &state.jwt_config)
        .map_err(|err| auth_required_error(err.to_string()))?;
    let user_id = claims
        .user_id()
        .map_err(|err| auth_required_error(err.to_string()))?;
    if users::find_username(&state.pool, user_id).await?.is_none() {
        return Err(auth_required_error("account no longer exists"));
    }

    let (access, access_claims) = issue(user_id, TokenUse::Access, &state)?;
    Ok(Json(AccessToken {
        access,
        token_type: "Bearer",
        expires_at: access_claims.exp as i64,
    }))
}

pub(crate) async fn register_account(pool: &SqlitePool, account: NewAccount) -> ApiResult<UserSummary> {
    let mut errors = FieldErrors::new();
    let username = account.username.trim().to_string();
    let email = account.email.trim().to_string();
    validate_username(&mut errors, &username);
    validate_email(&mut errors, &email);
    if account.password.chars().count() < MIN_PASSWORD_CHARS {
        errors.add(
            "password",
            format!("must be at least {MIN_PASSWORD_CHARS} characters"),
        );
    }
    let full_name = errors.optional_text("full_name", &account.full_name, 120);
    errors.into_result()?;

    let mut errors = FieldErrors::new();
    let taken = sqlx::query_as::<_, (String, String)>(
        "SELECT username, email FROM users WHERE username = ?1 OR email = ?2",
    )
    .bind(&username)
    .bind(&email)
    .fetch_all(pool)
    .await?;
    for (existing_username, existing_email) in taken {
        if existing_username.eq_ignore_ascii_case(&username) {
            errors.add("username", "is already taken");
        }
        if existing_email.eq_ignore_ascii_case(&email) {
            errors.add("email", "is already registered");
        }
    }
    errors.into_result()?;

    let password_hash = password::hash_password(&account.password).map_err(|err| {
        tracing::error!(error = %err, "password hashing failed");
        ApiError::internal("AUTH_ERROR", "password hashing failed")
    })?;

    let inserted = sqlx::query(
        "INSERT INTO users (username, email, password_hash, full_name, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&username)
    .bind(&email)
    .bind(&password_hash)
    .bind(&full_name)
    .bind(now_millis())
    .execute(pool)
    .await;

    let user_id = match inserted {
        Ok(result) => result.last_insert_rowid(),
        Err(err) if is_unique_violation(&err) => {
            let mut errors = FieldErrors::new();
            errors.add("username", "username or email is already registered");
            return Err(errors.into_error());
        }
        Err(err) => return Err(err.into()),
    };

    users::summary(pool, user_id).await
}

pub(crate) async fn require_auth(state: &AppState, headers: &HeaderMap) -> ApiResult<AuthContext> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| auth_required_error("missing token"))?;
    authenticate(state, header).await
}

/// Like [`require_auth`] but lets anonymous callers through. A header that is
/// present but invalid is still rejected.
pub(crate) async fn optional_auth(
    state: &AppState,
    headers: &HeaderMap,
) -> ApiResult<Option<AuthContext>> {
    match headers.get(AUTHORIZATION) {
        None => Ok(None),
        Some(value) => {
            let header = value
                .to_str()
                .map_err(|_| auth_required_error("invalid token"))?;
            authenticate(state, header).await.map(Some)
        }
    }
}

async fn authenticate(state: &AppState, header: &str) -> ApiResult<AuthContext> {
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| auth_required_error("invalid token"))?;
    let claims = auth::verify_token(token, TokenUse::Access, &state.jwt_config)
        .map_err(|err| auth_required_error(err.to_string()))?;
    let user_id = claims
        .user_id()
        .map_err(|err| auth_required_error(err.to_string()))?;
    let username = users::find_username(&state.pool, user_id)
        .await?
        .ok_or_else(|| auth_required_error("account no longer exists"))?;
    Ok(AuthContext { user_id, username })
}

fn issue(
    user_id: i64,
    token_use: TokenUse,
    state: &AppState,
) -> ApiResult<(String, auth::TokenClaims)> {
    auth::issue_token(user_id, token_use, &state.jwt_config).map_err(|err| {
        tracing::error!(user_id, error = %err, "token issue failed");
        ApiError::internal("AUTH_ERROR", "token issue failed")
    })
}

fn auth_required_error(message: impl Into<String>) -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, "AUTH_REQUIRED", message).with_header(
        "WWW-Authenticate",
        AUTHENTICATE_BEARER_CHALLENGE.to_string(),
    )
}

fn auth_failed_error() -> ApiError {
    ApiError::new(
        StatusCode::UNAUTHORIZED,
        "AUTH_FAILED",
        "invalid username or password",
    )
}

fn validate_username(errors: &mut FieldErrors, username: &str) {
    let length = username.chars().count();
    if !(3..=30).contains(&length) {
        errors.add("username", "must be between 3 and 30 characters");
    }
    if !username
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '.')
    {
        errors.add(
            "username",
            "may only contain letters, digits, underscores and dots",
        );
    }
}

pub(crate) fn validate_email(errors: &mut FieldErrors, email: &str) {
    let valid = email.len() <= 254
        && match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            }
            None => false,
        };
    if !valid {
        errors.add("email", "must be a valid email address");
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}
