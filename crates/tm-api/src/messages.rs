use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tm_core::db;

use crate::auth::{require_auth, AuthContext};
use crate::groups::MAX_MESSAGE_CHARS;
use crate::users::{self, UserSummary, USER_COLUMNS};
use crate::validation::FieldErrors;
use crate::{now_millis, ApiError, ApiResult, AppState};

const DEFAULT_HISTORY: i64 = 200;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DirectMessage {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub text: String,
    pub is_read: bool,
    pub created_at: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct Conversation {
    #[sqlx(flatten)]
    pub user: UserSummary,
    pub last_message: String,
    pub last_message_at: i64,
    pub last_sender_id: i64,
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct Chat {
    pub user: UserSummary,
    pub messages: Vec<DirectMessage>,
}

#[derive(Debug, Deserialize)]
pub struct NewDirectMessage {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

pub(crate) async fn send_direct(
    pool: &SqlitePool,
    actor: &AuthContext,
    receiver_id: i64,
    text: &str,
) -> ApiResult<DirectMessage> {
    if receiver_id == actor.user_id {
        return Err(ApiError::invalid_operation("cannot message yourself"));
    }
    users::summary(pool, receiver_id).await?;

    let mut errors = FieldErrors::new();
    let text = errors.required_text("text", text, MAX_MESSAGE_CHARS);
    errors.into_result()?;

    let created_at = now_millis();
    let id = sqlx::query(
        "INSERT INTO direct_messages (sender_id, receiver_id, text, is_read, created_at) \
         VALUES (?, ?, ?, 0, ?)",
    )
    .bind(actor.user_id)
    .bind(receiver_id)
    .bind(&text)
    .bind(created_at)
    .execute(pool)
    .await?
    .last_insert_rowid();

    tracing::debug!(sender_id = actor.user_id, receiver_id, message_id = id, "direct message sent");
    Ok(DirectMessage {
        id,
        sender_id: actor.user_id,
        receiver_id,
        text,
        is_read: false,
        created_at,
    })
}

/// Opens the chat with `peer_id`: marks the peer's messages to the actor read,
/// then returns the most recent history oldest first.
pub(crate) async fn open_chat(
    pool: &SqlitePool,
    actor: &AuthContext,
    peer_id: i64,
    limit: i64,
) -> ApiResult<Chat> {
    let user = users::summary(pool, peer_id).await?;

    let mut tx = db::begin_write(pool).await?;
    let marked = sqlx::query(
        "UPDATE direct_messages SET is_read = 1 \
         WHERE sender_id = ? AND receiver_id = ? AND is_read = 0",
    )
    .bind(peer_id)
    .bind(actor.user_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let messages = sqlx::query_as::<_, DirectMessage>(
        "SELECT * FROM ( \
           SELECT id, sender_id, receiver_id, text, is_read, created_at FROM direct_messages \
           WHERE (sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1) \
           ORDER BY created_at DESC, id DESC LIMIT ?3 \
         ) ORDER BY created_at, id",
    )
    .bind(actor.user_id)
    .bind(peer_id)
    .bind(limit)
    .fetch_all(&mut *tx)
    .await?;
    tx.commit().await?;

    if marked > 0 {
        tracing::debug!(user_id = actor.user_id, peer_id, marked, "messages marked read");
    }
    Ok(Chat { user, messages })
}

/// One row per peer, most recent conversation first.
pub(crate) async fn list_conversations(
    pool: &SqlitePool,
    user_id: i64,
) -> ApiResult<Vec<Conversation>> {
    let sql = format!(
        "WITH threads AS ( \
           SELECT CASE WHEN sender_id = ?1 THEN receiver_id ELSE sender_id END AS peer_id, \
                  MAX(id) AS last_id \
           FROM direct_messages WHERE sender_id = ?1 OR receiver_id = ?1 \
           GROUP BY peer_id \
         ) \
         SELECT {USER_COLUMNS}, m.text AS last_message, m.created_at AS last_message_at, \
                m.sender_id AS last_sender_id, \
                (SELECT COUNT(*) FROM direct_messages d \
                 WHERE d.sender_id = t.peer_id AND d.receiver_id = ?1 AND d.is_read = 0) AS unread \
         FROM threads t \
         JOIN direct_messages m ON m.id = t.last_id \
         JOIN users u ON u.id = t.peer_id \
         ORDER BY m.created_at DESC, m.id DESC"
    );
    let conversations = sqlx::query_as::<_, Conversation>(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(conversations)
}

pub async fn conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Conversation>>> {
    let auth = require_auth(&state, &headers).await?;
    Ok(Json(list_conversations(&state.pool, auth.user_id).await?))
}

pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Chat>> {
    let auth = require_auth(&state, &headers).await?;
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY).clamp(1, 500);
    Ok(Json(open_chat(&state.pool, &auth, user_id, limit).await?))
}

pub async fn send(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    Json(payload): Json<NewDirectMessage>,
) -> ApiResult<(StatusCode, Json<DirectMessage>)> {
    let auth = require_auth(&state, &headers).await?;
    let message = send_direct(&state.pool, &auth, user_id, &payload.text).await?;
    Ok((StatusCode::CREATED, Json(message)))
}
