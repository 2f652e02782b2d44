use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tm_core::db;

use crate::auth::{require_auth, AuthContext};
use crate::content::{self, ContentItem, ContentKey, ContentKind};
use crate::notifications::{self, NewNotification};
use crate::users::{UserSummary, USER_COLUMNS};
use crate::validation::{page_size, FieldErrors};
use crate::{now_millis, ApiError, ApiResult, AppState};

const MAX_COMMENT_CHARS: usize = 2000;

#[derive(Debug, Serialize)]
pub struct LikeState {
    pub liked: bool,
    pub total_likes: i64,
}

#[derive(Debug, Serialize)]
pub struct SaveState {
    pub saved: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_type: ContentKind,
    pub content_id: i64,
    #[sqlx(flatten)]
    pub author: UserSummary,
    pub text: String,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct NewComment {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
}

/// Flips the actor's like on `key`. A new like notifies the owner in the same
/// transaction; removing a like notifies nobody.
pub(crate) async fn toggle_like(
    pool: &SqlitePool,
    actor: &AuthContext,
    key: ContentKey,
) -> ApiResult<LikeState> {
    let mut tx = db::begin_write(pool).await?;
    let target = content::resolve(&mut *tx, key).await?;

    let removed = sqlx::query(
        "DELETE FROM likes WHERE user_id = ? AND content_kind = ? AND content_id = ?",
    )
    .bind(actor.user_id)
    .bind(key.kind)
    .bind(key.id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let liked = if removed > 0 {
        false
    } else {
        let inserted = sqlx::query(
            "INSERT INTO likes (user_id, content_kind, content_id, created_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT (user_id, content_kind, content_id) DO NOTHING",
        )
        .bind(actor.user_id)
        .bind(key.kind)
        .bind(key.id)
        .bind(now_millis())
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if inserted > 0 {
            notifications::emit(&mut *tx, NewNotification::like(actor, &target)).await?;
        }
        true
    };

    let total_likes = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM likes WHERE content_kind = ? AND content_id = ?",
    )
    .bind(key.kind)
    .bind(key.id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::debug!(user_id = actor.user_id, kind = %key.kind, content_id = key.id, liked, "like toggled");
    Ok(LikeState { liked, total_likes })
}

pub(crate) async fn toggle_save(
    pool: &SqlitePool,
    actor: &AuthContext,
    key: ContentKey,
) -> ApiResult<SaveState> {
    let mut tx = db::begin_write(pool).await?;
    content::resolve(&mut *tx, key).await?;

    let removed = sqlx::query(
        "DELETE FROM saves WHERE user_id = ? AND content_kind = ? AND content_id = ?",
    )
    .bind(actor.user_id)
    .bind(key.kind)
    .bind(key.id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if removed == 0 {
        sqlx::query(
            "INSERT INTO saves (user_id, content_kind, content_id, created_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT (user_id, content_kind, content_id) DO NOTHING",
        )
        .bind(actor.user_id)
        .bind(key.kind)
        .bind(key.id)
        .bind(now_millis())
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(SaveState { saved: removed == 0 })
}

pub(crate) async fn add_comment(
    pool: &SqlitePool,
    actor: &AuthContext,
    key: ContentKey,
    text: &str,
) -> ApiResult<Comment> {
    let mut errors = FieldErrors::new();
    let text = errors.required_text("text", text, MAX_COMMENT_CHARS);
    errors.into_result()?;

    let mut tx = db::begin_write(pool).await?;
    let target = content::resolve(&mut *tx, key).await?;
    let id = sqlx::query(
        "INSERT INTO comments (user_id, content_kind, content_id, text, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(actor.user_id)
    .bind(key.kind)
    .bind(key.id)
    .bind(&text)
    .bind(now_millis())
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();
    notifications::emit(&mut *tx, NewNotification::comment(actor, &target)).await?;
    tx.commit().await?;

    load_comment(pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("comment {id} not found")))
}

async fn load_comment(pool: &SqlitePool, id: i64) -> ApiResult<Option<Comment>> {
    let sql = format!(
        "SELECT c.id, c.content_kind AS post_type, c.content_id, {USER_COLUMNS}, c.text, c.created_at \
         FROM comments c JOIN users u ON u.id = c.user_id WHERE c.id = ?"
    );
    let comment = sqlx::query_as::<_, Comment>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(comment)
}

pub async fn like(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((kind, id)): Path<(String, i64)>,
) -> ApiResult<Json<LikeState>> {
    let auth = require_auth(&state, &headers).await?;
    let key = ContentKey::parse(&kind, id)?;
    Ok(Json(toggle_like(&state.pool, &auth, key).await?))
}

pub async fn save(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((kind, id)): Path<(String, i64)>,
) -> ApiResult<Json<SaveState>> {
    let auth = require_auth(&state, &headers).await?;
    let key = ContentKey::parse(&kind, id)?;
    Ok(Json(toggle_save(&state.pool, &auth, key).await?))
}

pub async fn comments(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((kind, id)): Path<(String, i64)>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<Comment>>> {
    require_auth(&state, &headers).await?;
    let key = ContentKey::parse(&kind, id)?;
    content::resolve(&state.pool, key).await?;

    let sql = format!(
        "SELECT c.id, c.content_kind AS post_type, c.content_id, {USER_COLUMNS}, c.text, c.created_at \
         FROM comments c JOIN users u ON u.id = c.user_id \
         WHERE c.content_kind = ? AND c.content_id = ? \
         ORDER BY c.created_at DESC, c.id DESC LIMIT ?"
    );
    let comments = sqlx::query_as::<_, Comment>(&sql)
        .bind(key.kind)
        .bind(key.id)
        .bind(page_size(query.limit))
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(comments))
}

pub async fn comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((kind, id)): Path<(String, i64)>,
    Json(payload): Json<NewComment>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let auth = require_auth(&state, &headers).await?;
    let key = ContentKey::parse(&kind, id)?;
    let comment = add_comment(&state.pool, &auth, key, &payload.text).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Only the comment's author may delete it.
pub async fn delete_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let auth = require_auth(&state, &headers).await?;
    let comment = load_comment(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("comment {id} not found")))?;
    if comment.author.id != auth.user_id {
        return Err(ApiError::forbidden("cannot delete another user's comment"));
    }
    sqlx::query("DELETE FROM comments WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(auth.user_id)
        .execute(&state.pool)
        .await?;
    tracing::debug!(user_id = auth.user_id, comment_id = id, "comment deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Saved items newest-save first. Saves whose content has gone are skipped.
pub async fn saved(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<ContentItem>>> {
    let auth = require_auth(&state, &headers).await?;
    let keys = sqlx::query_as::<_, (ContentKind, i64)>(
        "SELECT content_kind, content_id FROM saves WHERE user_id = ? \
         ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(auth.user_id)
    .bind(page_size(query.limit))
    .fetch_all(&state.pool)
    .await?;

    let mut items = Vec::with_capacity(keys.len());
    for (kind, id) in keys {
        let key = ContentKey::new(kind, id);
        if let Some(item) = content::load_item(&state.pool, Some(auth.user_id), key).await? {
            items.push(item);
        }
    }
    Ok(Json(items))
}
