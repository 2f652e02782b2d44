//! Follow edges. A new edge starts unaccepted unless the target already
//! follows the actor back, in which case it is accepted on the spot. Mates are
//! users joined by accepted edges in both directions.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use tm_core::db;

use crate::auth::{require_auth, AuthContext};
use crate::notifications::{self, NewNotification};
use crate::users::{self, UserSummary, USER_COLUMNS};
use crate::{now_millis, ApiError, ApiResult, AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowStatus {
    None,
    Pending,
    Following,
}

#[derive(Debug, Serialize)]
pub struct FollowState {
    pub following: bool,
    pub status: FollowStatus,
    pub edge_id: Option<i64>,
}

impl FollowState {
    fn from_edge(edge: Option<FollowEdge>) -> Self {
        match edge {
            None => Self {
                following: false,
                status: FollowStatus::None,
                edge_id: None,
            },
            Some(edge) => Self {
                following: true,
                status: if edge.is_accepted {
                    FollowStatus::Following
                } else {
                    FollowStatus::Pending
                },
                edge_id: Some(edge.id),
            },
        }
    }
}

#[derive(Debug, Serialize, FromRow)]
pub struct FollowRequest {
    pub id: i64,
    #[sqlx(flatten)]
    pub follower: UserSummary,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, FromRow)]
struct FollowEdge {
    id: i64,
    follower_id: i64,
    following_id: i64,
    is_accepted: bool,
}

/// Follows `target_id`, or unfollows when an edge already exists.
pub(crate) async fn toggle_follow(
    pool: &SqlitePool,
    actor: &AuthContext,
    target_id: i64,
) -> ApiResult<FollowState> {
    if target_id == actor.user_id {
        return Err(ApiError::invalid_operation("cannot follow yourself"));
    }

    let mut tx = db::begin_write(pool).await?;
    users::summary(&mut *tx, target_id).await?;

    let removed = sqlx::query("DELETE FROM follows WHERE follower_id = ? AND following_id = ?")
        .bind(actor.user_id)
        .bind(target_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if removed > 0 {
        tx.commit().await?;
        tracing::info!(follower_id = actor.user_id, following_id = target_id, "unfollowed");
        return Ok(FollowState::from_edge(None));
    }

    let reciprocal = sqlx::query_scalar::<_, bool>(
        "SELECT is_accepted FROM follows WHERE follower_id = ? AND following_id = ?",
    )
    .bind(target_id)
    .bind(actor.user_id)
    .fetch_optional(&mut *tx)
    .await?
    .unwrap_or(false);

    let result = sqlx::query(
        "INSERT INTO follows (follower_id, following_id, is_accepted, created_at) \
         VALUES (?, ?, ?, ?) ON CONFLICT (follower_id, following_id) DO NOTHING",
    )
    .bind(actor.user_id)
    .bind(target_id)
    .bind(reciprocal)
    .bind(now_millis())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() > 0 {
        notifications::emit(&mut *tx, NewNotification::follow(actor, target_id, reciprocal))
            .await?;
        if reciprocal {
            let target = AuthContext {
                user_id: target_id,
                username: users::summary(&mut *tx, target_id).await?.username,
            };
            notifications::emit(&mut *tx, NewNotification::follow_accepted(&target, actor.user_id))
                .await?;
        }
    }

    let edge = find_edge(&mut tx, actor.user_id, target_id).await?;
    tx.commit().await?;

    tracing::info!(
        follower_id = actor.user_id,
        following_id = target_id,
        accepted = reciprocal,
        "followed"
    );
    Ok(FollowState::from_edge(edge))
}

pub(crate) async fn accept_follow(
    pool: &SqlitePool,
    actor: &AuthContext,
    edge_id: i64,
) -> ApiResult<FollowState> {
    let mut tx = db::begin_write(pool).await?;
    let mut edge = load_edge_for_target(&mut tx, actor, edge_id).await?;
    if !edge.is_accepted {
        let updated =
            sqlx::query("UPDATE follows SET is_accepted = 1 WHERE id = ? AND is_accepted = 0")
                .bind(edge_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        if updated > 0 {
            notifications::emit(
                &mut *tx,
                NewNotification::follow_accepted(actor, edge.follower_id),
            )
            .await?;
        }
    }
    tx.commit().await?;

    edge.is_accepted = true;
    Ok(FollowState::from_edge(Some(edge)))
}

pub(crate) async fn decline_follow(
    pool: &SqlitePool,
    actor: &AuthContext,
    edge_id: i64,
) -> ApiResult<()> {
    let mut tx = db::begin_write(pool).await?;
    let edge = load_edge_for_target(&mut tx, actor, edge_id).await?;
    if edge.is_accepted {
        return Err(ApiError::conflict(
            "INVALID_STATE",
            "follow request was already accepted",
        ));
    }
    sqlx::query("DELETE FROM follows WHERE id = ? AND is_accepted = 0")
        .bind(edge_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

async fn load_edge_for_target(
    tx: &mut sqlx::SqliteConnection,
    actor: &AuthContext,
    edge_id: i64,
) -> ApiResult<FollowEdge> {
    let edge = sqlx::query_as::<_, FollowEdge>(
        "SELECT id, follower_id, following_id, is_accepted FROM follows WHERE id = ?",
    )
    .bind(edge_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("follow request {edge_id} not found")))?;
    if edge.following_id != actor.user_id {
        return Err(ApiError::forbidden(
            "only the followed user can answer a follow request",
        ));
    }
    Ok(edge)
}

async fn find_edge(
    conn: &mut sqlx::SqliteConnection,
    follower_id: i64,
    following_id: i64,
) -> ApiResult<Option<FollowEdge>> {
    let edge = sqlx::query_as::<_, FollowEdge>(
        "SELECT id, follower_id, following_id, is_accepted FROM follows \
         WHERE follower_id = ? AND following_id = ?",
    )
    .bind(follower_id)
    .bind(following_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(edge)
}

pub(crate) async fn follow_status(
    pool: &SqlitePool,
    follower_id: i64,
    following_id: i64,
) -> ApiResult<FollowStatus> {
    let accepted = sqlx::query_scalar::<_, bool>(
        "SELECT is_accepted FROM follows WHERE follower_id = ? AND following_id = ?",
    )
    .bind(follower_id)
    .bind(following_id)
    .fetch_optional(pool)
    .await?;
    Ok(match accepted {
        None => FollowStatus::None,
        Some(false) => FollowStatus::Pending,
        Some(true) => FollowStatus::Following,
    })
}

/// Users with an accepted edge in both directions with `user_id`.
pub(crate) async fn mates_of(pool: &SqlitePool, user_id: i64) -> ApiResult<Vec<UserSummary>> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM follows f \
         JOIN follows back ON back.follower_id = f.following_id AND back.following_id = f.follower_id \
         JOIN users u ON u.id = f.following_id \
         WHERE f.follower_id = ? AND f.is_accepted = 1 AND back.is_accepted = 1 \
         ORDER BY u.username"
    );
    let mates = sqlx::query_as::<_, UserSummary>(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(mates)
}

pub async fn toggle(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> ApiResult<Json<FollowState>> {
    let auth = require_auth(&state, &headers).await?;
    let user_id = users::find_id_by_username(&state.pool, &username).await?;
    Ok(Json(toggle_follow(&state.pool, &auth, user_id).await?))
}

pub async fn status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> ApiResult<Json<FollowState>> {
    let auth = require_auth(&state, &headers).await?;
    let user_id = users::find_id_by_username(&state.pool, &username).await?;
    let mut conn = state.pool.acquire().await?;
    let edge = find_edge(&mut conn, auth.user_id, user_id).await?;
    Ok(Json(FollowState::from_edge(edge)))
}

pub async fn followers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    require_auth(&state, &headers).await?;
    let user_id = users::find_id_by_username(&state.pool, &username).await?;
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM follows f JOIN users u ON u.id = f.follower_id \
         WHERE f.following_id = ? AND f.is_accepted = 1 ORDER BY f.created_at DESC, f.id DESC"
    );
    let users = sqlx::query_as::<_, UserSummary>(&sql)
        .bind(user_id)
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(users))
}

pub async fn following(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    require_auth(&state, &headers).await?;
    let user_id = users::find_id_by_username(&state.pool, &username).await?;
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM follows f JOIN users u ON u.id = f.following_id \
         WHERE f.follower_id = ? AND f.is_accepted = 1 ORDER BY f.created_at DESC, f.id DESC"
    );
    let users = sqlx::query_as::<_, UserSummary>(&sql)
        .bind(user_id)
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(users))
}

pub async fn mates(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<UserSummary>>> {
    let auth = require_auth(&state, &headers).await?;
    Ok(Json(mates_of(&state.pool, auth.user_id).await?))
}

pub async fn requests(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<FollowRequest>>> {
    let auth = require_auth(&state, &headers).await?;
    let sql = format!(
        "SELECT f.id, {USER_COLUMNS}, f.created_at FROM follows f \
         JOIN users u ON u.id = f.follower_id \
         WHERE f.following_id = ? AND f.is_accepted = 0 ORDER BY f.created_at DESC, f.id DESC"
    );
    let requests = sqlx::query_as::<_, FollowRequest>(&sql)
        .bind(auth.user_id)
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(requests))
}

pub async fn accept(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(edge_id): Path<i64>,
) -> ApiResult<Json<FollowState>> {
    let auth = require_auth(&state, &headers).await?;
    Ok(Json(accept_follow(&state.pool, &auth, edge_id).await?))
}

pub async fn decline(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(edge_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let auth = require_auth(&state, &headers).await?;
    decline_follow(&state.pool, &auth, edge_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
