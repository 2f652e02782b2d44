use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqliteConnection, SqlitePool};

use crate::auth::{require_auth, AuthContext};
use crate::users::{UserSummary, USER_COLUMNS};
use crate::validation::FieldErrors;
use crate::{now_millis, ApiError, ApiResult, AppState};

pub(crate) const MAX_MESSAGE_CHARS: usize = 4000;
const DEFAULT_HISTORY: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum GroupRole {
    Admin,
    Member,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GroupSummary {
    pub id: i64,
    pub trip_id: i64,
    pub name: String,
    pub member_count: i64,
    pub created_at: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct GroupMember {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub user: UserSummary,
    pub role: GroupRole,
    pub joined_at: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct GroupMessage {
    pub id: i64,
    pub group_id: i64,
    #[sqlx(flatten)]
    pub sender: UserSummary,
    pub text: String,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct NewGroupMessage {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

const SUMMARY_SELECT: &str = "SELECT g.id, g.trip_id, g.name, g.created_at, \
     (SELECT COUNT(*) FROM group_members m WHERE m.group_id = g.id) AS member_count \
     FROM trip_groups g";

/// Returns the group of `trip_id`, creating it first when the trip has none.
pub(crate) async fn get_or_create(
    conn: &mut SqliteConnection,
    trip_id: i64,
    name: &str,
) -> ApiResult<i64> {
    sqlx::query(
        "INSERT INTO trip_groups (trip_id, name, created_at) VALUES (?, ?, ?) \
         ON CONFLICT (trip_id) DO NOTHING",
    )
    .bind(trip_id)
    .bind(name)
    .bind(now_millis())
    .execute(&mut *conn)
    .await?;
    let group_id = sqlx::query_scalar::<_, i64>("SELECT id FROM trip_groups WHERE trip_id = ?")
        .bind(trip_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(group_id)
}

/// Adds a membership row; an existing membership is left as it is.
pub(crate) async fn add_member(
    conn: &mut SqliteConnection,
    group_id: i64,
    user_id: i64,
    role: GroupRole,
) -> ApiResult<bool> {
    let inserted = sqlx::query(
        "INSERT INTO group_members (group_id, user_id, role, joined_at) VALUES (?, ?, ?, ?) \
         ON CONFLICT (group_id, user_id) DO NOTHING",
    )
    .bind(group_id)
    .bind(user_id)
    .bind(role)
    .bind(now_millis())
    .execute(&mut *conn)
    .await?
    .rows_affected();
    Ok(inserted > 0)
}

pub(crate) async fn member_count(conn: &mut SqliteConnection, group_id: i64) -> ApiResult<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM group_members WHERE group_id = ?")
        .bind(group_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

pub(crate) async fn summary<'c, E>(executor: E, group_id: i64) -> ApiResult<GroupSummary>
where
    E: Executor<'c, Database = Sqlite>,
{
    let sql = format!("{SUMMARY_SELECT} WHERE g.id = ?");
    sqlx::query_as::<_, GroupSummary>(&sql)
        .bind(group_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("group {group_id} not found")))
}

/// 404 for a missing group, 403 for a non-member.
async fn require_member(pool: &SqlitePool, actor: &AuthContext, group_id: i64) -> ApiResult<()> {
    let membership = sqlx::query_as::<_, (i64, Option<i64>)>(
        "SELECT g.id, m.user_id FROM trip_groups g \
         LEFT JOIN group_members m ON m.group_id = g.id AND m.user_id = ? \
         WHERE g.id = ?",
    )
    .bind(actor.user_id)
    .bind(group_id)
    .fetch_optional(pool)
    .await?;
    match membership {
        None => Err(ApiError::not_found(format!("group {group_id} not found"))),
        Some((_, None)) => Err(ApiError::forbidden("only group members can access this group")),
        Some((_, Some(_))) => Ok(()),
    }
}

pub(crate) async fn post_message(
    pool: &SqlitePool,
    actor: &AuthContext,
    group_id: i64,
    text: &str,
) -> ApiResult<GroupMessage> {
    require_member(pool, actor, group_id).await?;
    let mut errors = FieldErrors::new();
    let text = errors.required_text("text", text, MAX_MESSAGE_CHARS);
    errors.into_result()?;

    let id = sqlx::query(
        "INSERT INTO group_messages (group_id, sender_id, text, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(group_id)
    .bind(actor.user_id)
    .bind(&text)
    .bind(now_millis())
    .execute(pool)
    .await?
    .last_insert_rowid();

    let sql = format!(
        "SELECT gm.id, gm.group_id, {USER_COLUMNS}, gm.text, gm.created_at \
         FROM group_messages gm JOIN users u ON u.id = gm.sender_id WHERE gm.id = ?"
    );
    let message = sqlx::query_as::<_, GroupMessage>(&sql)
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(message)
}

pub async fn my_groups(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<GroupSummary>>> {
    let auth = require_auth(&state, &headers).await?;
    let sql = format!(
        "{SUMMARY_SELECT} JOIN group_members mine ON mine.group_id = g.id AND mine.user_id = ? \
         ORDER BY g.created_at DESC, g.id DESC"
    );
    let groups = sqlx::query_as::<_, GroupSummary>(&sql)
        .bind(auth.user_id)
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(groups))
}

pub async fn members(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<i64>,
) -> ApiResult<Json<Vec<GroupMember>>> {
    let auth = require_auth(&state, &headers).await?;
    require_member(&state.pool, &auth, group_id).await?;
    let sql = format!(
        "SELECT {USER_COLUMNS}, m.role, m.joined_at FROM group_members m \
         JOIN users u ON u.id = m.user_id WHERE m.group_id = ? \
         ORDER BY m.role = 'admin' DESC, m.joined_at, m.id"
    );
    let members = sqlx::query_as::<_, GroupMember>(&sql)
        .bind(group_id)
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(members))
}

/// The most recent messages, oldest first.
pub async fn messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<GroupMessage>>> {
    let auth = require_auth(&state, &headers).await?;
    require_member(&state.pool, &auth, group_id).await?;
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY).clamp(1, 500);
    let sql = format!(
        "SELECT * FROM ( \
           SELECT gm.id, gm.group_id, {USER_COLUMNS}, gm.text, gm.created_at \
           FROM group_messages gm JOIN users u ON u.id = gm.sender_id \
           WHERE gm.group_id = ? ORDER BY gm.created_at DESC, gm.id DESC LIMIT ? \
         ) ORDER BY created_at, id"
    );
    let messages = sqlx::query_as::<_, GroupMessage>(&sql)
        .bind(group_id)
        .bind(limit)
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(messages))
}

pub async fn send(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<i64>,
    Json(payload): Json<NewGroupMessage>,
) -> ApiResult<(StatusCode, Json<GroupMessage>)> {
    let auth = require_auth(&state, &headers).await?;
    let message = post_message(&state.pool, &auth, group_id, &payload.text).await?;
    Ok((StatusCode::CREATED, Json(message)))
}
