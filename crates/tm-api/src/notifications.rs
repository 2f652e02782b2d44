use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};

use crate::auth::{require_auth, AuthContext};
use crate::content::{ContentKind, ContentRef};
use crate::users::UserSummary;
use crate::validation::page_size;
use crate::{now_millis, ApiResult, AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum NotificationKind {
    JoinRequest,
    RequestAccepted,
    Follow,
    Like,
    Comment,
}

/// A notification about to be written. Built by the operation that causes it.
#[derive(Debug, Clone)]
pub(crate) struct NewNotification {
    pub receiver_id: i64,
    pub sender_id: i64,
    pub kind: NotificationKind,
    pub content_kind: Option<ContentKind>,
    pub content_id: Option<i64>,
    pub text: String,
}

impl NewNotification {
    fn about(
        actor: &AuthContext,
        receiver_id: i64,
        kind: NotificationKind,
        content: Option<&ContentRef>,
        text: String,
    ) -> Self {
        Self {
            receiver_id,
            sender_id: actor.user_id,
            kind,
            content_kind: content.map(|content| content.key.kind),
            content_id: content.map(|content| content.key.id),
            text,
        }
    }

    pub(crate) fn like(actor: &AuthContext, content: &ContentRef) -> Self {
        let text = format!(
            "{} liked your {} \"{}\"",
            actor.username,
            content.key.kind.noun(),
            content.title
        );
        Self::about(actor, content.owner_id, NotificationKind::Like, Some(content), text)
    }

    pub(crate) fn comment(actor: &AuthContext, content: &ContentRef) -> Self {
        let text = format!(
            "{} commented on your {} \"{}\"",
            actor.username,
            content.key.kind.noun(),
            content.title
        );
        Self::about(actor, content.owner_id, NotificationKind::Comment, Some(content), text)
    }

    pub(crate) fn follow(actor: &AuthContext, target_id: i64, accepted: bool) -> Self {
        let text = if accepted {
            format!("{} started following you", actor.username)
        } else {
            format!("{} wants to follow you", actor.username)
        };
        Self::about(actor, target_id, NotificationKind::Follow, None, text)
    }

    pub(crate) fn follow_accepted(actor: &AuthContext, follower_id: i64) -> Self {
        let text = format!("{} accepted your follow request", actor.username);
        Self::about(actor, follower_id, NotificationKind::RequestAccepted, None, text)
    }

    pub(crate) fn join_request(actor: &AuthContext, trip: &ContentRef) -> Self {
        let text = format!("{} asked to join \"{}\"", actor.username, trip.title);
        Self::about(actor, trip.owner_id, NotificationKind::JoinRequest, Some(trip), text)
    }

    pub(crate) fn join_accepted(actor: &AuthContext, requester_id: i64, trip: &ContentRef) -> Self {
        let text = format!(
            "{} accepted your request to join \"{}\"",
            actor.username, trip.title
        );
        Self::about(
            actor,
            requester_id,
            NotificationKind::RequestAccepted,
            Some(trip),
            text,
        )
    }
}

/// Writes `notification` unless it is addressed to its own sender.
/// Returns whether a row was written.
pub(crate) async fn emit<'c, E>(executor: E, notification: NewNotification) -> ApiResult<bool>
where
    E: Executor<'c, Database = Sqlite>,
{
    if notification.receiver_id == notification.sender_id {
        return Ok(false);
    }
    sqlx::query(
        "INSERT INTO notifications \
         (receiver_id, sender_id, kind, content_kind, content_id, text, is_read, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, 0, ?)",
    )
    .bind(notification.receiver_id)
    .bind(notification.sender_id)
    .bind(notification.kind)
    .bind(notification.content_kind)
    .bind(notification.content_id)
    .bind(&notification.text)
    .bind(now_millis())
    .execute(executor)
    .await?;
    tracing::debug!(
        receiver_id = notification.receiver_id,
        kind = ?notification.kind,
        "notification emitted"
    );
    Ok(true)
}

#[derive(Debug, FromRow)]
struct NotificationRow {
    id: i64,
    kind: NotificationKind,
    sender_id: Option<i64>,
    sender_username: Option<String>,
    sender_full_name: Option<String>,
    sender_avatar: Option<String>,
    content_kind: Option<ContentKind>,
    content_id: Option<i64>,
    text: String,
    is_read: bool,
    created_at: i64,
}

#[derive(Debug, Serialize)]
pub struct Notification {
    pub id: i64,
    pub notification_type: NotificationKind,
    pub sender: Option<UserSummary>,
    pub post_type: Option<ContentKind>,
    pub content_id: Option<i64>,
    pub text: String,
    pub is_read: bool,
    pub created_at: i64,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        let sender = match (row.sender_id, row.sender_username) {
            (Some(id), Some(username)) => Some(UserSummary {
                id,
                username,
                full_name: row.sender_full_name.unwrap_or_default(),
                avatar: row.sender_avatar,
            }),
            _ => None,
        };
        Self {
            id: row.id,
            notification_type: row.kind,
            sender,
            post_type: row.content_kind,
            content_id: row.content_id,
            text: row.text,
            is_read: row.is_read,
            created_at: row.created_at,
        }
    }
}

#[derive(Deserialize)]
pub struct NotificationQuery {
    pub limit: Option<i64>,
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    let auth = require_auth(&state, &headers).await?;
    let rows = sqlx::query_as::<_, NotificationRow>(
        "SELECT n.id, n.kind, s.id AS sender_id, s.username AS sender_username, \
                s.full_name AS sender_full_name, s.avatar AS sender_avatar, \
                n.content_kind, n.content_id, n.text, n.is_read, n.created_at \
         FROM notifications n LEFT JOIN users s ON s.id = n.sender_id \
         WHERE n.receiver_id = ?1 AND (?2 = 0 OR n.is_read = 0) \
         ORDER BY n.created_at DESC, n.id DESC LIMIT ?3",
    )
    .bind(auth.user_id)
    .bind(query.unread_only)
    .bind(page_size(query.limit))
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows.into_iter().map(Notification::from).collect()))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<MarkAllReadResponse>> {
    let auth = require_auth(&state, &headers).await?;
    let updated = sqlx::query(
        "UPDATE notifications SET is_read = 1 WHERE receiver_id = ? AND is_read = 0",
    )
    .bind(auth.user_id)
    .execute(&state.pool)
    .await?
    .rows_affected();
    Ok(Json(MarkAllReadResponse { updated }))
}
