//! Requests to join a joinable trip. Accepting one forms (or grows) the trip's
//! group inside a single transaction.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tm_core::db;

use crate::auth::{require_auth, AuthContext};
use crate::content::joinable::TripStatus;
use crate::content::{ContentKey, ContentKind, ContentRef};
use crate::groups::{self, GroupRole, GroupSummary};
use crate::notifications::{self, NewNotification};
use crate::users::{UserSummary, USER_COLUMNS};
use crate::{now_millis, ApiError, ApiResult, AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum JoinRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct JoinRequest {
    pub id: i64,
    pub trip_id: i64,
    #[sqlx(flatten)]
    pub requester: UserSummary,
    pub status: JoinRequestStatus,
    pub created_at: i64,
    pub decided_at: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AcceptedRequest {
    pub request: JoinRequest,
    pub group: GroupSummary,
}

#[derive(Debug, Deserialize)]
pub struct RequestFilter {
    pub status: Option<JoinRequestStatus>,
}

#[derive(Debug, FromRow)]
struct TripRow {
    creator_id: i64,
    title: String,
    status: TripStatus,
    max_members: i64,
}

#[derive(Debug, FromRow)]
struct DecisionRow {
    trip_id: i64,
    user_id: i64,
    status: JoinRequestStatus,
}

pub(crate) fn group_name(trip_title: &str) -> String {
    format!("{trip_title} crew")
}

async fn load_trip(conn: &mut SqliteConnection, trip_id: i64) -> ApiResult<TripRow> {
    sqlx::query_as::<_, TripRow>(
        "SELECT creator_id, title, status, max_members FROM joinable_trips WHERE id = ?",
    )
    .bind(trip_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("joinable trip {trip_id} not found")))
}

async fn load_request(conn: &mut SqliteConnection, request_id: i64) -> ApiResult<JoinRequest> {
    let sql = format!(
        "SELECT r.id, r.trip_id, {USER_COLUMNS}, r.status, r.created_at, r.decided_at \
         FROM join_requests r JOIN users u ON u.id = r.user_id WHERE r.id = ?"
    );
    sqlx::query_as::<_, JoinRequest>(&sql)
        .bind(request_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("join request {request_id} not found")))
}

fn trip_ref(trip_id: i64, trip: &TripRow) -> ContentRef {
    ContentRef {
        key: ContentKey::new(ContentKind::Joinable, trip_id),
        owner_id: trip.creator_id,
        title: trip.title.clone(),
    }
}

/// Files a request from `actor`. Asking again returns the existing request
/// whatever its status. The flag reports whether a new row was written.
pub(crate) async fn request_to_join(
    pool: &SqlitePool,
    actor: &AuthContext,
    trip_id: i64,
) -> ApiResult<(JoinRequest, bool)> {
    let mut tx = db::begin_write(pool).await?;
    let trip = load_trip(&mut tx, trip_id).await?;
    if trip.creator_id == actor.user_id {
        return Err(ApiError::invalid_operation(
            "cannot request to join your own trip",
        ));
    }

    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM join_requests WHERE trip_id = ? AND user_id = ?",
    )
    .bind(trip_id)
    .bind(actor.user_id)
    .fetch_optional(&mut *tx)
    .await?;
    if let Some(request_id) = existing {
        let request = load_request(&mut tx, request_id).await?;
        tx.commit().await?;
        return Ok((request, false));
    }

    if trip.status != TripStatus::Planning {
        return Err(ApiError::conflict(
            "INVALID_STATE",
            "trip is not accepting join requests",
        ));
    }

    let request_id = sqlx::query(
        "INSERT INTO join_requests (trip_id, user_id, status, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(trip_id)
    .bind(actor.user_id)
    .bind(JoinRequestStatus::Pending)
    .bind(now_millis())
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();
    notifications::emit(
        &mut *tx,
        NewNotification::join_request(actor, &trip_ref(trip_id, &trip)),
    )
    .await?;
    let request = load_request(&mut tx, request_id).await?;
    tx.commit().await?;

    tracing::info!(request_id, trip_id, user_id = actor.user_id, "join request created");
    Ok((request, true))
}

/// Accepts a pending request on a trip that is still planning. In one
/// transaction: flips the request, makes sure the group exists with the
/// creator as admin, adds the requester, notifies them and marks the trip full
/// when the group reaches capacity.
/// Accepting an already accepted request changes nothing.
pub(crate) async fn accept_request(
    pool: &SqlitePool,
    actor: &AuthContext,
    request_id: i64,
) -> ApiResult<AcceptedRequest> {
    let mut tx = db::begin_write(pool).await?;
    let decision = load_decision(&mut tx, request_id).await?;
    let trip = load_trip(&mut tx, decision.trip_id).await?;
    if trip.creator_id != actor.user_id {
        return Err(ApiError::forbidden(
            "only the trip creator can answer join requests",
        ));
    }

    match decision.status {
        JoinRequestStatus::Rejected => {
            return Err(ApiError::conflict(
                "INVALID_STATE",
                "join request was already rejected",
            ));
        }
        JoinRequestStatus::Accepted => {
            let group_id =
                groups::get_or_create(&mut tx, decision.trip_id, &group_name(&trip.title)).await?;
            let request = load_request(&mut tx, request_id).await?;
            let group = groups::summary(&mut *tx, group_id).await?;
            tx.commit().await?;
            return Ok(AcceptedRequest { request, group });
        }
        JoinRequestStatus::Pending => {}
    }

    match trip.status {
        TripStatus::Planning => {}
        TripStatus::Full => {
            return Err(ApiError::conflict("TRIP_FULL", "trip has no free places"));
        }
        TripStatus::Ongoing | TripStatus::Completed => {
            return Err(ApiError::conflict(
                "INVALID_STATE",
                "trip is no longer taking members",
            ));
        }
    }

    let group_id = groups::get_or_create(&mut tx, decision.trip_id, &group_name(&trip.title)).await?;
    groups::add_member(&mut tx, group_id, trip.creator_id, GroupRole::Admin).await?;
    let members = groups::member_count(&mut tx, group_id).await?;
    if members >= trip.max_members {
        return Err(ApiError::conflict("TRIP_FULL", "trip has no free places"));
    }

    let updated = sqlx::query(
        "UPDATE join_requests SET status = ?, decided_at = ? WHERE id = ? AND status = ?",
    )
    .bind(JoinRequestStatus::Accepted)
    .bind(now_millis())
    .bind(request_id)
    .bind(JoinRequestStatus::Pending)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated > 0 {
        groups::add_member(&mut tx, group_id, decision.user_id, GroupRole::Member).await?;
        notifications::emit(
            &mut *tx,
            NewNotification::join_accepted(
                actor,
                decision.user_id,
                &trip_ref(decision.trip_id, &trip),
            ),
        )
        .await?;
        if members + 1 >= trip.max_members {
            sqlx::query("UPDATE joinable_trips SET status = ? WHERE id = ? AND status = ?")
                .bind(TripStatus::Full)
                .bind(decision.trip_id)
                .bind(TripStatus::Planning)
                .execute(&mut *tx)
                .await?;
        }
    }

    let request = load_request(&mut tx, request_id).await?;
    let group = groups::summary(&mut *tx, group_id).await?;
    tx.commit().await?;

    tracing::info!(
        request_id,
        trip_id = decision.trip_id,
        group_id,
        member_count = group.member_count,
        "join request accepted"
    );
    Ok(AcceptedRequest { request, group })
}

/// Rejects a pending request. Rejecting twice is a no-op; rejecting an
/// accepted request is refused.
pub(crate) async fn reject_request(
    pool: &SqlitePool,
    actor: &AuthContext,
    request_id: i64,
) -> ApiResult<JoinRequest> {
    let mut tx = db::begin_write(pool).await?;
    let decision = load_decision(&mut tx, request_id).await?;
    let trip = load_trip(&mut tx, decision.trip_id).await?;
    if trip.creator_id != actor.user_id {
        return Err(ApiError::forbidden(
            "only the trip creator can answer join requests",
        ));
    }

    match decision.status {
        JoinRequestStatus::Accepted => {
            return Err(ApiError::conflict(
                "INVALID_STATE",
                "join request was already accepted",
            ));
        }
        JoinRequestStatus::Rejected => {}
        JoinRequestStatus::Pending => {
            sqlx::query(
                "UPDATE join_requests SET status = ?, decided_at = ? WHERE id = ? AND status = ?",
            )
            .bind(JoinRequestStatus::Rejected)
            .bind(now_millis())
            .bind(request_id)
            .bind(JoinRequestStatus::Pending)
            .execute(&mut *tx)
            .await?;
        }
    }

    let request = load_request(&mut tx, request_id).await?;
    tx.commit().await?;
    Ok(request)
}

async fn load_decision(conn: &mut SqliteConnection, request_id: i64) -> ApiResult<DecisionRow> {
    sqlx::query_as::<_, DecisionRow>(
        "SELECT trip_id, user_id, status FROM join_requests WHERE id = ?",
    )
    .bind(request_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("join request {request_id} not found")))
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(trip_id): Path<i64>,
) -> ApiResult<(StatusCode, Json<JoinRequest>)> {
    let auth = require_auth(&state, &headers).await?;
    let (request, created) = request_to_join(&state.pool, &auth, trip_id).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(request)))
}

pub async fn list_for_trip(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(trip_id): Path<i64>,
    Query(filter): Query<RequestFilter>,
) -> ApiResult<Json<Vec<JoinRequest>>> {
    let auth = require_auth(&state, &headers).await?;
    let mut conn = state.pool.acquire().await?;
    let trip = load_trip(&mut conn, trip_id).await?;
    if trip.creator_id != auth.user_id {
        return Err(ApiError::forbidden(
            "only the trip creator can see join requests",
        ));
    }

    let sql = format!(
        "SELECT r.id, r.trip_id, {USER_COLUMNS}, r.status, r.created_at, r.decided_at \
         FROM join_requests r JOIN users u ON u.id = r.user_id \
         WHERE r.trip_id = ?1 AND (?2 IS NULL OR r.status = ?2) \
         ORDER BY r.created_at DESC, r.id DESC"
    );
    let requests = sqlx::query_as::<_, JoinRequest>(&sql)
        .bind(trip_id)
        .bind(filter.status)
        .fetch_all(&mut *conn)
        .await?;
    Ok(Json(requests))
}

pub async fn accept(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(request_id): Path<i64>,
) -> ApiResult<Json<AcceptedRequest>> {
    let auth = require_auth(&state, &headers).await?;
    Ok(Json(accept_request(&state.pool, &auth, request_id).await?))
}

pub async fn reject(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(request_id): Path<i64>,
) -> ApiResult<Json<JoinRequest>> {
    let auth = require_auth(&state, &headers).await?;
    Ok(Json(reject_request(&state.pool, &auth, request_id).await?))
}
