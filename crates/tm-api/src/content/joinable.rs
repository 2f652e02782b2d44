use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tm_core::db;

use super::{
    detach_interactions, load_images, push_stats_columns, replace_images, require_owner, Columns,
    ContentKey, ContentKind, InteractionStats, ListQuery, MediaImage, Selection,
};
use crate::auth::require_auth;
use crate::users::{UserSummary, USER_COLUMNS};
use crate::validation::{page_size, FieldErrors};
use crate::{now_millis, ApiError, ApiResult, AppState};

const COLUMNS: Columns = Columns {
    id: "t.id",
    owner: "t.creator_id",
    text: "(t.title || ' ' || t.destination)",
    created_at: "t.created_at",
};
const IMAGES_TABLE: &str = "joinable_trip_images";
const IMAGES_OWNER: &str = "trip_id";
const MAX_IMAGES: usize = 10;
const MAX_GROUP_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TripStatus {
    Planning,
    Full,
    Ongoing,
    Completed,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct JoinableTrip {
    pub post_type: ContentKind,
    pub id: i64,
    #[sqlx(flatten)]
    pub creator: UserSummary,
    pub title: String,
    pub destination: String,
    pub details: String,
    pub budget: Option<i64>,
    pub min_members: i64,
    pub max_members: i64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: TripStatus,
    pub member_count: i64,
    pub group_id: Option<i64>,
    pub created_at: i64,
    #[sqlx(skip)]
    pub images: Vec<MediaImage>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub stats: InteractionStats,
}

#[derive(Debug, Deserialize)]
pub struct NewJoinableTrip {
    pub title: String,
    pub destination: String,
    #[serde(default)]
    pub details: String,
    pub budget: Option<i64>,
    #[serde(default = "default_min_members")]
    pub min_members: i64,
    pub max_members: i64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub images: Vec<String>,
}

fn default_min_members() -> i64 {
    1
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinableTripPatch {
    pub title: Option<String>,
    pub destination: Option<String>,
    pub details: Option<String>,
    pub budget: Option<i64>,
    pub min_members: Option<i64>,
    pub max_members: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<TripStatus>,
    pub images: Option<Vec<String>>,
}

pub(crate) async fn list(
    pool: &SqlitePool,
    viewer: Option<i64>,
    selection: &Selection,
    limit: i64,
) -> ApiResult<Vec<JoinableTrip>> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT 'joinable' AS post_type, t.id, ");
    qb.push(USER_COLUMNS).push(
        ", t.title, t.destination, t.details, t.budget, t.min_members, t.max_members, \
         t.start_date, t.end_date, t.status, t.created_at, \
         (SELECT g.id FROM trip_groups g WHERE g.trip_id = t.id) AS group_id, \
         (SELECT COUNT(*) FROM group_members gm JOIN trip_groups g ON g.id = gm.group_id \
          WHERE g.trip_id = t.id) AS member_count",
    );
    push_stats_columns(&mut qb, ContentKind::Joinable, COLUMNS.id, viewer);
    qb.push(" FROM joinable_trips t JOIN users u ON u.id = t.creator_id");
    selection.push_where(&mut qb, COLUMNS);
    Selection::push_order(&mut qb, COLUMNS, limit);

    let mut trips = qb.build_query_as::<JoinableTrip>().fetch_all(pool).await?;
    let ids: Vec<i64> = trips.iter().map(|trip| trip.id).collect();
    let mut images = load_images(pool, IMAGES_TABLE, IMAGES_OWNER, &ids).await?;
    for trip in &mut trips {
        trip.images = images.remove(&trip.id).unwrap_or_default();
    }
    Ok(trips)
}

pub(crate) async fn detail(
    pool: &SqlitePool,
    viewer: Option<i64>,
    id: i64,
) -> ApiResult<JoinableTrip> {
    list(pool, viewer, &Selection::One(id), 1)
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found(format!("joinable trip {id} not found")))
}

fn check_sizes(
    errors: &mut FieldErrors,
    budget: Option<i64>,
    min_members: i64,
    max_members: i64,
    images: usize,
) {
    if budget.is_some_and(|budget| budget < 0) {
        errors.add("budget", "must not be negative");
    }
    if min_members < 1 {
        errors.add("min_members", "must be at least 1");
    }
    if max_members < 2 || max_members > MAX_GROUP_SIZE {
        errors.add(
            "max_members",
            format!("must be between 2 and {MAX_GROUP_SIZE}"),
        );
    }
    if min_members > max_members {
        errors.add("min_members", "must not exceed max_members");
    }
    if images > MAX_IMAGES {
        errors.add("images", format!("at most {MAX_IMAGES} images"));
    }
}

pub async fn list_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<JoinableTrip>>> {
    let auth = require_auth(&state, &headers).await?;
    let selection = query.author.map_or(Selection::All, Selection::Author);
    let trips = list(&state.pool, Some(auth.user_id), &selection, page_size(query.limit)).await?;
    Ok(Json(trips))
}

pub async fn create_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewJoinableTrip>,
) -> ApiResult<(StatusCode, Json<JoinableTrip>)> {
    let auth = require_auth(&state, &headers).await?;

    let mut errors = FieldErrors::new();
    let title = errors.required_text("title", &payload.title, 200);
    let destination = errors.required_text("destination", &payload.destination, 200);
    let details = errors.optional_text("details", &payload.details, 10_000);
    let images = errors.media_refs("images", &payload.images);
    check_sizes(
        &mut errors,
        payload.budget,
        payload.min_members,
        payload.max_members,
        images.len(),
    );
    errors.date_range("start_date", payload.start_date, payload.end_date);
    errors.into_result()?;

    let mut tx = db::begin_write(&state.pool).await?;
    let id = sqlx::query(
        "INSERT INTO joinable_trips \
         (creator_id, title, destination, details, budget, min_members, max_members, \
          start_date, end_date, status, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(auth.user_id)
    .bind(&title)
    .bind(&destination)
    .bind(&details)
    .bind(payload.budget)
    .bind(payload.min_members)
    .bind(payload.max_members)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(TripStatus::Planning)
    .bind(now_millis())
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();
    replace_images(&mut tx, IMAGES_TABLE, IMAGES_OWNER, id, &images).await?;
    tx.commit().await?;

    tracing::info!(trip_id = id, creator_id = auth.user_id, "joinable trip created");
    let created = detail(&state.pool, Some(auth.user_id), id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<JoinableTrip>> {
    let auth = require_auth(&state, &headers).await?;
    Ok(Json(detail(&state.pool, Some(auth.user_id), id).await?))
}

pub async fn update_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(patch): Json<JoinableTripPatch>,
) -> ApiResult<Json<JoinableTrip>> {
    let auth = require_auth(&state, &headers).await?;
    let current = detail(&state.pool, Some(auth.user_id), id).await?;
    if current.creator.id != auth.user_id {
        return Err(ApiError::forbidden(
            "only the creator can edit this joinable trip",
        ));
    }

    let mut errors = FieldErrors::new();
    let title = patch
        .title
        .as_deref()
        .map(|value| errors.required_text("title", value, 200));
    let destination = patch
        .destination
        .as_deref()
        .map(|value| errors.required_text("destination", value, 200));
    let details = patch
        .details
        .as_deref()
        .map(|value| errors.optional_text("details", value, 10_000));
    let images = patch
        .images
        .as_deref()
        .map(|values| errors.media_refs("images", values));
    let max_members = patch.max_members.unwrap_or(current.max_members);
    check_sizes(
        &mut errors,
        patch.budget,
        patch.min_members.unwrap_or(current.min_members),
        max_members,
        images.as_ref().map_or(0, Vec::len),
    );
    if max_members < current.member_count {
        errors.add(
            "max_members",
            format!("the group already has {} members", current.member_count),
        );
    }
    errors.date_range(
        "start_date",
        patch.start_date.or(current.start_date),
        patch.end_date.or(current.end_date),
    );
    errors.into_result()?;

    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE joinable_trips SET ");
    let mut changed = false;
    {
        let mut set = qb.separated(", ");
        if let Some(title) = title {
            set.push("title = ").push_bind_unseparated(title);
            changed = true;
        }
        if let Some(destination) = destination {
            set.push("destination = ").push_bind_unseparated(destination);
            changed = true;
        }
        if let Some(details) = details {
            set.push("details = ").push_bind_unseparated(details);
            changed = true;
        }
        if let Some(budget) = patch.budget {
            set.push("budget = ").push_bind_unseparated(budget);
            changed = true;
        }
        if let Some(min_members) = patch.min_members {
            set.push("min_members = ").push_bind_unseparated(min_members);
            changed = true;
        }
        if let Some(max_members) = patch.max_members {
            set.push("max_members = ").push_bind_unseparated(max_members);
            changed = true;
        }
        if let Some(start_date) = patch.start_date {
            set.push("start_date = ").push_bind_unseparated(start_date);
            changed = true;
        }
        if let Some(end_date) = patch.end_date {
            set.push("end_date = ").push_bind_unseparated(end_date);
            changed = true;
        }
        if let Some(status) = patch.status {
            set.push("status = ").push_bind_unseparated(status);
            changed = true;
        }
    }

    let mut tx = db::begin_write(&state.pool).await?;
    if changed {
        qb.push(" WHERE id = ").push_bind(id);
        qb.build().execute(&mut *tx).await?;
    }
    if let Some(images) = images {
        replace_images(&mut tx, IMAGES_TABLE, IMAGES_OWNER, id, &images).await?;
    }
    tx.commit().await?;

    Ok(Json(detail(&state.pool, Some(auth.user_id), id).await?))
}

pub async fn delete_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let auth = require_auth(&state, &headers).await?;
    let key = ContentKey::new(ContentKind::Joinable, id);

    let mut tx = db::begin_write(&state.pool).await?;
    require_owner(&mut *tx, key, auth.user_id).await?;
    sqlx::query("DELETE FROM joinable_trips WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    detach_interactions(&mut tx, key).await?;
    tx.commit().await?;

    tracing::info!(trip_id = id, creator_id = auth.user_id, "joinable trip deleted");
    Ok(StatusCode::NO_CONTENT)
}
