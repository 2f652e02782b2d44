use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tm_core::db;

use super::itinerary::{DayPhoto, ItineraryDay, NewDay, NewPhoto, TRIP_ITINERARY};
use super::{
    detach_interactions, push_stats_columns, Columns, ContentKey, ContentKind, InteractionStats,
    ListQuery, Selection,
};
use crate::auth::require_auth;
use crate::users::{UserSummary, USER_COLUMNS};
use crate::validation::{page_size, FieldErrors};
use crate::{now_millis, ApiError, ApiResult, AppState};

const COLUMNS: Columns = Columns {
    id: "p.id",
    owner: "p.author_id",
    text: "p.title",
    created_at: "p.created_at",
};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TripPost {
    pub post_type: ContentKind,
    pub id: i64,
    #[sqlx(flatten)]
    pub author: UserSummary,
    pub title: String,
    pub cover_photo: Option<String>,
    pub location_summary: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub day_count: i64,
    pub created_at: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub stats: InteractionStats,
}

#[derive(Debug, Serialize)]
pub struct TripPostDetail {
    #[serde(flatten)]
    pub post: TripPost,
    pub days: Vec<ItineraryDay>,
}

#[derive(Debug, Deserialize)]
pub struct NewTripPost {
    pub title: String,
    pub cover_photo: Option<String>,
    #[serde(default)]
    pub location_summary: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TripPostPatch {
    pub title: Option<String>,
    pub cover_photo: Option<String>,
    pub location_summary: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

pub(crate) async fn list(
    pool: &SqlitePool,
    viewer: Option<i64>,
    selection: &Selection,
    limit: i64,
) -> ApiResult<Vec<TripPost>> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT 'trip' AS post_type, p.id, ");
    qb.push(USER_COLUMNS).push(
        ", p.title, p.cover_photo, p.location_summary, p.start_date, p.end_date, p.created_at, \
         (SELECT COUNT(*) FROM trip_days d WHERE d.post_id = p.id) AS day_count",
    );
    push_stats_columns(&mut qb, ContentKind::Trip, COLUMNS.id, viewer);
    qb.push(" FROM trip_posts p JOIN users u ON u.id = p.author_id");
    selection.push_where(&mut qb, COLUMNS);
    Selection::push_order(&mut qb, COLUMNS, limit);

    let posts = qb.build_query_as::<TripPost>().fetch_all(pool).await?;
    Ok(posts)
}

pub(crate) async fn detail(
    pool: &SqlitePool,
    viewer: Option<i64>,
    id: i64,
) -> ApiResult<TripPostDetail> {
    let post = list(pool, viewer, &Selection::One(id), 1)
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found(format!("trip {id} not found")))?;
    let days = TRIP_ITINERARY.days(pool, id).await?;
    Ok(TripPostDetail { post, days })
}

pub async fn list_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<TripPost>>> {
    let auth = require_auth(&state, &headers).await?;
    let selection = query.author.map_or(Selection::All, Selection::Author);
    let posts = list(&state.pool, Some(auth.user_id), &selection, page_size(query.limit)).await?;
    Ok(Json(posts))
}

pub async fn create_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewTripPost>,
) -> ApiResult<(StatusCode, Json<TripPostDetail>)> {
    let auth = require_auth(&state, &headers).await?;

    let mut errors = FieldErrors::new();
    let title = errors.required_text("title", &payload.title, 200);
    let cover_photo = errors.media_ref("cover_photo", payload.cover_photo.as_deref());
    let location_summary = errors.optional_text("location_summary", &payload.location_summary, 300);
    errors.date_range("start_date", payload.start_date, payload.end_date);
    errors.into_result()?;

    let id = sqlx::query(
        "INSERT INTO trip_posts \
         (author_id, title, cover_photo, location_summary, start_date, end_date, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(auth.user_id)
    .bind(&title)
    .bind(&cover_photo)
    .bind(&location_summary)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(now_millis())
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    tracing::info!(trip_id = id, author_id = auth.user_id, "trip post created");
    let created = detail(&state.pool, Some(auth.user_id), id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<TripPostDetail>> {
    let auth = require_auth(&state, &headers).await?;
    Ok(Json(detail(&state.pool, Some(auth.user_id), id).await?))
}

pub async fn update_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(patch): Json<TripPostPatch>,
) -> ApiResult<Json<TripPostDetail>> {
    let auth = require_auth(&state, &headers).await?;
    let current = detail(&state.pool, Some(auth.user_id), id).await?;
    if current.post.author.id != auth.user_id {
        return Err(ApiError::forbidden("only the author can edit this trip post"));
    }

    let mut errors = FieldErrors::new();
    let title = patch
        .title
        .as_deref()
        .map(|value| errors.required_text("title", value, 200));
    let cover_photo = patch
        .cover_photo
        .as_deref()
        .map(|value| errors.media_ref("cover_photo", Some(value)));
    let location_summary = patch
        .location_summary
        .as_deref()
        .map(|value| errors.optional_text("location_summary", value, 300));
    errors.date_range(
        "start_date",
        patch.start_date.or(current.post.start_date),
        patch.end_date.or(current.post.end_date),
    );
    errors.into_result()?;

    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE trip_posts SET ");
    let mut changed = false;
    {
        let mut set = qb.separated(", ");
        if let Some(title) = title {
            set.push("title = ").push_bind_unseparated(title);
            changed = true;
        }
        if let Some(cover_photo) = cover_photo {
            set.push("cover_photo = ").push_bind_unseparated(cover_photo);
            changed = true;
        }
        if let Some(location_summary) = location_summary {
            set.push("location_summary = ")
                .push_bind_unseparated(location_summary);
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
    }
    if !changed {
        return Ok(Json(current));
    }
    qb.push(" WHERE id = ").push_bind(id);
    qb.build().execute(&state.pool).await?;

    Ok(Json(detail(&state.pool, Some(auth.user_id), id).await?))
}

pub async fn delete_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let auth = require_auth(&state, &headers).await?;
    let key = ContentKey::new(ContentKind::Trip, id);

    let mut tx = db::begin_write(&state.pool).await?;
    super::require_owner(&mut *tx, key, auth.user_id).await?;
    sqlx::query("DELETE FROM trip_posts WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    detach_interactions(&mut tx, key).await?;
    tx.commit().await?;

    tracing::info!(trip_id = id, author_id = auth.user_id, "trip post deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_day_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(payload): Json<NewDay>,
) -> ApiResult<(StatusCode, Json<ItineraryDay>)> {
    let auth = require_auth(&state, &headers).await?;
    let day = TRIP_ITINERARY
        .add_day(&state.pool, auth.user_id, id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(day)))
}

pub async fn add_photo_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, day_id)): Path<(i64, i64)>,
    Json(payload): Json<NewPhoto>,
) -> ApiResult<(StatusCode, Json<DayPhoto>)> {
    let auth = require_auth(&state, &headers).await?;
    let photo = TRIP_ITINERARY
        .add_photo(&state.pool, auth.user_id, id, day_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(photo)))
}
