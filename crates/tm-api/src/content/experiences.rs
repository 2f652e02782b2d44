use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tm_core::db;

use super::itinerary::{DayPhoto, ItineraryDay, NewDay, NewPhoto, EXPERIENCE_ITINERARY};
use super::{
    detach_interactions, push_stats_columns, require_owner, Columns, ContentKey, ContentKind,
    InteractionStats, ListQuery, Selection,
};
use crate::auth::require_auth;
use crate::users::{UserSummary, USER_COLUMNS};
use crate::validation::{page_size, FieldErrors};
use crate::{now_millis, ApiError, ApiResult, AppState};

const COLUMNS: Columns = Columns {
    id: "e.id",
    owner: "e.author_id",
    text: "e.title",
    created_at: "e.created_at",
};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ExperiencePost {
    pub post_type: ContentKind,
    pub id: i64,
    #[sqlx(flatten)]
    pub author: UserSummary,
    pub title: String,
    pub description: String,
    pub location: String,
    pub cover_photo: Option<String>,
    pub day_count: i64,
    pub created_at: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub stats: InteractionStats,
}

#[derive(Debug, Serialize)]
pub struct ExperienceDetail {
    #[serde(flatten)]
    pub post: ExperiencePost,
    pub days: Vec<ItineraryDay>,
}

#[derive(Debug, Deserialize)]
pub struct NewExperience {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    pub cover_photo: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExperiencePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub cover_photo: Option<String>,
}

pub(crate) async fn list(
    pool: &SqlitePool,
    viewer: Option<i64>,
    selection: &Selection,
    limit: i64,
) -> ApiResult<Vec<ExperiencePost>> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT 'experience' AS post_type, e.id, ");
    qb.push(USER_COLUMNS).push(
        ", e.title, e.description, e.location, e.cover_photo, e.created_at, \
         (SELECT COUNT(*) FROM experience_days d WHERE d.post_id = e.id) AS day_count",
    );
    push_stats_columns(&mut qb, ContentKind::Experience, COLUMNS.id, viewer);
    qb.push(" FROM experience_posts e JOIN users u ON u.id = e.author_id");
    selection.push_where(&mut qb, COLUMNS);
    Selection::push_order(&mut qb, COLUMNS, limit);

    let posts = qb.build_query_as::<ExperiencePost>().fetch_all(pool).await?;
    Ok(posts)
}

pub(crate) async fn detail(
    pool: &SqlitePool,
    viewer: Option<i64>,
    id: i64,
) -> ApiResult<ExperienceDetail> {
    let post = list(pool, viewer, &Selection::One(id), 1)
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found(format!("experience {id} not found")))?;
    let days = EXPERIENCE_ITINERARY.days(pool, id).await?;
    Ok(ExperienceDetail { post, days })
}

pub async fn list_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<ExperiencePost>>> {
    let auth = require_auth(&state, &headers).await?;
    let selection = query.author.map_or(Selection::All, Selection::Author);
    let posts = list(&state.pool, Some(auth.user_id), &selection, page_size(query.limit)).await?;
    Ok(Json(posts))
}

pub async fn create_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewExperience>,
) -> ApiResult<(StatusCode, Json<ExperienceDetail>)> {
    let auth = require_auth(&state, &headers).await?;

    let mut errors = FieldErrors::new();
    let title = errors.required_text("title", &payload.title, 200);
    let description = errors.optional_text("description", &payload.description, 10_000);
    let location = errors.optional_text("location", &payload.location, 300);
    let cover_photo = errors.media_ref("cover_photo", payload.cover_photo.as_deref());
    errors.into_result()?;

    let id = sqlx::query(
        "INSERT INTO experience_posts \
         (author_id, title, description, location, cover_photo, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(auth.user_id)
    .bind(&title)
    .bind(&description)
    .bind(&location)
    .bind(&cover_photo)
    .bind(now_millis())
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    tracing::info!(experience_id = id, author_id = auth.user_id, "experience created");
    let created = detail(&state.pool, Some(auth.user_id), id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<ExperienceDetail>> {
    let auth = require_auth(&state, &headers).await?;
    Ok(Json(detail(&state.pool, Some(auth.user_id), id).await?))
}

pub async fn update_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(patch): Json<ExperiencePatch>,
) -> ApiResult<Json<ExperienceDetail>> {
    let auth = require_auth(&state, &headers).await?;
    require_owner(
        &state.pool,
        ContentKey::new(ContentKind::Experience, id),
        auth.user_id,
    )
    .await?;

    let mut errors = FieldErrors::new();
    let title = patch
        .title
        .as_deref()
        .map(|value| errors.required_text("title", value, 200));
    let description = patch
        .description
        .as_deref()
        .map(|value| errors.optional_text("description", value, 10_000));
    let location = patch
        .location
        .as_deref()
        .map(|value| errors.optional_text("location", value, 300));
    let cover_photo = patch
        .cover_photo
        .as_deref()
        .map(|value| errors.media_ref("cover_photo", Some(value)));
    errors.into_result()?;

    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE experience_posts SET ");
    let mut changed = false;
    {
        let mut set = qb.separated(", ");
        if let Some(title) = title {
            set.push("title = ").push_bind_unseparated(title);
            changed = true;
        }
        if let Some(description) = description {
            set.push("description = ").push_bind_unseparated(description);
            changed = true;
        }
        if let Some(location) = location {
            set.push("location = ").push_bind_unseparated(location);
            changed = true;
        }
        if let Some(cover_photo) = cover_photo {
            set.push("cover_photo = ").push_bind_unseparated(cover_photo);
            changed = true;
        }
    }
    if changed {
        qb.push(" WHERE id = ").push_bind(id);
        qb.build().execute(&state.pool).await?;
    }

    Ok(Json(detail(&state.pool, Some(auth.user_id), id).await?))
}

pub async fn delete_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let auth = require_auth(&state, &headers).await?;
    let key = ContentKey::new(ContentKind::Experience, id);

    let mut tx = db::begin_write(&state.pool).await?;
    require_owner(&mut *tx, key, auth.user_id).await?;
    sqlx::query("DELETE FROM experience_posts WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    detach_interactions(&mut tx, key).await?;
    tx.commit().await?;

    tracing::info!(experience_id = id, author_id = auth.user_id, "experience deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_day_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(payload): Json<NewDay>,
) -> ApiResult<(StatusCode, Json<ItineraryDay>)> {
    let auth = require_auth(&state, &headers).await?;
    let day = EXPERIENCE_ITINERARY
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
    let photo = EXPERIENCE_ITINERARY
        .add_photo(&state.pool, auth.user_id, id, day_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(photo)))
}
