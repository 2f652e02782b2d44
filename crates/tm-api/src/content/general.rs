use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
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
    id: "g.id",
    owner: "g.author_id",
    text: "g.content",
    created_at: "g.created_at",
};
const IMAGES_TABLE: &str = "general_post_images";
const IMAGES_OWNER: &str = "post_id";
const MAX_IMAGES: usize = 10;
const MAX_CONTENT_CHARS: usize = 5000;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GeneralPost {
    pub post_type: ContentKind,
    pub id: i64,
    #[sqlx(flatten)]
    pub author: UserSummary,
    pub content: String,
    pub location: String,
    pub created_at: i64,
    #[sqlx(skip)]
    pub images: Vec<MediaImage>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub stats: InteractionStats,
}

#[derive(Debug, Deserialize)]
pub struct NewGeneralPost {
    pub content: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GeneralPostPatch {
    pub content: Option<String>,
    pub location: Option<String>,
    pub images: Option<Vec<String>>,
}

pub(crate) async fn list(
    pool: &SqlitePool,
    viewer: Option<i64>,
    selection: &Selection,
    limit: i64,
) -> ApiResult<Vec<GeneralPost>> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT 'general' AS post_type, g.id, ");
    qb.push(USER_COLUMNS)
        .push(", g.content, g.location, g.created_at");
    push_stats_columns(&mut qb, ContentKind::General, COLUMNS.id, viewer);
    qb.push(" FROM general_posts g JOIN users u ON u.id = g.author_id");
    selection.push_where(&mut qb, COLUMNS);
    Selection::push_order(&mut qb, COLUMNS, limit);

    let mut posts = qb.build_query_as::<GeneralPost>().fetch_all(pool).await?;
    let ids: Vec<i64> = posts.iter().map(|post| post.id).collect();
    let mut images = load_images(pool, IMAGES_TABLE, IMAGES_OWNER, &ids).await?;
    for post in &mut posts {
        post.images = images.remove(&post.id).unwrap_or_default();
    }
    Ok(posts)
}

async fn detail(pool: &SqlitePool, viewer: Option<i64>, id: i64) -> ApiResult<GeneralPost> {
    list(pool, viewer, &Selection::One(id), 1)
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found(format!("post {id} not found")))
}

pub async fn list_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<GeneralPost>>> {
    let auth = require_auth(&state, &headers).await?;
    let selection = query.author.map_or(Selection::All, Selection::Author);
    let posts = list(&state.pool, Some(auth.user_id), &selection, page_size(query.limit)).await?;
    Ok(Json(posts))
}

pub async fn create_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewGeneralPost>,
) -> ApiResult<(StatusCode, Json<GeneralPost>)> {
    let auth = require_auth(&state, &headers).await?;

    let mut errors = FieldErrors::new();
    let content = errors.required_text("content", &payload.content, MAX_CONTENT_CHARS);
    let location = errors.optional_text("location", &payload.location, 300);
    let images = errors.media_refs("images", &payload.images);
    if images.len() > MAX_IMAGES {
        errors.add("images", format!("at most {MAX_IMAGES} images"));
    }
    errors.into_result()?;

    let mut tx = db::begin_write(&state.pool).await?;
    let id = sqlx::query(
        "INSERT INTO general_posts (author_id, content, location, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(auth.user_id)
    .bind(&content)
    .bind(&location)
    .bind(now_millis())
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();
    replace_images(&mut tx, IMAGES_TABLE, IMAGES_OWNER, id, &images).await?;
    tx.commit().await?;

    tracing::info!(post_id = id, author_id = auth.user_id, "general post created");
    let created = detail(&state.pool, Some(auth.user_id), id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<GeneralPost>> {
    let auth = require_auth(&state, &headers).await?;
    Ok(Json(detail(&state.pool, Some(auth.user_id), id).await?))
}

pub async fn update_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(patch): Json<GeneralPostPatch>,
) -> ApiResult<Json<GeneralPost>> {
    let auth = require_auth(&state, &headers).await?;
    require_owner(
        &state.pool,
        ContentKey::new(ContentKind::General, id),
        auth.user_id,
    )
    .await?;

    let mut errors = FieldErrors::new();
    let content = patch
        .content
        .as_deref()
        .map(|value| errors.required_text("content", value, MAX_CONTENT_CHARS));
    let location = patch
        .location
        .as_deref()
        .map(|value| errors.optional_text("location", value, 300));
    let images = patch
        .images
        .as_deref()
        .map(|values| errors.media_refs("images", values));
    if images.as_ref().is_some_and(|images| images.len() > MAX_IMAGES) {
        errors.add("images", format!("at most {MAX_IMAGES} images"));
    }
    errors.into_result()?;

    let mut tx = db::begin_write(&state.pool).await?;
    if content.is_some() || location.is_some() {
        sqlx::query(
            "UPDATE general_posts SET content = COALESCE(?1, content), \
             location = COALESCE(?2, location) WHERE id = ?3",
        )
        .bind(content)
        .bind(location)
        .bind(id)
        .execute(&mut *tx)
        .await?;
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
    let key = ContentKey::new(ContentKind::General, id);

    let mut tx = db::begin_write(&state.pool).await?;
    require_owner(&mut *tx, key, auth.user_id).await?;
    sqlx::query("DELETE FROM general_posts WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    detach_interactions(&mut tx, key).await?;
    tx.commit().await?;

    tracing::info!(post_id = id, author_id = auth.user_id, "general post deleted");
    Ok(StatusCode::NO_CONTENT)
}
