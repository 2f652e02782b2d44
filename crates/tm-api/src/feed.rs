//! Feeds merge a bounded window from each content kind. Each kind contributes
//! at most `window` of its newest rows; the union is then ordered newest
//! first. An item can be missing from a feed when its own kind has `window`
//! newer rows, even if other kinds are older.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use sqlx::SqlitePool;

use crate::auth::require_auth;
use crate::content::{self, ContentItem, Selection};
use crate::{ApiResult, AppState};

/// Flattens per-kind windows into one list ordered by `created_at` desc,
/// ties broken by id desc.
pub(crate) fn merge(sources: Vec<Vec<ContentItem>>) -> Vec<ContentItem> {
    let mut items: Vec<ContentItem> = sources.into_iter().flatten().collect();
    items.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| b.key().id.cmp(&a.key().id))
    });
    items
}

pub(crate) async fn assemble(
    pool: &SqlitePool,
    viewer: Option<i64>,
    selection: &Selection,
    window: i64,
) -> ApiResult<Vec<ContentItem>> {
    let sources = content::list_all_kinds(pool, viewer, selection, window).await?;
    Ok(merge(sources))
}

pub async fn for_you(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<ContentItem>>> {
    let auth = require_auth(&state, &headers).await?;
    let items = assemble(
        &state.pool,
        Some(auth.user_id),
        &Selection::All,
        state.feed_window,
    )
    .await?;
    Ok(Json(items))
}

/// Content from authors the caller follows with an accepted edge.
pub async fn following(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<ContentItem>>> {
    let auth = require_auth(&state, &headers).await?;
    let items = assemble(
        &state.pool,
        Some(auth.user_id),
        &Selection::FollowedBy(auth.user_id),
        state.feed_window,
    )
    .await?;
    Ok(Json(items))
}
