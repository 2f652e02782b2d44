use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::optional_auth;
use crate::content::{ContentItem, Selection};
use crate::feed;
use crate::users::{UserSummary, USER_COLUMNS};
use crate::validation::contains_pattern;
use crate::{ApiError, ApiResult, AppState};

const MAX_USER_HITS: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub users: Vec<UserSummary>,
    pub posts: Vec<ContentItem>,
}

/// Case-insensitive substring search over usernames, names and post text.
/// Open to anonymous callers; a bearer token only adds viewer flags.
pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<SearchResults>> {
    let viewer = optional_auth(&state, &headers).await?;
    let term = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .ok_or_else(|| ApiError::validation("query parameter q is required"))?;
    let pattern = contains_pattern(term);

    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users u \
         WHERE u.username LIKE ?1 ESCAPE '\\' OR u.full_name LIKE ?1 ESCAPE '\\' \
         ORDER BY u.username LIMIT ?2"
    );
    let users = sqlx::query_as::<_, UserSummary>(&sql)
        .bind(&pattern)
        .bind(MAX_USER_HITS)
        .fetch_all(&state.pool)
        .await?;

    let posts = feed::assemble(
        &state.pool,
        viewer.map(|viewer| viewer.user_id),
        &Selection::Matching(pattern),
        state.feed_window,
    )
    .await?;

    Ok(Json(SearchResults { users, posts }))
}
