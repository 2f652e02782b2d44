use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool};

use crate::auth::{is_unique_violation, require_auth, validate_email};
use crate::content::{self, ContentItem, Selection};
use crate::feed;
use crate::follows::{self, FollowStatus};
use crate::validation::{page_size, FieldErrors};
use crate::{ApiError, ApiResult, AppState};

/// Select list for [`UserSummary`] over a `users u` alias.
pub(crate) const USER_COLUMNS: &str =
    "u.id AS u_id, u.username AS u_username, u.full_name AS u_full_name, u.avatar AS u_avatar";

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct UserSummary {
    #[sqlx(rename = "u_id")]
    pub id: i64,
    #[sqlx(rename = "u_username")]
    pub username: String,
    #[sqlx(rename = "u_full_name")]
    pub full_name: String,
    #[sqlx(rename = "u_avatar")]
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct Profile {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub user: UserSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub cover_image: Option<String>,
    pub bio: String,
    pub created_at: i64,
    pub posts_count: i64,
    pub followers_count: i64,
    pub following_count: i64,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_status: Option<FollowStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    /// Empty string clears the image.
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct Counts {
    pub notifications: i64,
    pub messages: i64,
}

#[derive(Deserialize)]
pub struct PostsQuery {
    pub limit: Option<i64>,
}

pub async fn get_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Profile>> {
    let auth = require_auth(&state, &headers).await?;
    let profile = load_profile(&state.pool, ProfileLookup::Id(auth.user_id)).await?;
    Ok(Json(profile))
}

pub async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(patch): Json<ProfilePatch>,
) -> ApiResult<Json<Profile>> {
    let auth = require_auth(&state, &headers).await?;

    let mut errors = FieldErrors::new();
    let full_name = patch
        .full_name
        .as_deref()
        .map(|value| errors.optional_text("full_name", value, 120));
    let bio = patch
        .bio
        .as_deref()
        .map(|value| errors.optional_text("bio", value, 500));
    let avatar = patch
        .avatar
        .as_deref()
        .map(|value| errors.media_ref("avatar", Some(value)));
    let cover_image = patch
        .cover_image
        .as_deref()
        .map(|value| errors.media_ref("cover_image", Some(value)));
    let email = patch.email.as_deref().map(|value| {
        let value = value.trim();
        validate_email(&mut errors, value);
        value.to_string()
    });
    errors.into_result()?;

    if let Some(email) = &email {
        let taken: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE email = ? COLLATE NOCASE AND id <> ?",
        )
        .bind(email)
        .bind(auth.user_id)
        .fetch_one(&state.pool)
        .await?;
        if taken > 0 {
            return Err(email_taken());
        }
    }

    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE users SET ");
    let mut changed = false;
    {
        let mut set = qb.separated(", ");
        if let Some(full_name) = full_name {
            set.push("full_name = ").push_bind_unseparated(full_name);
            changed = true;
        }
        if let Some(bio) = bio {
            set.push("bio = ").push_bind_unseparated(bio);
            changed = true;
        }
        if let Some(avatar) = avatar {
            set.push("avatar = ").push_bind_unseparated(avatar);
            changed = true;
        }
        if let Some(cover_image) = cover_image {
            set.push("cover_image = ").push_bind_unseparated(cover_image);
            changed = true;
        }
        if let Some(email) = email {
            set.push("email = ").push_bind_unseparated(email);
            changed = true;
        }
    }
    if changed {
        qb.push(" WHERE id = ").push_bind(auth.user_id);
        match qb.build().execute(&state.pool).await {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => return Err(email_taken()),
            Err(err) => return Err(err.into()),
        }
        tracing::info!(user_id = auth.user_id, "profile updated");
    }

    let profile = load_profile(&state.pool, ProfileLookup::Id(auth.user_id)).await?;
    Ok(Json(profile))
}

fn email_taken() -> ApiError {
    let mut errors = FieldErrors::new();
    errors.add("email", "is already registered");
    errors.into_error()
}

pub async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> ApiResult<Json<Profile>> {
    let auth = require_auth(&state, &headers).await?;
    let mut profile = load_profile(&state.pool, ProfileLookup::Username(&username)).await?;
    if profile.user.id != auth.user_id {
        profile.email = None;
        profile.follow_status =
            Some(follows::follow_status(&state.pool, auth.user_id, profile.user.id).await?);
    }
    Ok(Json(profile))
}

pub async fn user_posts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
    Query(query): Query<PostsQuery>,
) -> ApiResult<Json<Vec<ContentItem>>> {
    let auth = require_auth(&state, &headers).await?;
    let user_id = find_id_by_username(&state.pool, &username).await?;
    let sources = content::list_all_kinds(
        &state.pool,
        Some(auth.user_id),
        &Selection::Author(user_id),
        page_size(query.limit),
    )
    .await?;
    Ok(Json(feed::merge(sources)))
}

pub async fn counts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Counts>> {
    let auth = require_auth(&state, &headers).await?;
    let (notifications, messages) = sqlx::query_as::<_, (i64, i64)>(
        "SELECT \
           (SELECT COUNT(*) FROM notifications WHERE receiver_id = ?1 AND is_read = 0), \
           (SELECT COUNT(*) FROM direct_messages WHERE receiver_id = ?1 AND is_read = 0)",
    )
    .bind(auth.user_id)
    .fetch_one(&state.pool)
    .await?;
    Ok(Json(Counts {
        notifications,
        messages,
    }))
}

enum ProfileLookup<'a> {
    Id(i64),
    Username(&'a str),
}

async fn load_profile(pool: &SqlitePool, lookup: ProfileLookup<'_>) -> ApiResult<Profile> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT ");
    qb.push(USER_COLUMNS).push(
        ", u.email, u.cover_image, u.bio, u.created_at, \
         ((SELECT COUNT(*) FROM trip_posts WHERE author_id = u.id) \
          + (SELECT COUNT(*) FROM experience_posts WHERE author_id = u.id) \
          + (SELECT COUNT(*) FROM joinable_trips WHERE creator_id = u.id) \
          + (SELECT COUNT(*) FROM general_posts WHERE author_id = u.id)) AS posts_count, \
         (SELECT COUNT(*) FROM follows WHERE following_id = u.id AND is_accepted = 1) AS followers_count, \
         (SELECT COUNT(*) FROM follows WHERE follower_id = u.id AND is_accepted = 1) AS following_count \
         FROM users u WHERE ",
    );
    match lookup {
        ProfileLookup::Id(id) => {
            qb.push("u.id = ").push_bind(id);
        }
        ProfileLookup::Username(username) => {
            qb.push("u.username = ").push_bind(username.to_string());
        }
    }

    qb.build_query_as::<Profile>()
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))
}

pub(crate) async fn summary<'c, E>(executor: E, user_id: i64) -> ApiResult<UserSummary>
where
    E: Executor<'c, Database = Sqlite>,
{
    let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?");
    sqlx::query_as::<_, UserSummary>(&sql)
        .bind(user_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))
}

pub(crate) async fn find_username(pool: &SqlitePool, user_id: i64) -> ApiResult<Option<String>> {
    let username = sqlx::query_scalar::<_, String>("SELECT username FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(username)
}

pub(crate) async fn find_id_by_username(pool: &SqlitePool, username: &str) -> ApiResult<i64> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))
}
