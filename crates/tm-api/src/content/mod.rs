//! The four post kinds and the pieces they share: the `(kind, id)` content
//! key, owner resolution, interaction counters and the list selection used by
//! profile pages, feeds and search.

use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::{ApiError, ApiResult};

pub(crate) mod experiences;
pub(crate) mod general;
pub(crate) mod itinerary;
pub(crate) mod joinable;
pub(crate) mod trips;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ContentKind {
    Trip,
    Experience,
    Joinable,
    General,
}

impl ContentKind {
    pub const ALL: [ContentKind; 4] = [
        ContentKind::Trip,
        ContentKind::Experience,
        ContentKind::Joinable,
        ContentKind::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Trip => "trip",
            ContentKind::Experience => "experience",
            ContentKind::Joinable => "joinable",
            ContentKind::General => "general",
        }
    }

    /// Human wording used in notification text.
    pub fn noun(self) -> &'static str {
        match self {
            ContentKind::Trip => "trip post",
            ContentKind::Experience => "experience",
            ContentKind::Joinable => "joinable trip",
            ContentKind::General => "post",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown content type: {0}")]
pub struct UnknownContentKind(String);

impl FromStr for ContentKind {
    type Err = UnknownContentKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ContentKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| UnknownContentKind(value.to_string()))
    }
}

impl From<UnknownContentKind> for ApiError {
    fn from(err: UnknownContentKind) -> Self {
        ApiError::new(
            axum::http::StatusCode::BAD_REQUEST,
            "INVALID_CONTENT_TYPE",
            err.to_string(),
        )
    }
}

/// Addresses one piece of content of any kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ContentKey {
    pub kind: ContentKind,
    pub id: i64,
}

impl ContentKey {
    pub fn new(kind: ContentKind, id: i64) -> Self {
        Self { kind, id }
    }

    pub(crate) fn parse(kind: &str, id: i64) -> ApiResult<Self> {
        Ok(Self::new(kind.parse()?, id))
    }
}

/// An existing piece of content, reduced to what interactions need.
#[derive(Debug, Clone)]
pub(crate) struct ContentRef {
    pub key: ContentKey,
    pub owner_id: i64,
    pub title: String,
}

pub(crate) async fn resolve<'c, E>(executor: E, key: ContentKey) -> ApiResult<ContentRef>
where
    E: Executor<'c, Database = Sqlite>,
{
    let sql = match key.kind {
        ContentKind::Trip => "SELECT author_id, title FROM trip_posts WHERE id = ?",
        ContentKind::Experience => "SELECT author_id, title FROM experience_posts WHERE id = ?",
        ContentKind::Joinable => "SELECT creator_id, title FROM joinable_trips WHERE id = ?",
        ContentKind::General => {
            "SELECT author_id, substr(content, 1, 60) FROM general_posts WHERE id = ?"
        }
    };
    let (owner_id, title) = sqlx::query_as::<_, (i64, String)>(sql)
        .bind(key.id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("{} {} not found", key.kind, key.id)))?;
    Ok(ContentRef {
        key,
        owner_id,
        title,
    })
}

pub(crate) async fn require_owner<'c, E>(
    executor: E,
    key: ContentKey,
    actor_id: i64,
) -> ApiResult<ContentRef>
where
    E: Executor<'c, Database = Sqlite>,
{
    let content = resolve(executor, key).await?;
    if content.owner_id != actor_id {
        return Err(ApiError::forbidden(format!(
            "only the owner can modify this {}",
            key.kind.noun()
        )));
    }
    Ok(content)
}

/// Drops every like, save, comment and notification attached to `key`.
/// Runs inside the caller's transaction together with the content delete.
pub(crate) async fn detach_interactions(
    conn: &mut SqliteConnection,
    key: ContentKey,
) -> ApiResult<()> {
    for sql in [
        "DELETE FROM likes WHERE content_kind = ? AND content_id = ?",
        "DELETE FROM saves WHERE content_kind = ? AND content_id = ?",
        "DELETE FROM comments WHERE content_kind = ? AND content_id = ?",
        "DELETE FROM notifications WHERE content_kind = ? AND content_id = ?",
    ] {
        sqlx::query(sql)
            .bind(key.kind)
            .bind(key.id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, FromRow)]
pub struct InteractionStats {
    pub total_likes: i64,
    pub total_comments: i64,
    pub is_liked: bool,
    pub is_saved: bool,
}

/// Appends the [`InteractionStats`] columns for the content whose id is
/// `id_column`. Anonymous viewers get `false` flags.
pub(crate) fn push_stats_columns(
    qb: &mut QueryBuilder<'_, Sqlite>,
    kind: ContentKind,
    id_column: &'static str,
    viewer: Option<i64>,
) {
    qb.push(", (SELECT COUNT(*) FROM likes l WHERE l.content_kind = ")
        .push_bind(kind)
        .push(" AND l.content_id = ")
        .push(id_column)
        .push(") AS total_likes");
    qb.push(", (SELECT COUNT(*) FROM comments c WHERE c.content_kind = ")
        .push_bind(kind)
        .push(" AND c.content_id = ")
        .push(id_column)
        .push(") AS total_comments");
    match viewer {
        Some(viewer) => {
            qb.push(", EXISTS (SELECT 1 FROM likes l WHERE l.content_kind = ")
                .push_bind(kind)
                .push(" AND l.content_id = ")
                .push(id_column)
                .push(" AND l.user_id = ")
                .push_bind(viewer)
                .push(") AS is_liked");
            qb.push(", EXISTS (SELECT 1 FROM saves s WHERE s.content_kind = ")
                .push_bind(kind)
                .push(" AND s.content_id = ")
                .push(id_column)
                .push(" AND s.user_id = ")
                .push_bind(viewer)
                .push(") AS is_saved");
        }
        None => {
            qb.push(", 0 AS is_liked, 0 AS is_saved");
        }
    }
}

/// Column names a listing query filters on.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Columns {
    pub id: &'static str,
    pub owner: &'static str,
    pub text: &'static str,
    pub created_at: &'static str,
}

/// Which rows of a content table a listing returns.
#[derive(Debug, Clone)]
pub(crate) enum Selection {
    All,
    One(i64),
    Author(i64),
    /// Authors the given user follows with an accepted edge.
    FollowedBy(i64),
    /// A `LIKE` pattern over the kind's text column.
    Matching(String),
}

impl Selection {
    pub(crate) fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>, columns: Columns) {
        match self {
            Selection::All => {}
            Selection::One(id) => {
                qb.push(" WHERE ").push(columns.id).push(" = ").push_bind(*id);
            }
            Selection::Author(user_id) => {
                qb.push(" WHERE ")
                    .push(columns.owner)
                    .push(" = ")
                    .push_bind(*user_id);
            }
            Selection::FollowedBy(user_id) => {
                qb.push(" WHERE ")
                    .push(columns.owner)
                    .push(" IN (SELECT following_id FROM follows WHERE is_accepted = 1 AND follower_id = ")
                    .push_bind(*user_id)
                    .push(")");
            }
            Selection::Matching(pattern) => {
                qb.push(" WHERE ")
                    .push(columns.text)
                    .push(" LIKE ")
                    .push_bind(pattern.clone())
                    .push(" ESCAPE '\\'");
            }
        }
    }

    /// Newest first with id as the tie breaker, capped at `limit` rows.
    pub(crate) fn push_order(qb: &mut QueryBuilder<'_, Sqlite>, columns: Columns, limit: i64) {
        qb.push(" ORDER BY ")
            .push(columns.created_at)
            .push(" DESC, ")
            .push(columns.id)
            .push(" DESC LIMIT ")
            .push_bind(limit);
    }
}

/// Query string accepted by the per-kind list endpoints.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub author: Option<i64>,
    pub limit: Option<i64>,
}

/// Any post, serialized with its `post_type` tag.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ContentItem {
    Trip(trips::TripPost),
    Experience(experiences::ExperiencePost),
    Joinable(joinable::JoinableTrip),
    General(general::GeneralPost),
}

impl ContentItem {
    pub fn key(&self) -> ContentKey {
        match self {
            ContentItem::Trip(post) => ContentKey::new(ContentKind::Trip, post.id),
            ContentItem::Experience(post) => ContentKey::new(ContentKind::Experience, post.id),
            ContentItem::Joinable(trip) => ContentKey::new(ContentKind::Joinable, trip.id),
            ContentItem::General(post) => ContentKey::new(ContentKind::General, post.id),
        }
    }

    pub fn created_at(&self) -> i64 {
        match self {
            ContentItem::Trip(post) => post.created_at,
            ContentItem::Experience(post) => post.created_at,
            ContentItem::Joinable(trip) => trip.created_at,
            ContentItem::General(post) => post.created_at,
        }
    }
}

/// Loads one list-shaped item, or `None` when it no longer exists.
pub(crate) async fn load_item(
    pool: &SqlitePool,
    viewer: Option<i64>,
    key: ContentKey,
) -> ApiResult<Option<ContentItem>> {
    let selection = Selection::One(key.id);
    let item = match key.kind {
        ContentKind::Trip => trips::list(pool, viewer, &selection, 1)
            .await?
            .pop()
            .map(ContentItem::Trip),
        ContentKind::Experience => experiences::list(pool, viewer, &selection, 1)
            .await?
            .pop()
            .map(ContentItem::Experience),
        ContentKind::Joinable => joinable::list(pool, viewer, &selection, 1)
            .await?
            .pop()
            .map(ContentItem::Joinable),
        ContentKind::General => general::list(pool, viewer, &selection, 1)
            .await?
            .pop()
            .map(ContentItem::General),
    };
    Ok(item)
}

/// Lists every kind for `selection`, each source capped at `window` rows.
pub(crate) async fn list_all_kinds(
    pool: &SqlitePool,
    viewer: Option<i64>,
    selection: &Selection,
    window: i64,
) -> ApiResult<Vec<Vec<ContentItem>>> {
    let trips = trips::list(pool, viewer, selection, window).await?;
    let experiences = experiences::list(pool, viewer, selection, window).await?;
    let joinable = joinable::list(pool, viewer, selection, window).await?;
    let general = general::list(pool, viewer, selection, window).await?;
    Ok(vec![
        trips.into_iter().map(ContentItem::Trip).collect(),
        experiences.into_iter().map(ContentItem::Experience).collect(),
        joinable.into_iter().map(ContentItem::Joinable).collect(),
        general.into_iter().map(ContentItem::General).collect(),
    ])
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MediaImage {
    pub id: i64,
    #[serde(skip)]
    pub owner_id: i64,
    pub image: String,
}

/// Ordered images for each owner id in `owner_ids`.
pub(crate) async fn load_images(
    pool: &SqlitePool,
    table: &'static str,
    owner_column: &'static str,
    owner_ids: &[i64],
) -> ApiResult<HashMap<i64, Vec<MediaImage>>> {
    let mut images: HashMap<i64, Vec<MediaImage>> = HashMap::new();
    if owner_ids.is_empty() {
        return Ok(images);
    }

    let mut qb = QueryBuilder::<Sqlite>::new("SELECT id, ");
    qb.push(owner_column)
        .push(" AS owner_id, image FROM ")
        .push(table)
        .push(" WHERE ")
        .push(owner_column)
        .push(" IN (");
    let mut ids = qb.separated(", ");
    for owner_id in owner_ids {
        ids.push_bind(*owner_id);
    }
    qb.push(") ORDER BY position, id");

    let rows = qb
        .build_query_as::<MediaImage>()
        .fetch_all(pool)
        .await?;
    for row in rows {
        images.entry(row.owner_id).or_default().push(row);
    }
    Ok(images)
}

/// Replaces the image list of one owner, keeping the given order.
pub(crate) async fn replace_images(
    conn: &mut SqliteConnection,
    table: &'static str,
    owner_column: &'static str,
    owner_id: i64,
    images: &[String],
) -> ApiResult<()> {
    let mut delete = QueryBuilder::<Sqlite>::new("DELETE FROM ");
    delete
        .push(table)
        .push(" WHERE ")
        .push(owner_column)
        .push(" = ")
        .push_bind(owner_id);
    delete.build().execute(&mut *conn).await?;

    if images.is_empty() {
        return Ok(());
    }
    let mut insert = QueryBuilder::<Sqlite>::new("INSERT INTO ");
    insert
        .push(table)
        .push(" (")
        .push(owner_column)
        .push(", image, position) ");
    insert.push_values(images.iter().enumerate(), |mut row, (position, image)| {
        row.push_bind(owner_id)
            .push_bind(image.clone())
            .push_bind(position as i64);
    });
    insert.build().execute(&mut *conn).await?;
    Ok(())
}
