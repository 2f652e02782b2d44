//! Day-by-day itineraries shared by trip posts and experiences.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use super::{require_owner, ContentKey, ContentKind};
use crate::auth::is_unique_violation;
use crate::validation::FieldErrors;
use crate::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy)]
pub(crate) struct Itinerary {
    kind: ContentKind,
    days_table: &'static str,
    photos_table: &'static str,
}

pub(crate) const TRIP_ITINERARY: Itinerary = Itinerary {
    kind: ContentKind::Trip,
    days_table: "trip_days",
    photos_table: "trip_day_photos",
};

pub(crate) const EXPERIENCE_ITINERARY: Itinerary = Itinerary {
    kind: ContentKind::Experience,
    days_table: "experience_days",
    photos_table: "experience_day_photos",
};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ItineraryDay {
    pub id: i64,
    pub day_number: i64,
    pub date: Option<NaiveDate>,
    pub location_name: String,
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[sqlx(skip)]
    pub photos: Vec<DayPhoto>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DayPhoto {
    pub id: i64,
    #[serde(skip)]
    pub day_id: i64,
    pub image: String,
    pub caption: String,
}

#[derive(Debug, Deserialize)]
pub struct NewDay {
    pub day_number: i64,
    pub date: Option<NaiveDate>,
    pub location_name: String,
    #[serde(default)]
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct NewPhoto {
    pub image: String,
    #[serde(default)]
    pub caption: String,
}

impl Itinerary {
    /// Days in order, each carrying its photos.
    pub(crate) async fn days(&self, pool: &SqlitePool, post_id: i64) -> ApiResult<Vec<ItineraryDay>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, day_number, date, location_name, description, latitude, longitude FROM ",
        );
        qb.push(self.days_table)
            .push(" WHERE post_id = ")
            .push_bind(post_id)
            .push(" ORDER BY day_number");
        let mut days = qb.build_query_as::<ItineraryDay>().fetch_all(pool).await?;
        if days.is_empty() {
            return Ok(days);
        }

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT p.id, p.day_id, p.image, p.caption FROM ");
        qb.push(self.photos_table)
            .push(" p JOIN ")
            .push(self.days_table)
            .push(" d ON d.id = p.day_id WHERE d.post_id = ")
            .push_bind(post_id)
            .push(" ORDER BY p.id");
        let photos = qb.build_query_as::<DayPhoto>().fetch_all(pool).await?;
        for photo in photos {
            if let Some(day) = days.iter_mut().find(|day| day.id == photo.day_id) {
                day.photos.push(photo);
            }
        }
        Ok(days)
    }

    pub(crate) async fn add_day(
        &self,
        pool: &SqlitePool,
        actor_id: i64,
        post_id: i64,
        day: NewDay,
    ) -> ApiResult<ItineraryDay> {
        require_owner(pool, ContentKey::new(self.kind, post_id), actor_id).await?;

        let mut errors = FieldErrors::new();
        if day.day_number < 1 {
            errors.add("day_number", "must be at least 1");
        }
        let location_name = errors.required_text("location_name", &day.location_name, 200);
        let description = errors.optional_text("description", &day.description, 5000);
        if day.latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
            errors.add("latitude", "must be between -90 and 90");
        }
        if day.longitude.is_some_and(|lng| !(-180.0..=180.0).contains(&lng)) {
            errors.add("longitude", "must be between -180 and 180");
        }
        errors.into_result()?;

        let mut qb = QueryBuilder::<Sqlite>::new("INSERT INTO ");
        qb.push(self.days_table).push(
            " (post_id, day_number, date, location_name, description, latitude, longitude) VALUES (",
        );
        let mut values = qb.separated(", ");
        values.push_bind(post_id);
        values.push_bind(day.day_number);
        values.push_bind(day.date);
        values.push_bind(location_name.clone());
        values.push_bind(description.clone());
        values.push_bind(day.latitude);
        values.push_bind(day.longitude);
        values.push_unseparated(")");
        let id = match qb.build().execute(pool).await {
            Ok(result) => result.last_insert_rowid(),
            Err(err) if is_unique_violation(&err) => {
                return Err(ApiError::conflict(
                    "CONFLICT",
                    format!("day {} already exists", day.day_number),
                ));
            }
            Err(err) => return Err(err.into()),
        };

        Ok(ItineraryDay {
            id,
            day_number: day.day_number,
            date: day.date,
            location_name,
            description,
            latitude: day.latitude,
            longitude: day.longitude,
            photos: Vec::new(),
        })
    }

    pub(crate) async fn add_photo(
        &self,
        pool: &SqlitePool,
        actor_id: i64,
        post_id: i64,
        day_id: i64,
        photo: NewPhoto,
    ) -> ApiResult<DayPhoto> {
        require_owner(pool, ContentKey::new(self.kind, post_id), actor_id).await?;

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM ");
        qb.push(self.days_table)
            .push(" WHERE id = ")
            .push_bind(day_id)
            .push(" AND post_id = ")
            .push_bind(post_id);
        let found: i64 = qb.build_query_scalar().fetch_one(pool).await?;
        if found == 0 {
            return Err(ApiError::not_found(format!("day {day_id} not found")));
        }

        let mut errors = FieldErrors::new();
        let image = errors.media_ref("image", Some(&photo.image));
        if image.is_none() {
            errors.add("image", "must not be blank");
        }
        let caption = errors.optional_text("caption", &photo.caption, 500);
        errors.into_result()?;
        let image = image.unwrap_or_default();

        let mut qb = QueryBuilder::<Sqlite>::new("INSERT INTO ");
        qb.push(self.photos_table)
            .push(" (day_id, image, caption) VALUES (")
            .push_bind(day_id)
            .push(", ")
            .push_bind(image.clone())
            .push(", ")
            .push_bind(caption.clone())
            .push(")");
        let id = qb.build().execute(pool).await?.last_insert_rowid();

        Ok(DayPhoto {
            id,
            day_id,
            image,
            caption,
        })
    }
}
