//! API request/response models for the events calendar.

use crate::db::models::events::EventDBResponse;
use crate::types::EventId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Events starting within this many days are flagged as upcoming
pub const UPCOMING_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventCreate {
    #[schema(example = "Quarterly kickoff")]
    pub title: String,
    pub description: Option<String>,
    pub event_date: DateTime<Utc>,
    pub registration_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_date: Option<DateTime<Utc>>,
    /// An empty string removes the registration link
    pub registration_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: EventId,
    pub title: String,
    pub description: Option<String>,
    pub event_date: DateTime<Utc>,
    pub registration_url: Option<String>,
    /// True when the event starts within the next 7 days
    pub is_upcoming: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Whether `event_date` falls between now and [`UPCOMING_DAYS`] from now
pub fn is_upcoming(event_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    event_date >= now && event_date <= now + Duration::days(UPCOMING_DAYS)
}

impl EventResponse {
    pub fn from_db(db: EventDBResponse, now: DateTime<Utc>) -> Self {
        Self {
            id: db.id,
            title: db.title,
            description: db.description,
            is_upcoming: is_upcoming(db.event_date, now),
            event_date: db.event_date,
            registration_url: db.registration_url,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
