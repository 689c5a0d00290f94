//! Database models for events.

use crate::types::EventId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct EventCreateDBRequest {
    pub title: String,
    pub description: Option<String>,
    pub event_date: DateTime<Utc>,
    pub registration_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EventUpdateDBRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_date: Option<DateTime<Utc>>,
    /// `Some(None)` clears the link
    pub registration_url: Option<Option<String>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct EventDBResponse {
    pub id: EventId,
    pub title: String,
    pub description: Option<String>,
    pub event_date: DateTime<Utc>,
    pub registration_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
