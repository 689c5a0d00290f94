//! Database models for the document library.

use crate::types::DocumentId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct DocumentCreateDBRequest {
    pub title: String,
    pub description: Option<String>,
    pub file_url: String,
    pub file_type: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentUpdateDBRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub file_url: Option<String>,
    pub file_type: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DocumentDBResponse {
    pub id: DocumentId,
    pub title: String,
    pub description: Option<String>,
    pub file_url: String,
    pub file_type: Option<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
