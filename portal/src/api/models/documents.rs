//! API request/response models for the document library.

use crate::db::models::documents::DocumentDBResponse;
use crate::types::DocumentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListDocumentsQuery {
    /// Case-insensitive substring over title, description and category
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentCreate {
    pub title: String,
    pub description: Option<String>,
    #[schema(example = "https://files.example.com/rate-sheet.pdf")]
    pub file_url: String,
    pub file_type: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DocumentUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub file_url: Option<String>,
    pub file_type: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: DocumentId,
    pub title: String,
    pub description: Option<String>,
    pub file_url: String,
    pub file_type: Option<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DocumentDBResponse> for DocumentResponse {
    fn from(db: DocumentDBResponse) -> Self {
        Self {
            id: db.id,
            title: db.title,
            description: db.description,
            file_url: db.file_url,
            file_type: db.file_type,
            category: db.category,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
