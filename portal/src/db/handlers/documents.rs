//! Database repository for the document library.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::documents::{DocumentCreateDBRequest, DocumentDBResponse, DocumentUpdateDBRequest},
};
use crate::types::{DocumentId, abbrev_uuid};
use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    /// Case-insensitive substring over title, description and category
    pub search: Option<String>,
}

pub struct Documents<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Documents<'c> {
    type CreateRequest = DocumentCreateDBRequest;
    type UpdateRequest = DocumentUpdateDBRequest;
    type Response = DocumentDBResponse;
    type Id = DocumentId;
    type Filter = DocumentFilter;

    #[instrument(skip(self, request), fields(title = %request.title), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let document = sqlx::query_as::<_, DocumentDBResponse>(
            r#"
            INSERT INTO documents (id, title, description, file_url, file_type, category)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.file_url)
        .bind(&request.file_type)
        .bind(&request.category)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(document)
    }

    #[instrument(skip(self), fields(document_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let document = sqlx::query_as::<_, DocumentDBResponse>("SELECT * FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(document)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<DocumentId>) -> Result<HashMap<Self::Id, DocumentDBResponse>> {
        let documents = sqlx::query_as::<_, DocumentDBResponse>("SELECT * FROM documents WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(documents.into_iter().map(|d| (d.id, d)).collect())
    }

    #[instrument(skip(self, filter), fields(search = ?filter.search), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)));

        let documents = sqlx::query_as::<_, DocumentDBResponse>(
            r#"
            SELECT * FROM documents
            WHERE $1::text IS NULL
               OR title ILIKE $1
               OR description ILIKE $1
               OR category ILIKE $1
            ORDER BY created_at DESC, id
            "#,
        )
        .bind(pattern)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(documents)
    }

    #[instrument(skip(self), fields(document_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(document_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let document = sqlx::query_as::<_, DocumentDBResponse>(
            r#"
            UPDATE documents SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                file_url = COALESCE($4, file_url),
                file_type = COALESCE($5, file_type),
                category = COALESCE($6, category),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.file_url)
        .bind(&request.file_type)
        .bind(&request.category)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(document)
    }
}

/// Escape LIKE wildcards so user input matches literally
fn escape_like(input: &str) -> String {
    input.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

impl<'c> Documents<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM documents")
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }
}
