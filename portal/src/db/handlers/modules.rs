//! Database repository for course modules.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::courses::{ModuleCreateDBRequest, ModuleDBResponse, ModuleUpdateDBRequest},
};
use crate::types::{CourseId, ModuleId, abbrev_uuid};
use sqlx::{Connection, PgConnection};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Modules of one course
#[derive(Debug, Clone)]
pub struct ModuleFilter {
    pub course_id: CourseId,
}

pub struct Modules<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Modules<'c> {
    type CreateRequest = ModuleCreateDBRequest;
    type UpdateRequest = ModuleUpdateDBRequest;
    type Response = ModuleDBResponse;
    type Id = ModuleId;
    type Filter = ModuleFilter;

    #[instrument(skip(self, request), fields(course_id = %abbrev_uuid(&request.course_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let module = sqlx::query_as::<_, ModuleDBResponse>(
            r#"
            INSERT INTO course_modules (id, course_id, title, description, order_index)
            VALUES ($1, $2, $3, $4,
                    (SELECT COALESCE(MAX(order_index) + 1, 0) FROM course_modules WHERE course_id = $2))
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.course_id)
        .bind(&request.title)
        .bind(&request.description)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(module)
    }

    #[instrument(skip(self), fields(module_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let module = sqlx::query_as::<_, ModuleDBResponse>("SELECT * FROM course_modules WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(module)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<ModuleId>) -> Result<HashMap<Self::Id, ModuleDBResponse>> {
        let modules = sqlx::query_as::<_, ModuleDBResponse>("SELECT * FROM course_modules WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(modules.into_iter().map(|m| (m.id, m)).collect())
    }

    #[instrument(skip(self, filter), fields(course_id = %abbrev_uuid(&filter.course_id)), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let modules = sqlx::query_as::<_, ModuleDBResponse>(
            "SELECT * FROM course_modules WHERE course_id = $1 ORDER BY order_index ASC, created_at ASC",
        )
        .bind(filter.course_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(modules)
    }

    #[instrument(skip(self), fields(module_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM course_modules WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(module_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let module = sqlx::query_as::<_, ModuleDBResponse>(
            r#"
            UPDATE course_modules SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.title)
        .bind(&request.description)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(module)
    }
}

impl<'c> Modules<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Module ids of a course in display order
    #[instrument(skip(self), fields(course_id = %abbrev_uuid(&course_id)), err)]
    pub async fn ids_for_course(&mut self, course_id: CourseId) -> Result<Vec<ModuleId>> {
        let ids = sqlx::query_scalar::<_, ModuleId>(
            "SELECT id FROM course_modules WHERE course_id = $1 ORDER BY order_index ASC, created_at ASC",
        )
        .bind(course_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(ids)
    }

    /// Write `order_index` for sibling modules in one transaction
    #[instrument(skip(self, positions), fields(count = positions.len()), err)]
    pub async fn reorder(&mut self, positions: &[(ModuleId, i32)]) -> Result<()> {
        let mut tx = self.db.begin().await?;
        for (id, index) in positions {
            sqlx::query("UPDATE course_modules SET order_index = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(index)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
