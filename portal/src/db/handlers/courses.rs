//! Database repository for courses.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::courses::{CourseCreateDBRequest, CourseDBResponse, CourseUpdateDBRequest},
};
use crate::types::{CourseId, abbrev_uuid};
use sqlx::{Connection, PgConnection};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Order in which to list courses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CourseOrder {
    /// Catalogue order, `order_index` ascending
    #[default]
    Position,
    /// Admin table order, `created_at` descending
    Newest,
}

#[derive(Debug, Clone, Default)]
pub struct CourseFilter {
    pub order: CourseOrder,
}

pub struct Courses<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Courses<'c> {
    type CreateRequest = CourseCreateDBRequest;
    type UpdateRequest = CourseUpdateDBRequest;
    type Response = CourseDBResponse;
    type Id = CourseId;
    type Filter = CourseFilter;

    #[instrument(skip(self, request), fields(title = %request.title), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let course = sqlx::query_as::<_, CourseDBResponse>(
            r#"
            INSERT INTO courses (id, title, description, thumbnail_url, order_index)
            VALUES ($1, $2, $3, $4, (SELECT COALESCE(MAX(order_index) + 1, 0) FROM courses))
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.thumbnail_url)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(course)
    }

    #[instrument(skip(self), fields(course_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let course = sqlx::query_as::<_, CourseDBResponse>("SELECT * FROM courses WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(course)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<CourseId>) -> Result<HashMap<Self::Id, CourseDBResponse>> {
        let courses = sqlx::query_as::<_, CourseDBResponse>("SELECT * FROM courses WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(courses.into_iter().map(|c| (c.id, c)).collect())
    }

    #[instrument(skip(self, filter), fields(order = ?filter.order), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let query = match filter.order {
            CourseOrder::Position => "SELECT * FROM courses ORDER BY order_index ASC, created_at ASC",
            CourseOrder::Newest => "SELECT * FROM courses ORDER BY created_at DESC, id",
        };
        let courses = sqlx::query_as::<_, CourseDBResponse>(query).fetch_all(&mut *self.db).await?;
        Ok(courses)
    }

    #[instrument(skip(self), fields(course_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(course_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let course = sqlx::query_as::<_, CourseDBResponse>(
            r#"
            UPDATE courses SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                thumbnail_url = COALESCE($4, thumbnail_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.thumbnail_url)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(course)
    }
}

impl<'c> Courses<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Course ids in catalogue order
    #[instrument(skip(self), err)]
    pub async fn ids_in_order(&mut self) -> Result<Vec<CourseId>> {
        let ids = sqlx::query_scalar::<_, CourseId>("SELECT id FROM courses ORDER BY order_index ASC, created_at ASC")
            .fetch_all(&mut *self.db)
            .await?;
        Ok(ids)
    }

    /// Write `order_index` for every course in one transaction.
    ///
    /// The uniqueness constraint is deferred, so intermediate duplicates are fine.
    #[instrument(skip(self, positions), fields(count = positions.len()), err)]
    pub async fn reorder(&mut self, positions: &[(CourseId, i32)]) -> Result<()> {
        let mut tx = self.db.begin().await?;
        for (id, index) in positions {
            sqlx::query("UPDATE courses SET order_index = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(index)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses")
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }
}
