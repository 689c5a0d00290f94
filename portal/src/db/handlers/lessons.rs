//! Database repository for lessons.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::courses::{LessonCreateDBRequest, LessonDBResponse, LessonUpdateDBRequest},
};
use crate::types::{CourseId, LessonId, ModuleId, abbrev_uuid};
use sqlx::{Connection, PgConnection, types::Json};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Lessons of one module, or of every module in a course
#[derive(Debug, Clone, Copy)]
pub enum LessonFilter {
    Module(ModuleId),
    Course(CourseId),
}

pub struct Lessons<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Lessons<'c> {
    type CreateRequest = LessonCreateDBRequest;
    type UpdateRequest = LessonUpdateDBRequest;
    type Response = LessonDBResponse;
    type Id = LessonId;
    type Filter = LessonFilter;

    #[instrument(skip(self, request), fields(module_id = %abbrev_uuid(&request.module_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let lesson = sqlx::query_as::<_, LessonDBResponse>(
            r#"
            INSERT INTO course_lessons (id, module_id, title, description, video_url, duration_seconds,
                                        resources, content, order_index)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8,
                    (SELECT COALESCE(MAX(order_index) + 1, 0) FROM course_lessons WHERE module_id = $2))
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.module_id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.video_url)
        .bind(request.duration_seconds)
        .bind(Json(&request.resources))
        .bind(&request.content)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(lesson)
    }

    #[instrument(skip(self), fields(lesson_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let lesson = sqlx::query_as::<_, LessonDBResponse>("SELECT * FROM course_lessons WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(lesson)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<LessonId>) -> Result<HashMap<Self::Id, LessonDBResponse>> {
        let lessons = sqlx::query_as::<_, LessonDBResponse>("SELECT * FROM course_lessons WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(lessons.into_iter().map(|l| (l.id, l)).collect())
    }

    #[instrument(skip(self), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let lessons = match *filter {
            LessonFilter::Module(module_id) => {
                sqlx::query_as::<_, LessonDBResponse>(
                    "SELECT * FROM course_lessons WHERE module_id = $1 ORDER BY order_index ASC, created_at ASC",
                )
                .bind(module_id)
                .fetch_all(&mut *self.db)
                .await?
            }
            LessonFilter::Course(course_id) => {
                sqlx::query_as::<_, LessonDBResponse>(
                    r#"
                    SELECT l.* FROM course_lessons l
                    JOIN course_modules m ON m.id = l.module_id
                    WHERE m.course_id = $1
                    ORDER BY m.order_index ASC, l.order_index ASC, l.created_at ASC
                    "#,
                )
                .bind(course_id)
                .fetch_all(&mut *self.db)
                .await?
            }
        };
        Ok(lessons)
    }

    #[instrument(skip(self), fields(lesson_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM course_lessons WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(lesson_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let lesson = sqlx::query_as::<_, LessonDBResponse>(
            r#"
            UPDATE course_lessons SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                video_url = COALESCE($4, video_url),
                duration_seconds = COALESCE($5, duration_seconds),
                resources = COALESCE($6, resources),
                content = COALESCE($7, content),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.video_url)
        .bind(request.duration_seconds)
        .bind(request.resources.as_ref().map(Json))
        .bind(&request.content)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(lesson)
    }
}

impl<'c> Lessons<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Replace only the rich-text body
    #[instrument(skip(self, content), fields(lesson_id = %abbrev_uuid(&id)), err)]
    pub async fn update_content(&mut self, id: LessonId, content: &str) -> Result<LessonDBResponse> {
        self.update(
            id,
            &LessonUpdateDBRequest {
                content: Some(content.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    /// Point the lesson at an uploaded file, dropping any external video link
    #[instrument(skip(self), fields(lesson_id = %abbrev_uuid(&id)), err)]
    pub async fn set_video_file(&mut self, id: LessonId, path: &str) -> Result<LessonDBResponse> {
        let lesson = sqlx::query_as::<_, LessonDBResponse>(
            r#"
            UPDATE course_lessons SET video_file_path = $2, video_url = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(path)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(lesson)
    }

    /// Remove both the external link and the uploaded file reference
    #[instrument(skip(self), fields(lesson_id = %abbrev_uuid(&id)), err)]
    pub async fn clear_video(&mut self, id: LessonId) -> Result<LessonDBResponse> {
        let lesson = sqlx::query_as::<_, LessonDBResponse>(
            r#"
            UPDATE course_lessons SET video_file_path = NULL, video_url = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(lesson)
    }

    /// Lesson ids of a module in display order
    #[instrument(skip(self), fields(module_id = %abbrev_uuid(&module_id)), err)]
    pub async fn ids_for_module(&mut self, module_id: ModuleId) -> Result<Vec<LessonId>> {
        let ids = sqlx::query_scalar::<_, LessonId>(
            "SELECT id FROM course_lessons WHERE module_id = $1 ORDER BY order_index ASC, created_at ASC",
        )
        .bind(module_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(ids)
    }

    /// Write `order_index` for sibling lessons in one transaction
    #[instrument(skip(self, positions), fields(count = positions.len()), err)]
    pub async fn reorder(&mut self, positions: &[(LessonId, i32)]) -> Result<()> {
        let mut tx = self.db.begin().await?;
        for (id, index) in positions {
            sqlx::query("UPDATE course_lessons SET order_index = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(index)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// The course a lesson belongs to
    #[instrument(skip(self), fields(lesson_id = %abbrev_uuid(&id)), err)]
    pub async fn course_of(&mut self, id: LessonId) -> Result<Option<CourseId>> {
        let course_id = sqlx::query_scalar::<_, CourseId>(
            r#"
            SELECT m.course_id FROM course_lessons l
            JOIN course_modules m ON m.id = l.module_id
            WHERE l.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(course_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        handlers::{Courses, Modules},
        models::courses::{CourseCreateDBRequest, ModuleCreateDBRequest},
    };
    use sqlx::PgPool;

    async fn create_module(pool: &PgPool) -> (CourseId, ModuleId) {
        let mut conn = pool.acquire().await.unwrap();
        let course = Courses::new(&mut conn)
            .create(&CourseCreateDBRequest {
                title: "Course".to_string(),
                description: None,
                thumbnail_url: None,
            })
            .await
            .unwrap();
        let module = Modules::new(&mut conn)
            .create(&ModuleCreateDBRequest {
                course_id: course.id,
                title: "Module".to_string(),
                description: None,
            })
            .await
            .unwrap();
        (course.id, module.id)
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_blank_lesson_defaults(pool: PgPool) {
        let (course_id, module_id) = create_module(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Lessons::new(&mut conn);

        let first = repo.create(&LessonCreateDBRequest::blank(module_id)).await.unwrap();
        let second = repo.create(&LessonCreateDBRequest::blank(module_id)).await.unwrap();

        assert_eq!(first.title, "New Lesson");
        assert_eq!(first.description.as_deref(), Some(""));
        assert_eq!(first.content, "");
        assert_eq!(first.duration_seconds, Some(0));
        assert!(first.resources.0.is_empty());
        assert_eq!(first.order_index, 0);
        assert_eq!(second.order_index, 1);

        assert_eq!(repo.course_of(first.id).await.unwrap(), Some(course_id));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_video_file_replaces_link(pool: PgPool) {
        let (_, module_id) = create_module(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Lessons::new(&mut conn);

        let lesson = repo
            .create(&LessonCreateDBRequest {
                video_url: Some("https://youtu.be/abc".to_string()),
                ..LessonCreateDBRequest::blank(module_id)
            })
            .await
            .unwrap();

        let with_file = repo.set_video_file(lesson.id, "m/1-x.mp4").await.unwrap();
        assert_eq!(with_file.video_file_path.as_deref(), Some("m/1-x.mp4"));
        assert!(with_file.video_url.is_none());

        let cleared = repo.clear_video(lesson.id).await.unwrap();
        assert!(cleared.video_file_path.is_none());
        assert!(cleared.video_url.is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_partial_updates(pool: PgPool) {
        let (course_id, module_id) = create_module(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Lessons::new(&mut conn);

        let lesson = repo.create(&LessonCreateDBRequest::blank(module_id)).await.unwrap();

        let updated = repo
            .update(
                lesson.id,
                &LessonUpdateDBRequest {
                    title: Some("Prospecting".to_string()),
                    resources: Some(vec![serde_json::json!({"name": "Script", "url": "https://example.com/s.pdf"})]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Prospecting");
        assert_eq!(updated.resources.0.len(), 1);

        let with_content = repo.update_content(lesson.id, "<p>Hello</p>").await.unwrap();
        assert_eq!(with_content.content, "<p>Hello</p>");
        assert_eq!(with_content.title, "Prospecting");

        let all = repo.list(&LessonFilter::Course(course_id)).await.unwrap();
        assert_eq!(all.len(), 1);
    }
}
