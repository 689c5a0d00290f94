//! Database repository for lesson completion and course enrollments.

use crate::db::{
    errors::{DbError, Result},
    models::courses::{EnrollmentDBResponse, TeamEnrollmentRow},
};
use crate::progress;
use crate::types::{CourseId, LessonId, UserId, abbrev_uuid};
use sqlx::{Connection, PgConnection};
use tracing::instrument;

/// Outcome of toggling a lesson
#[derive(Debug, Clone)]
pub struct ToggleOutcome {
    pub course_id: CourseId,
    /// Completion state after the toggle
    pub completed: bool,
    pub progress: i32,
    /// The refreshed enrollment, when the user is enrolled
    pub enrollment: Option<EnrollmentDBResponse>,
}

pub struct Progress<'c> {
    db: &'c mut PgConnection,
}

/// Completed and total lesson counts for one user in one course
async fn course_percent(db: &mut PgConnection, user_id: UserId, course_id: CourseId) -> Result<i32> {
    let (completed, total) = sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT
            COUNT(p.lesson_id) FILTER (WHERE p.completed) AS completed,
            COUNT(l.id) AS total
        FROM course_lessons l
        JOIN course_modules m ON m.id = l.module_id
        LEFT JOIN lesson_progress p ON p.lesson_id = l.id AND p.user_id = $1
        WHERE m.course_id = $2
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(&mut *db)
    .await?;

    Ok(progress::percent(completed, total))
}

/// Recompute an existing enrollment from lesson progress. Returns None when not enrolled.
async fn refresh_enrollment(db: &mut PgConnection, user_id: UserId, course_id: CourseId) -> Result<Option<EnrollmentDBResponse>> {
    let percent = course_percent(db, user_id, course_id).await?;
    let enrollment = sqlx::query_as::<_, EnrollmentDBResponse>(
        r#"
        UPDATE course_enrollments SET
            progress = $3,
            completed = $4,
            completed_at = CASE WHEN $4 THEN COALESCE(completed_at, NOW()) ELSE NULL END
        WHERE user_id = $1 AND course_id = $2
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(percent)
    .bind(progress::is_complete(percent))
    .fetch_optional(&mut *db)
    .await?;

    Ok(enrollment)
}

impl<'c> Progress<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Lessons of a course the user has completed
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), course_id = %abbrev_uuid(&course_id)), err)]
    pub async fn completed_lesson_ids(&mut self, user_id: UserId, course_id: CourseId) -> Result<Vec<LessonId>> {
        let ids = sqlx::query_scalar::<_, LessonId>(
            r#"
            SELECT p.lesson_id FROM lesson_progress p
            JOIN course_lessons l ON l.id = p.lesson_id
            JOIN course_modules m ON m.id = l.module_id
            WHERE p.user_id = $1 AND m.course_id = $2 AND p.completed
            ORDER BY m.order_index, l.order_index
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(ids)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), course_id = %abbrev_uuid(&course_id)), err)]
    pub async fn course_percent(&mut self, user_id: UserId, course_id: CourseId) -> Result<i32> {
        course_percent(self.db, user_id, course_id).await
    }

    /// Flip a lesson between complete and incomplete, then refresh the course enrollment.
    ///
    /// Both writes happen in one transaction.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), lesson_id = %abbrev_uuid(&lesson_id)), err)]
    pub async fn toggle_lesson(&mut self, user_id: UserId, lesson_id: LessonId) -> Result<ToggleOutcome> {
        let mut tx = self.db.begin().await?;

        let course_id = sqlx::query_scalar::<_, CourseId>(
            r#"
            SELECT m.course_id FROM course_lessons l
            JOIN course_modules m ON m.id = l.module_id
            WHERE l.id = $1
            "#,
        )
        .bind(lesson_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        let removed = sqlx::query("DELETE FROM lesson_progress WHERE user_id = $1 AND lesson_id = $2 AND completed")
            .bind(user_id)
            .bind(lesson_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if !removed {
            sqlx::query(
                r#"
                INSERT INTO lesson_progress (user_id, lesson_id, completed, completed_at)
                VALUES ($1, $2, TRUE, NOW())
                ON CONFLICT (user_id, lesson_id) DO UPDATE SET completed = TRUE, completed_at = NOW()
                "#,
            )
            .bind(user_id)
            .bind(lesson_id)
            .execute(&mut *tx)
            .await?;
        }

        let enrollment = refresh_enrollment(&mut tx, user_id, course_id).await?;
        let progress = match &enrollment {
            Some(e) => e.progress,
            None => course_percent(&mut tx, user_id, course_id).await?,
        };

        tx.commit().await?;

        Ok(ToggleOutcome {
            course_id,
            completed: !removed,
            progress,
            enrollment,
        })
    }

    /// Enroll the user at their current progress. Enrolling twice returns the existing row.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), course_id = %abbrev_uuid(&course_id)), err)]
    pub async fn enroll(&mut self, user_id: UserId, course_id: CourseId) -> Result<EnrollmentDBResponse> {
        let mut tx = self.db.begin().await?;

        let percent = course_percent(&mut tx, user_id, course_id).await?;
        let complete = progress::is_complete(percent);
        sqlx::query(
            r#"
            INSERT INTO course_enrollments (user_id, course_id, progress, completed, completed_at)
            VALUES ($1, $2, $3, $4, CASE WHEN $4 THEN NOW() ELSE NULL END)
            ON CONFLICT (user_id, course_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(percent)
        .bind(complete)
        .execute(&mut *tx)
        .await?;

        let enrollment = sqlx::query_as::<_, EnrollmentDBResponse>(
            "SELECT * FROM course_enrollments WHERE user_id = $1 AND course_id = $2",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(enrollment)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), course_id = %abbrev_uuid(&course_id)), err)]
    pub async fn get_enrollment(&mut self, user_id: UserId, course_id: CourseId) -> Result<Option<EnrollmentDBResponse>> {
        let enrollment = sqlx::query_as::<_, EnrollmentDBResponse>(
            "SELECT * FROM course_enrollments WHERE user_id = $1 AND course_id = $2",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(enrollment)
    }

    /// Enrollments of many users with course titles, newest first
    #[instrument(skip(self, user_ids), fields(count = user_ids.len()), err)]
    pub async fn enrollments_for_users(&mut self, user_ids: &[UserId]) -> Result<Vec<TeamEnrollmentRow>> {
        let rows = sqlx::query_as::<_, TeamEnrollmentRow>(
            r#"
            SELECT e.user_id, e.course_id, c.title AS course_title, e.progress, e.completed, e.enrolled_at
            FROM course_enrollments e
            LEFT JOIN courses c ON c.id = e.course_id
            WHERE e.user_id = ANY($1)
            ORDER BY e.enrolled_at DESC
            "#,
        )
        .bind(user_ids)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows)
    }
}
