//! Database models for courses, modules, lessons, progress and enrollments.

use crate::types::{CourseId, LessonId, ModuleId, UserId};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, types::Json};

#[derive(Debug, Clone)]
pub struct CourseCreateDBRequest {
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CourseUpdateDBRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CourseDBResponse {
    pub id: CourseId,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ModuleCreateDBRequest {
    pub course_id: CourseId,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ModuleUpdateDBRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ModuleDBResponse {
    pub id: ModuleId,
    pub course_id: CourseId,
    pub title: String,
    pub description: Option<String>,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LessonCreateDBRequest {
    pub module_id: ModuleId,
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub duration_seconds: Option<i32>,
    pub resources: Vec<Value>,
    pub content: String,
}

impl LessonCreateDBRequest {
    /// The placeholder lesson added by the "add lesson" button in the editor
    pub fn blank(module_id: ModuleId) -> Self {
        Self {
            module_id,
            title: "New Lesson".to_string(),
            description: Some(String::new()),
            video_url: None,
            duration_seconds: Some(0),
            resources: Vec::new(),
            content: String::new(),
        }
    }
}

/// Full lesson update. `None` leaves a column alone.
#[derive(Debug, Clone, Default)]
pub struct LessonUpdateDBRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub duration_seconds: Option<i32>,
    pub resources: Option<Vec<Value>>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct LessonDBResponse {
    pub id: LessonId,
    pub module_id: ModuleId,
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub video_file_path: Option<String>,
    pub duration_seconds: Option<i32>,
    pub order_index: i32,
    pub resources: Json<Vec<Value>>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct LessonProgressDBResponse {
    pub user_id: UserId,
    pub lesson_id: LessonId,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct EnrollmentDBResponse {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub progress: i32,
    pub completed: bool,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// An enrollment joined with its course title, as shown on the team page
#[derive(Debug, Clone, FromRow)]
pub struct TeamEnrollmentRow {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub course_title: Option<String>,
    pub progress: i32,
    pub completed: bool,
    pub enrolled_at: DateTime<Utc>,
}
