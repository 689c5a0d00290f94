//! API request/response models for courses, modules, lessons and progress.

pub use crate::ordering::ReorderRequest;

use crate::db::models::courses::{CourseDBResponse, EnrollmentDBResponse, LessonDBResponse, ModuleDBResponse};
use crate::types::{CourseId, LessonId, ModuleId, UserId};
use crate::video::VideoProvider;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

// Courses

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseCreate {
    #[schema(example = "Agency Onboarding")]
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// Partial course update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CourseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: CourseId,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    /// Position in the catalogue, 0-based
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CourseDBResponse> for CourseResponse {
    fn from(db: CourseDBResponse) -> Self {
        Self {
            id: db.id,
            title: db.title,
            description: db.description,
            thumbnail_url: db.thumbnail_url,
            order_index: db.order_index,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

// Modules

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModuleCreate {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ModuleUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModuleResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ModuleId,
    #[schema(value_type = String, format = "uuid")]
    pub course_id: CourseId,
    pub title: String,
    pub description: Option<String>,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ModuleDBResponse> for ModuleResponse {
    fn from(db: ModuleDBResponse) -> Self {
        Self {
            id: db.id,
            course_id: db.course_id,
            title: db.title,
            description: db.description,
            order_index: db.order_index,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

// Lessons

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LessonCreate {
    pub title: String,
    pub description: Option<String>,
    /// Link to a hosted video (YouTube, Vimeo, Loom, Google Drive, OneDrive)
    pub video_url: Option<String>,
    pub duration_seconds: Option<i32>,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub resources: Vec<Value>,
    /// Rich-text HTML body
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LessonUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub duration_seconds: Option<i32>,
    #[schema(value_type = Option<Vec<Object>>)]
    pub resources: Option<Vec<Value>>,
    pub content: Option<String>,
}

/// Replace only the rich-text body of a lesson
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LessonContentUpdate {
    pub content: String,
}

/// Inline title edit
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LessonTitleUpdate {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LessonResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: LessonId,
    #[schema(value_type = String, format = "uuid")]
    pub module_id: ModuleId,
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    /// Hosting service of `video_url`, when set
    pub video_provider: Option<VideoProvider>,
    /// Object path of an uploaded video in the `lesson-videos` bucket
    pub video_file_path: Option<String>,
    pub duration_seconds: Option<i32>,
    pub order_index: i32,
    #[schema(value_type = Vec<Object>)]
    pub resources: Vec<Value>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LessonDBResponse> for LessonResponse {
    fn from(db: LessonDBResponse) -> Self {
        let video_provider = db
            .video_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .map(VideoProvider::detect);
        Self {
            id: db.id,
            module_id: db.module_id,
            title: db.title,
            description: db.description,
            video_url: db.video_url,
            video_provider,
            video_file_path: db.video_file_path,
            duration_seconds: db.duration_seconds,
            order_index: db.order_index,
            resources: db.resources.0,
            content: db.content,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// A module with its lessons in display order
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModuleWithLessons {
    #[serde(flatten)]
    pub module: ModuleResponse,
    pub lessons: Vec<LessonResponse>,
}

/// The full content tree of a course as seen by the caller
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseContentResponse {
    pub course: CourseResponse,
    pub modules: Vec<ModuleWithLessons>,
    #[schema(value_type = Vec<String>)]
    pub completed_lesson_ids: Vec<LessonId>,
    /// Caller's completion percentage, 0 to 100
    pub progress: i32,
}

/// Drag-and-drop move of `active_id` onto the position of `over_id`

/// Where a lesson video plays from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackSource {
    /// Iframe embed of a hosted link
    Embed,
    /// Signed download of an uploaded file
    Upload,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlaybackResponse {
    pub source: PlaybackSource,
    /// Empty when the lesson has no video
    pub url: String,
    /// Set for signed upload URLs
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompletionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub lesson_id: LessonId,
    #[schema(value_type = String, format = "uuid")]
    pub course_id: CourseId,
    /// Completion state after the toggle
    pub completed: bool,
    /// Caller's course percentage after the toggle
    pub progress: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub course_id: CourseId,
    pub progress: i32,
    pub completed: bool,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<EnrollmentDBResponse> for EnrollmentResponse {
    fn from(db: EnrollmentDBResponse) -> Self {
        Self {
            user_id: db.user_id,
            course_id: db.course_id,
            progress: db.progress,
            completed: db.completed,
            enrolled_at: db.enrolled_at,
            completed_at: db.completed_at,
        }
    }
}
