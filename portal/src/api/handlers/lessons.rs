use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use chrono::Utc;

use crate::{
    AppState,
    api::{
        handlers::{modules::module_not_found, optional_title, required_title},
        models::courses::{
            CompletionResponse, LessonContentUpdate, LessonCreate, LessonResponse, LessonTitleUpdate, LessonUpdate, PlaybackResponse,
            PlaybackSource, ReorderRequest,
        },
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        errors::DbError,
        handlers::{Lessons, Modules, Progress, Repository, lessons::LessonFilter},
        models::courses::{LessonCreateDBRequest, LessonDBResponse, LessonUpdateDBRequest},
    },
    errors::{Error, Result},
    ordering,
    storage::{self, LESSON_VIDEOS_BUCKET, signing},
    types::{LessonId, ModuleId},
    video,
};

fn lesson_not_found(id: LessonId) -> Error {
    Error::NotFound {
        resource: "Lesson".to_string(),
        id: id.to_string(),
    }
}

fn lesson_result(result: std::result::Result<LessonDBResponse, DbError>, id: LessonId) -> Result<Json<LessonResponse>> {
    match result {
        Ok(lesson) => Ok(Json(LessonResponse::from(lesson))),
        Err(DbError::NotFound) => Err(lesson_not_found(id)),
        Err(e) => Err(e.into()),
    }
}

async fn ensure_module(conn: &mut sqlx::PgConnection, module_id: ModuleId) -> Result<()> {
    match Modules::new(conn).get_by_id(module_id).await? {
        Some(_) => Ok(()),
        None => Err(module_not_found(module_id)),
    }
}

/// Append a lesson to a module
#[utoipa::path(
    post,
    path = "/modules/{module_id}/lessons",
    tag = "lessons",
    summary = "Create lesson",
    request_body = LessonCreate,
    params(("module_id" = uuid::Uuid, Path, description = "Module ID")),
    responses(
        (status = 201, description = "Lesson created", body = LessonResponse),
        (status = 400, description = "Title is required"),
        (status = 404, description = "Module not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_lesson(
    State(state): State<AppState>,
    Path(module_id): Path<ModuleId>,
    _: RequiresPermission<resource::Lessons, operation::CreateAll>,
    Json(create): Json<LessonCreate>,
) -> Result<(StatusCode, Json<LessonResponse>)> {
    let title = required_title(&create.title)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    ensure_module(&mut conn, module_id).await?;

    let lesson = Lessons::new(&mut conn)
        .create(&LessonCreateDBRequest {
            module_id,
            title,
            description: create.description,
            video_url: create.video_url.filter(|url| !url.trim().is_empty()),
            duration_seconds: create.duration_seconds,
            resources: create.resources,
            content: create.content,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(LessonResponse::from(lesson))))
}

/// Append a placeholder lesson titled "New Lesson"
#[utoipa::path(
    post,
    path = "/modules/{module_id}/lessons/blank",
    tag = "lessons",
    summary = "Create blank lesson",
    params(("module_id" = uuid::Uuid, Path, description = "Module ID")),
    responses(
        (status = 201, description = "Lesson created", body = LessonResponse),
        (status = 404, description = "Module not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_blank_lesson(
    State(state): State<AppState>,
    Path(module_id): Path<ModuleId>,
    _: RequiresPermission<resource::Lessons, operation::CreateAll>,
) -> Result<(StatusCode, Json<LessonResponse>)> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    ensure_module(&mut conn, module_id).await?;

    let lesson = Lessons::new(&mut conn).create(&LessonCreateDBRequest::blank(module_id)).await?;

    Ok((StatusCode::CREATED, Json(LessonResponse::from(lesson))))
}

/// Move one lesson onto another's position within the module
#[utoipa::path(
    post,
    path = "/modules/{module_id}/lessons/reorder",
    tag = "lessons",
    summary = "Reorder lessons",
    request_body = ReorderRequest,
    params(("module_id" = uuid::Uuid, Path, description = "Module ID")),
    responses(
        (status = 200, description = "Lessons of the module in their new order", body = Vec<LessonResponse>),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn reorder_lessons(
    State(state): State<AppState>,
    Path(module_id): Path<ModuleId>,
    _: RequiresPermission<resource::Lessons, operation::UpdateAll>,
    Json(request): Json<ReorderRequest>,
) -> Result<Json<Vec<LessonResponse>>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Lessons::new(&mut tx);

    let ids = repo.ids_for_module(module_id).await?;
    if let Some(sequence) = ordering::reorder(&ids, request.active_id, request.over_id) {
        repo.reorder(&ordering::indexed(&sequence)).await?;
    }
    let lessons = repo.list(&LessonFilter::Module(module_id)).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(lessons.into_iter().map(LessonResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/lessons/{lesson_id}",
    tag = "lessons",
    summary = "Get lesson",
    params(("lesson_id" = uuid::Uuid, Path, description = "Lesson ID")),
    responses(
        (status = 200, description = "Lesson", body = LessonResponse),
        (status = 404, description = "Lesson not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_lesson(
    State(state): State<AppState>,
    Path(lesson_id): Path<LessonId>,
    _: RequiresPermission<resource::Lessons, operation::ReadAll>,
) -> Result<Json<LessonResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let lesson = Lessons::new(&mut conn)
        .get_by_id(lesson_id)
        .await?
        .ok_or_else(|| lesson_not_found(lesson_id))?;

    Ok(Json(LessonResponse::from(lesson)))
}

/// Full lesson update from the editor dialog
#[utoipa::path(
    patch,
    path = "/lessons/{lesson_id}",
    tag = "lessons",
    summary = "Update lesson",
    request_body = LessonUpdate,
    params(("lesson_id" = uuid::Uuid, Path, description = "Lesson ID")),
    responses(
        (status = 200, description = "Updated lesson", body = LessonResponse),
        (status = 400, description = "Title cannot be blank"),
        (status = 404, description = "Lesson not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_lesson(
    State(state): State<AppState>,
    Path(lesson_id): Path<LessonId>,
    _: RequiresPermission<resource::Lessons, operation::UpdateAll>,
    Json(update): Json<LessonUpdate>,
) -> Result<Json<LessonResponse>> {
    let request = LessonUpdateDBRequest {
        title: optional_title(update.title)?,
        description: update.description,
        video_url: update.video_url,
        duration_seconds: update.duration_seconds,
        resources: update.resources,
        content: update.content,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    lesson_result(Lessons::new(&mut conn).update(lesson_id, &request).await, lesson_id)
}

/// Save the rich-text body only
#[utoipa::path(
    put,
    path = "/lessons/{lesson_id}/content",
    tag = "lessons",
    summary = "Update lesson content",
    request_body = LessonContentUpdate,
    params(("lesson_id" = uuid::Uuid, Path, description = "Lesson ID")),
    responses(
        (status = 200, description = "Updated lesson", body = LessonResponse),
        (status = 404, description = "Lesson not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_lesson_content(
    State(state): State<AppState>,
    Path(lesson_id): Path<LessonId>,
    _: RequiresPermission<resource::Lessons, operation::UpdateAll>,
    Json(update): Json<LessonContentUpdate>,
) -> Result<Json<LessonResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    lesson_result(Lessons::new(&mut conn).update_content(lesson_id, &update.content).await, lesson_id)
}

/// Inline title edit from the sidebar
#[utoipa::path(
    put,
    path = "/lessons/{lesson_id}/title",
    tag = "lessons",
    summary = "Rename lesson",
    request_body = LessonTitleUpdate,
    params(("lesson_id" = uuid::Uuid, Path, description = "Lesson ID")),
    responses(
        (status = 200, description = "Updated lesson", body = LessonResponse),
        (status = 400, description = "Title cannot be blank"),
        (status = 404, description = "Lesson not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_lesson_title(
    State(state): State<AppState>,
    Path(lesson_id): Path<LessonId>,
    _: RequiresPermission<resource::Lessons, operation::UpdateAll>,
    Json(update): Json<LessonTitleUpdate>,
) -> Result<Json<LessonResponse>> {
    let request = LessonUpdateDBRequest {
        title: Some(required_title(&update.title)?),
        ..Default::default()
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    lesson_result(Lessons::new(&mut conn).update(lesson_id, &request).await, lesson_id)
}

#[utoipa::path(
    delete,
    path = "/lessons/{lesson_id}",
    tag = "lessons",
    summary = "Delete lesson",
    params(("lesson_id" = uuid::Uuid, Path, description = "Lesson ID")),
    responses(
        (status = 204, description = "Lesson deleted"),
        (status = 404, description = "Lesson not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_lesson(
    State(state): State<AppState>,
    Path(lesson_id): Path<LessonId>,
    _: RequiresPermission<resource::Lessons, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Lessons::new(&mut conn).delete(lesson_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(lesson_not_found(lesson_id))
    }
}

/// Upload a video file for a lesson, replacing any external video link
#[utoipa::path(
    post,
    path = "/lessons/{lesson_id}/video",
    tag = "lessons",
    summary = "Upload lesson video",
    request_body(
        content_type = "multipart/form-data",
        description = "Video file in a field named `file`"
    ),
    params(("lesson_id" = uuid::Uuid, Path, description = "Lesson ID")),
    responses(
        (status = 200, description = "Lesson pointing at the uploaded file", body = LessonResponse),
        (status = 400, description = "Missing or unreadable file"),
        (status = 404, description = "Lesson not found"),
        (status = 413, description = "File too large"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn upload_lesson_video(
    State(state): State<AppState>,
    Path(lesson_id): Path<LessonId>,
    _: RequiresPermission<resource::Uploads, operation::CreateAll>,
    mut multipart: Multipart,
) -> Result<Json<LessonResponse>> {
    let lesson = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Lessons::new(&mut conn)
            .get_by_id(lesson_id)
            .await?
            .ok_or_else(|| lesson_not_found(lesson_id))?
    };

    // Chunks go straight to storage; the running total is checked before each write
    let max_size = state.config.storage.max_video_size;
    let mut stored: Option<(String, u64)> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Failed to parse multipart data: {e}"),
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let key = storage::lesson_video_key(lesson.module_id, field.file_name(), Utc::now().timestamp_millis());
        // Dropping the writer on any early return discards the partial object
        let mut writer = state.storage.create(LESSON_VIDEOS_BUCKET, &key).await?;
        let mut total_size = 0u64;

        while let Some(chunk) = field.chunk().await.map_err(|e| Error::BadRequest {
            message: format!("Failed to read file chunk: {e}"),
        })? {
            total_size += chunk.len() as u64;
            if total_size > max_size {
                tracing::warn!(lesson_id = %lesson_id, total_size, max_size, "Video size limit exceeded, aborting upload");
                return Err(Error::PayloadTooLarge {
                    message: format!("File size must be less than {}MB", max_size / (1024 * 1024)),
                });
            }
            writer.write_chunk(&chunk).await?;
        }

        if total_size == 0 {
            return Err(Error::BadRequest {
                message: "Uploaded file is empty".to_string(),
            });
        }

        let size = writer.commit().await?;
        stored = Some((key, size));
        break;
    }

    let (key, size) = stored.ok_or_else(|| Error::BadRequest {
        message: "No file provided".to_string(),
    })?;

    tracing::info!(lesson_id = %lesson_id, key = %key, size, "Stored lesson video");

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    lesson_result(Lessons::new(&mut conn).set_video_file(lesson_id, &key).await, lesson_id)
}

/// Detach both the external link and the uploaded file from a lesson
#[utoipa::path(
    delete,
    path = "/lessons/{lesson_id}/video",
    tag = "lessons",
    summary = "Remove lesson video",
    params(("lesson_id" = uuid::Uuid, Path, description = "Lesson ID")),
    responses(
        (status = 200, description = "Lesson without a video", body = LessonResponse),
        (status = 404, description = "Lesson not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn remove_lesson_video(
    State(state): State<AppState>,
    Path(lesson_id): Path<LessonId>,
    _: RequiresPermission<resource::Lessons, operation::UpdateAll>,
) -> Result<Json<LessonResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    lesson_result(Lessons::new(&mut conn).clear_video(lesson_id).await, lesson_id)
}

/// Where the player should load the lesson video from
#[utoipa::path(
    get,
    path = "/lessons/{lesson_id}/playback",
    tag = "lessons",
    summary = "Get playback URL",
    params(("lesson_id" = uuid::Uuid, Path, description = "Lesson ID")),
    responses(
        (status = 200, description = "Embed URL, signed download URL, or an empty URL", body = PlaybackResponse),
        (status = 404, description = "Lesson not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_playback(
    State(state): State<AppState>,
    Path(lesson_id): Path<LessonId>,
    _: RequiresPermission<resource::Lessons, operation::ReadAll>,
) -> Result<Json<PlaybackResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let lesson = Lessons::new(&mut conn)
        .get_by_id(lesson_id)
        .await?
        .ok_or_else(|| lesson_not_found(lesson_id))?;

    let external = lesson.video_url.as_deref().filter(|url| !url.is_empty());
    let uploaded = lesson.video_file_path.as_deref().filter(|path| !path.is_empty());

    let playback = match (external, uploaded) {
        (Some(url), _) => PlaybackResponse {
            source: PlaybackSource::Embed,
            url: video::embed_url(url),
            expires_at: None,
        },
        (None, Some(path)) => {
            let secret = state.config.secret_key.as_deref().ok_or_else(|| Error::Internal {
                operation: "sign playback URL without a secret key".to_string(),
            })?;
            let signed = signing::signed_url(
                state.config.public_base(),
                secret,
                LESSON_VIDEOS_BUCKET,
                path,
                state.config.storage.signed_url_ttl,
                Utc::now(),
            )
            .ok_or_else(|| Error::Internal {
                operation: "sign playback URL".to_string(),
            })?;
            PlaybackResponse {
                source: PlaybackSource::Upload,
                url: signed.url,
                expires_at: Some(signed.expires_at),
            }
        }
        (None, None) => PlaybackResponse {
            source: PlaybackSource::None,
            url: String::new(),
            expires_at: None,
        },
    };

    Ok(Json(playback))
}

/// Toggle the caller's completion of a lesson and refresh their enrollment
#[utoipa::path(
    post,
    path = "/lessons/{lesson_id}/completion",
    tag = "lessons",
    summary = "Toggle lesson completion",
    params(("lesson_id" = uuid::Uuid, Path, description = "Lesson ID")),
    responses(
        (status = 200, description = "New completion state and course progress", body = CompletionResponse),
        (status = 404, description = "Lesson not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn toggle_completion(
    State(state): State<AppState>,
    Path(lesson_id): Path<LessonId>,
    current_user: RequiresPermission<resource::Progress, operation::UpdateOwn>,
) -> Result<Json<CompletionResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let outcome = match Progress::new(&mut conn).toggle_lesson(current_user.id, lesson_id).await {
        Ok(outcome) => outcome,
        Err(DbError::NotFound) => return Err(lesson_not_found(lesson_id)),
        Err(e) => return Err(e.into()),
    };

    Ok(Json(CompletionResponse {
        lesson_id,
        course_id: outcome.course_id,
        completed: outcome.completed,
        progress: outcome.progress,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::courses::{CourseResponse, ModuleResponse};
    use crate::api::models::users::Role;
    use crate::test_utils::*;
    use axum_test::multipart::{MultipartForm, Part};
    use serde_json::json;
    use sqlx::PgPool;

    async fn module_fixture(app: &axum_test::TestServer, auth: &[(String, String)]) -> ModuleResponse {
        let course: CourseResponse = app
            .post("/admin/api/v1/courses")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"title": "Course"}))
            .await
            .json();
        app.post(&format!("/admin/api/v1/courses/{}/modules", course.id))
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"title": "Module"}))
            .await
            .json()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_blank_lesson_defaults(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let auth = add_auth_headers(&admin);
        let module = module_fixture(&app, &auth).await;

        let response = app
            .post(&format!("/admin/api/v1/modules/{}/lessons/blank", module.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await;
        response.assert_status(StatusCode::CREATED);
        let lesson: LessonResponse = response.json();
        assert_eq!(lesson.title, "New Lesson");
        assert_eq!(lesson.description.as_deref(), Some(""));
        assert_eq!(lesson.content, "");
        assert_eq!(lesson.duration_seconds, Some(0));
        assert!(lesson.resources.is_empty());
        assert_eq!(lesson.order_index, 0);

        let second: LessonResponse = app
            .post(&format!("/admin/api/v1/modules/{}/lessons/blank", module.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .json();
        assert_eq!(second.order_index, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_lesson_edits(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let auth = add_auth_headers(&admin);
        let module = module_fixture(&app, &auth).await;

        let response = app
            .post(&format!("/admin/api/v1/modules/{}/lessons", module.id))
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({
                "title": "Welcome",
                "video_url": "https://www.youtube.com/watch?v=abc123",
                "resources": [{"name": "Guide", "url": "https://example.com/guide.pdf"}]
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let lesson: LessonResponse = response.json();
        assert_eq!(lesson.video_provider, Some(crate::video::VideoProvider::Youtube));
        assert_eq!(lesson.resources.len(), 1);

        let response = app
            .put(&format!("/admin/api/v1/lessons/{}/content", lesson.id))
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"content": "<p>Hello</p>"}))
            .await;
        response.assert_status_ok();
        let updated: LessonResponse = response.json();
        assert_eq!(updated.content, "<p>Hello</p>");
        assert_eq!(updated.title, "Welcome");

        let response = app
            .put(&format!("/admin/api/v1/lessons/{}/title", lesson.id))
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"title": "Renamed"}))
            .await;
        let updated: LessonResponse = response.json();
        assert_eq!(updated.title, "Renamed");

        app.put(&format!("/admin/api/v1/lessons/{}/title", lesson.id))
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"title": "  "}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let response = app
            .patch(&format!("/admin/api/v1/lessons/{}", lesson.id))
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"duration_seconds": 300, "resources": []}))
            .await;
        let updated: LessonResponse = response.json();
        assert_eq!(updated.duration_seconds, Some(300));
        assert!(updated.resources.is_empty());
        assert_eq!(updated.content, "<p>Hello</p>");

        let response = app
            .get(&format!("/admin/api/v1/lessons/{}/playback", lesson.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await;
        let playback: PlaybackResponse = response.json();
        assert_eq!(playback.source, PlaybackSource::Embed);
        assert!(playback.url.starts_with("https://www.youtube.com/embed/abc123?"));

        let response = app
            .delete(&format!("/admin/api/v1/lessons/{}/video", lesson.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await;
        response.assert_status_ok();
        let cleared: LessonResponse = response.json();
        assert!(cleared.video_url.is_none() && cleared.video_file_path.is_none());

        let playback: PlaybackResponse = app
            .get(&format!("/admin/api/v1/lessons/{}/playback", lesson.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .json();
        assert_eq!(playback.source, PlaybackSource::None);
        assert_eq!(playback.url, "");

        app.delete(&format!("/admin/api/v1/lessons/{}", lesson.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.get(&format!("/admin/api/v1/lessons/{}", lesson.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_reorder_lessons(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let auth = add_auth_headers(&admin);
        let module = module_fixture(&app, &auth).await;

        let mut lessons = Vec::new();
        for title in ["First", "Second", "Third"] {
            let lesson: LessonResponse = app
                .post(&format!("/admin/api/v1/modules/{}/lessons", module.id))
                .add_header(&auth[0].0, &auth[0].1)
                .json(&json!({ "title": title }))
                .await
                .json();
            lessons.push(lesson);
        }

        let response = app
            .post(&format!("/admin/api/v1/modules/{}/lessons/reorder", module.id))
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"active_id": lessons[2].id, "over_id": lessons[1].id}))
            .await;
        response.assert_status_ok();
        let reordered: Vec<LessonResponse> = response.json();
        let titles: Vec<&str> = reordered.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Third", "Second"]);
        assert_eq!(reordered.iter().map(|l| l.order_index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_video_upload_then_signed_playback(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let auth = add_auth_headers(&admin);
        let module = module_fixture(&app, &auth).await;
        let lesson: LessonResponse = app
            .post(&format!("/admin/api/v1/modules/{}/lessons", module.id))
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"title": "Recorded", "video_url": "https://vimeo.com/12345"}))
            .await
            .json();

        let video = b"not really an mp4".to_vec();
        let form = MultipartForm::new().add_part("file", Part::bytes(video.clone()).file_name("Intro.MP4"));
        let response = app
            .post(&format!("/admin/api/v1/lessons/{}/video", lesson.id))
            .add_header(&auth[0].0, &auth[0].1)
            .multipart(form)
            .await;
        response.assert_status_ok();
        let uploaded: LessonResponse = response.json();
        assert!(uploaded.video_url.is_none());
        let key = uploaded.video_file_path.clone().unwrap();
        assert!(key.starts_with(&format!("{}/", module.id)));
        assert!(key.ends_with(".mp4"));

        let playback: PlaybackResponse = app
            .get(&format!("/admin/api/v1/lessons/{}/playback", lesson.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .json();
        assert_eq!(playback.source, PlaybackSource::Upload);
        assert!(playback.expires_at.is_some());

        // The signed URL streams the stored bytes back
        let path = playback.url.trim_start_matches("http://localhost:3001");
        let response = app.get(path).await;
        response.assert_status_ok();
        assert_eq!(response.as_bytes().to_vec(), video);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_video_upload_size_ceiling(pool: PgPool) {
        let mut config = create_test_config();
        config.storage.max_video_size = 1024;
        let storage_root = config.storage.root_dir.clone();
        let app = create_test_app_with_config(pool.clone(), config).await;
        let admin = create_test_admin(&pool).await;
        let auth = add_auth_headers(&admin);
        let module = module_fixture(&app, &auth).await;
        let lesson: LessonResponse = app
            .post(&format!("/admin/api/v1/modules/{}/lessons/blank", module.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .json();

        let form = MultipartForm::new().add_part("file", Part::bytes(vec![0u8; 4096]).file_name("big.mp4"));
        let response = app
            .post(&format!("/admin/api/v1/lessons/{}/video", lesson.id))
            .add_header(&auth[0].0, &auth[0].1)
            .multipart(form)
            .await;
        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);

        // The aborted upload leaves no object or partial file behind
        let module_dir = storage_root.join(LESSON_VIDEOS_BUCKET).join(module.id.to_string());
        let leftovers = std::fs::read_dir(&module_dir).map(|dir| dir.count()).unwrap_or(0);
        assert_eq!(leftovers, 0);

        let member = create_test_user(&pool, Role::TeamMember).await;
        let member_auth = add_auth_headers(&member);
        let form = MultipartForm::new().add_part("file", Part::bytes(vec![0u8; 16]).file_name("small.mp4"));
        app.post(&format!("/admin/api/v1/lessons/{}/video", lesson.id))
            .add_header(&member_auth[0].0, &member_auth[0].1)
            .multipart(form)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_completion_toggle_twice_returns_to_incomplete(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let admin_auth = add_auth_headers(&admin);
        let module = module_fixture(&app, &admin_auth).await;
        let lesson: LessonResponse = app
            .post(&format!("/admin/api/v1/modules/{}/lessons/blank", module.id))
            .add_header(&admin_auth[0].0, &admin_auth[0].1)
            .await
            .json();

        let member = create_test_user(&pool, Role::TeamMember).await;
        let auth = add_auth_headers(&member);

        let first: CompletionResponse = app
            .post(&format!("/admin/api/v1/lessons/{}/completion", lesson.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .json();
        assert!(first.completed);
        assert_eq!(first.progress, 100);
        assert_eq!(first.course_id, module.course_id);

        let second: CompletionResponse = app
            .post(&format!("/admin/api/v1/lessons/{}/completion", lesson.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .json();
        assert!(!second.completed);
        assert_eq!(second.progress, 0);

        app.post(&format!("/admin/api/v1/lessons/{}/completion", uuid::Uuid::new_v4()))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
