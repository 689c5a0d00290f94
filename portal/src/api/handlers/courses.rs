use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::{
        handlers::{optional_title, required_title},
        models::courses::{
            CourseContentResponse, CourseCreate, CourseResponse, CourseUpdate, EnrollmentResponse, LessonResponse, ModuleResponse,
            ModuleWithLessons, ReorderRequest,
        },
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        errors::DbError,
        handlers::{
            Courses, Lessons, Modules, Progress, Repository,
            courses::{CourseFilter, CourseOrder},
            lessons::LessonFilter,
            modules::ModuleFilter,
        },
        models::courses::{CourseCreateDBRequest, CourseUpdateDBRequest, LessonDBResponse},
    },
    errors::{Error, Result},
    ordering,
    types::{CourseId, ModuleId},
};

pub(crate) fn course_not_found(id: CourseId) -> Error {
    Error::NotFound {
        resource: "Course".to_string(),
        id: id.to_string(),
    }
}

/// Published catalogue in display order
#[utoipa::path(
    get,
    path = "/courses",
    tag = "courses",
    summary = "List courses",
    responses(
        (status = 200, description = "Courses by order_index", body = Vec<CourseResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_courses(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Courses, operation::ReadAll>,
) -> Result<Json<Vec<CourseResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let courses = Courses::new(&mut conn).list(&CourseFilter::default()).await?;

    Ok(Json(courses.into_iter().map(CourseResponse::from).collect()))
}

/// Admin course table, newest first
#[utoipa::path(
    get,
    path = "/courses/all",
    tag = "courses",
    summary = "List courses for administration",
    responses(
        (status = 200, description = "Courses by created_at descending", body = Vec<CourseResponse>),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_all_courses(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Courses, operation::UpdateAll>,
) -> Result<Json<Vec<CourseResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let courses = Courses::new(&mut conn)
        .list(&CourseFilter {
            order: CourseOrder::Newest,
        })
        .await?;

    Ok(Json(courses.into_iter().map(CourseResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/courses/{course_id}",
    tag = "courses",
    summary = "Get course",
    params(("course_id" = uuid::Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Course", body = CourseResponse),
        (status = 404, description = "Course not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_course(
    State(state): State<AppState>,
    Path(course_id): Path<CourseId>,
    _: RequiresPermission<resource::Courses, operation::ReadAll>,
) -> Result<Json<CourseResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let course = Courses::new(&mut conn)
        .get_by_id(course_id)
        .await?
        .ok_or_else(|| course_not_found(course_id))?;

    Ok(Json(CourseResponse::from(course)))
}

#[utoipa::path(
    post,
    path = "/courses",
    tag = "courses",
    summary = "Create course",
    request_body = CourseCreate,
    responses(
        (status = 201, description = "Course created at the end of the catalogue", body = CourseResponse),
        (status = 400, description = "Title is required"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_course(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Courses, operation::CreateAll>,
    Json(create): Json<CourseCreate>,
) -> Result<(StatusCode, Json<CourseResponse>)> {
    let title = required_title(&create.title)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let course = Courses::new(&mut conn)
        .create(&CourseCreateDBRequest {
            title,
            description: create.description,
            thumbnail_url: create.thumbnail_url,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CourseResponse::from(course))))
}

#[utoipa::path(
    patch,
    path = "/courses/{course_id}",
    tag = "courses",
    summary = "Update course",
    request_body = CourseUpdate,
    params(("course_id" = uuid::Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Updated course", body = CourseResponse),
        (status = 400, description = "Title cannot be blank"),
        (status = 404, description = "Course not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_course(
    State(state): State<AppState>,
    Path(course_id): Path<CourseId>,
    _: RequiresPermission<resource::Courses, operation::UpdateAll>,
    Json(update): Json<CourseUpdate>,
) -> Result<Json<CourseResponse>> {
    let request = CourseUpdateDBRequest {
        title: optional_title(update.title)?,
        description: update.description,
        thumbnail_url: update.thumbnail_url,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    match Courses::new(&mut conn).update(course_id, &request).await {
        Ok(course) => Ok(Json(CourseResponse::from(course))),
        Err(DbError::NotFound) => Err(course_not_found(course_id)),
        Err(e) => Err(e.into()),
    }
}

/// Delete a course with its modules, lessons, progress and enrollments
#[utoipa::path(
    delete,
    path = "/courses/{course_id}",
    tag = "courses",
    summary = "Delete course",
    params(("course_id" = uuid::Uuid, Path, description = "Course ID")),
    responses(
        (status = 204, description = "Course deleted"),
        (status = 404, description = "Course not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_course(
    State(state): State<AppState>,
    Path(course_id): Path<CourseId>,
    _: RequiresPermission<resource::Courses, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Courses::new(&mut conn).delete(course_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(course_not_found(course_id))
    }
}

/// Move one course onto another's position
#[utoipa::path(
    post,
    path = "/courses/reorder",
    tag = "courses",
    summary = "Reorder courses",
    request_body = ReorderRequest,
    responses(
        (status = 200, description = "Courses in their new order", body = Vec<CourseResponse>),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn reorder_courses(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Courses, operation::UpdateAll>,
    Json(request): Json<ReorderRequest>,
) -> Result<Json<Vec<CourseResponse>>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Courses::new(&mut tx);

    let ids = repo.ids_in_order().await?;
    if let Some(sequence) = ordering::reorder(&ids, request.active_id, request.over_id) {
        repo.reorder(&ordering::indexed(&sequence)).await?;
    }
    let courses = repo.list(&CourseFilter::default()).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(courses.into_iter().map(CourseResponse::from).collect()))
}

/// Modules and lessons of a course, with the caller's progress
#[utoipa::path(
    get,
    path = "/courses/{course_id}/content",
    tag = "courses",
    summary = "Get course content",
    params(("course_id" = uuid::Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Course tree and progress", body = CourseContentResponse),
        (status = 404, description = "Course not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_course_content(
    State(state): State<AppState>,
    Path(course_id): Path<CourseId>,
    current_user: RequiresPermission<resource::Courses, operation::ReadAll>,
) -> Result<Json<CourseContentResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let course = Courses::new(&mut conn)
        .get_by_id(course_id)
        .await?
        .ok_or_else(|| course_not_found(course_id))?;
    let modules = Modules::new(&mut conn).list(&ModuleFilter { course_id }).await?;
    let lessons = Lessons::new(&mut conn).list(&LessonFilter::Course(course_id)).await?;

    let mut progress = Progress::new(&mut conn);
    let completed_lesson_ids = progress.completed_lesson_ids(current_user.id, course_id).await?;
    let percent = progress.course_percent(current_user.id, course_id).await?;

    let mut by_module: HashMap<ModuleId, Vec<LessonDBResponse>> = HashMap::new();
    for lesson in lessons {
        by_module.entry(lesson.module_id).or_default().push(lesson);
    }

    let modules = modules
        .into_iter()
        .map(|module| ModuleWithLessons {
            lessons: by_module
                .remove(&module.id)
                .unwrap_or_default()
                .into_iter()
                .map(LessonResponse::from)
                .collect(),
            module: ModuleResponse::from(module),
        })
        .collect();

    Ok(Json(CourseContentResponse {
        course: CourseResponse::from(course),
        modules,
        completed_lesson_ids,
        progress: percent,
    }))
}

/// Enroll the caller in a course. Enrolling twice returns the existing enrollment.
#[utoipa::path(
    post,
    path = "/courses/{course_id}/enrollment",
    tag = "courses",
    summary = "Enroll in course",
    params(("course_id" = uuid::Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Enrollment", body = EnrollmentResponse),
        (status = 404, description = "Course not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn enroll(
    State(state): State<AppState>,
    Path(course_id): Path<CourseId>,
    current_user: RequiresPermission<resource::Enrollments, operation::CreateOwn>,
) -> Result<Json<EnrollmentResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if Courses::new(&mut conn).get_by_id(course_id).await?.is_none() {
        return Err(course_not_found(course_id));
    }
    let enrollment = Progress::new(&mut conn).enroll(current_user.id, course_id).await?;

    Ok(Json(EnrollmentResponse::from(enrollment)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::db::models::courses::{LessonCreateDBRequest, ModuleCreateDBRequest};
    use crate::test_utils::*;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_course_persists_one_row(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let auth = add_auth_headers(&admin);

        let response = app
            .post("/admin/api/v1/courses")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"title": "  Sales 101  ", "description": "Basics"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let course: CourseResponse = response.json();
        assert_eq!(course.title, "Sales 101");

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(Courses::new(&mut conn).count().await.unwrap(), 1);

        let response = app
            .post("/admin/api/v1/courses")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"title": "   "}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(Courses::new(&mut conn).count().await.unwrap(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_members_read_but_cannot_write(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let member = create_test_user(&pool, Role::TeamMember).await;
        let auth = add_auth_headers(&member);

        app.get("/admin/api/v1/courses")
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .assert_status_ok();
        app.get("/admin/api/v1/courses/all")
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        app.post("/admin/api/v1/courses")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"title": "Nope"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_delete_and_missing_course(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let auth = add_auth_headers(&admin);

        let course: CourseResponse = app
            .post("/admin/api/v1/courses")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"title": "Draft"}))
            .await
            .json();

        let response = app
            .patch(&format!("/admin/api/v1/courses/{}", course.id))
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"title": "Final", "thumbnail_url": "https://example.com/t.png"}))
            .await;
        response.assert_status_ok();
        let updated: CourseResponse = response.json();
        assert_eq!(updated.title, "Final");
        assert_eq!(updated.thumbnail_url.as_deref(), Some("https://example.com/t.png"));

        app.patch(&format!("/admin/api/v1/courses/{}", course.id))
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"title": ""}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.delete(&format!("/admin/api/v1/courses/{}", course.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.get(&format!("/admin/api/v1/courses/{}", course.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        app.patch(&format!("/admin/api/v1/courses/{}", course.id))
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"description": "gone"}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_reorder_courses(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let auth = add_auth_headers(&admin);

        let mut ids = Vec::new();
        for title in ["A", "B", "C"] {
            let course: CourseResponse = app
                .post("/admin/api/v1/courses")
                .add_header(&auth[0].0, &auth[0].1)
                .json(&json!({ "title": title }))
                .await
                .json();
            ids.push(course.id);
        }

        let response = app
            .post("/admin/api/v1/courses/reorder")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"active_id": ids[2], "over_id": ids[0]}))
            .await;
        response.assert_status_ok();
        let courses: Vec<CourseResponse> = response.json();
        let titles: Vec<&str> = courses.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["C", "A", "B"]);
        let indices: Vec<i32> = courses.iter().map(|c| c.order_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        // Dropping outside the list changes nothing
        let response = app
            .post("/admin/api/v1/courses/reorder")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"active_id": ids[0], "over_id": null}))
            .await;
        let courses: Vec<CourseResponse> = response.json();
        assert_eq!(courses[0].title, "C");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_course_content_and_enrollment(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let member = create_test_user(&pool, Role::TeamMember).await;
        let auth = add_auth_headers(&member);

        let mut conn = pool.acquire().await.unwrap();
        let course = Courses::new(&mut conn)
            .create(&CourseCreateDBRequest {
                title: "Compliance".to_string(),
                description: None,
                thumbnail_url: None,
            })
            .await
            .unwrap();
        let module = Modules::new(&mut conn)
            .create(&ModuleCreateDBRequest {
                course_id: course.id,
                title: "Week 1".to_string(),
                description: None,
            })
            .await
            .unwrap();
        let first = Lessons::new(&mut conn).create(&LessonCreateDBRequest::blank(module.id)).await.unwrap();
        Lessons::new(&mut conn).create(&LessonCreateDBRequest::blank(module.id)).await.unwrap();

        let response = app
            .post(&format!("/admin/api/v1/courses/{}/enrollment", course.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await;
        response.assert_status_ok();
        let enrollment: EnrollmentResponse = response.json();
        assert_eq!(enrollment.progress, 0);
        assert!(!enrollment.completed);

        Progress::new(&mut conn).toggle_lesson(member.id, first.id).await.unwrap();

        let response = app
            .get(&format!("/admin/api/v1/courses/{}/content", course.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await;
        response.assert_status_ok();
        let content: CourseContentResponse = response.json();
        assert_eq!(content.modules.len(), 1);
        assert_eq!(content.modules[0].lessons.len(), 2);
        assert_eq!(content.completed_lesson_ids, vec![first.id]);
        assert_eq!(content.progress, 50);

        app.post(&format!("/admin/api/v1/courses/{}/enrollment", uuid::Uuid::new_v4()))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
