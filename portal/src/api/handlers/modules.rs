use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::{
        handlers::{courses::course_not_found, optional_title, required_title},
        models::courses::{ModuleCreate, ModuleResponse, ModuleUpdate, ReorderRequest},
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        errors::DbError,
        handlers::{Courses, Modules, Repository, modules::ModuleFilter},
        models::courses::{ModuleCreateDBRequest, ModuleUpdateDBRequest},
    },
    errors::{Error, Result},
    ordering,
    types::{CourseId, ModuleId},
};

pub(crate) fn module_not_found(id: ModuleId) -> Error {
    Error::NotFound {
        resource: "Module".to_string(),
        id: id.to_string(),
    }
}

/// Append a module to a course
#[utoipa::path(
    post,
    path = "/courses/{course_id}/modules",
    tag = "modules",
    summary = "Create module",
    request_body = ModuleCreate,
    params(("course_id" = uuid::Uuid, Path, description = "Course ID")),
    responses(
        (status = 201, description = "Module created", body = ModuleResponse),
        (status = 400, description = "Title is required"),
        (status = 404, description = "Course not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_module(
    State(state): State<AppState>,
    Path(course_id): Path<CourseId>,
    _: RequiresPermission<resource::Modules, operation::CreateAll>,
    Json(create): Json<ModuleCreate>,
) -> Result<(StatusCode, Json<ModuleResponse>)> {
    let title = required_title(&create.title)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Courses::new(&mut conn).get_by_id(course_id).await?.is_none() {
        return Err(course_not_found(course_id));
    }

    let module = Modules::new(&mut conn)
        .create(&ModuleCreateDBRequest {
            course_id,
            title,
            description: create.description,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ModuleResponse::from(module))))
}

#[utoipa::path(
    patch,
    path = "/modules/{module_id}",
    tag = "modules",
    summary = "Update module",
    request_body = ModuleUpdate,
    params(("module_id" = uuid::Uuid, Path, description = "Module ID")),
    responses(
        (status = 200, description = "Updated module", body = ModuleResponse),
        (status = 400, description = "Title cannot be blank"),
        (status = 404, description = "Module not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_module(
    State(state): State<AppState>,
    Path(module_id): Path<ModuleId>,
    _: RequiresPermission<resource::Modules, operation::UpdateAll>,
    Json(update): Json<ModuleUpdate>,
) -> Result<Json<ModuleResponse>> {
    let request = ModuleUpdateDBRequest {
        title: optional_title(update.title)?,
        description: update.description,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    match Modules::new(&mut conn).update(module_id, &request).await {
        Ok(module) => Ok(Json(ModuleResponse::from(module))),
        Err(DbError::NotFound) => Err(module_not_found(module_id)),
        Err(e) => Err(e.into()),
    }
}

/// Delete a module and its lessons
#[utoipa::path(
    delete,
    path = "/modules/{module_id}",
    tag = "modules",
    summary = "Delete module",
    params(("module_id" = uuid::Uuid, Path, description = "Module ID")),
    responses(
        (status = 204, description = "Module deleted"),
        (status = 404, description = "Module not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_module(
    State(state): State<AppState>,
    Path(module_id): Path<ModuleId>,
    _: RequiresPermission<resource::Modules, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Modules::new(&mut conn).delete(module_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(module_not_found(module_id))
    }
}

/// Move one module onto another's position within the course
#[utoipa::path(
    post,
    path = "/courses/{course_id}/modules/reorder",
    tag = "modules",
    summary = "Reorder modules",
    request_body = ReorderRequest,
    params(("course_id" = uuid::Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Modules of the course in their new order", body = Vec<ModuleResponse>),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn reorder_modules(
    State(state): State<AppState>,
    Path(course_id): Path<CourseId>,
    _: RequiresPermission<resource::Modules, operation::UpdateAll>,
    Json(request): Json<ReorderRequest>,
) -> Result<Json<Vec<ModuleResponse>>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Modules::new(&mut tx);

    let ids = repo.ids_for_course(course_id).await?;
    if let Some(sequence) = ordering::reorder(&ids, request.active_id, request.over_id) {
        repo.reorder(&ordering::indexed(&sequence)).await?;
    }
    let modules = repo.list(&ModuleFilter { course_id }).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(modules.into_iter().map(ModuleResponse::from).collect()))
}
