use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::{
        handlers::{optional_title, required_title},
        models::documents::{DocumentCreate, DocumentResponse, DocumentUpdate, ListDocumentsQuery},
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        errors::DbError,
        handlers::{Documents, Repository, documents::DocumentFilter},
        models::documents::{DocumentCreateDBRequest, DocumentUpdateDBRequest},
    },
    errors::{Error, Result},
    types::DocumentId,
};

fn document_not_found(id: DocumentId) -> Error {
    Error::NotFound {
        resource: "Document".to_string(),
        id: id.to_string(),
    }
}

fn required_file_url(file_url: &str) -> Result<String> {
    let file_url = file_url.trim();
    if file_url.is_empty() {
        return Err(Error::BadRequest {
            message: "File URL is required".to_string(),
        });
    }
    Ok(file_url.to_string())
}

/// Document library, newest first
#[utoipa::path(
    get,
    path = "/documents",
    tag = "documents",
    summary = "List documents",
    params(ListDocumentsQuery),
    responses(
        (status = 200, description = "Documents matching the search", body = Vec<DocumentResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<ListDocumentsQuery>,
    _: RequiresPermission<resource::Documents, operation::ReadAll>,
) -> Result<Json<Vec<DocumentResponse>>> {
    let filter = DocumentFilter {
        search: query.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let documents = Documents::new(&mut conn).list(&filter).await?;

    Ok(Json(documents.into_iter().map(DocumentResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/documents",
    tag = "documents",
    summary = "Create document",
    request_body = DocumentCreate,
    responses(
        (status = 201, description = "Document created", body = DocumentResponse),
        (status = 400, description = "Title and file URL are required"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_document(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Documents, operation::CreateAll>,
    Json(create): Json<DocumentCreate>,
) -> Result<(StatusCode, Json<DocumentResponse>)> {
    let request = DocumentCreateDBRequest {
        title: required_title(&create.title)?,
        description: create.description,
        file_url: required_file_url(&create.file_url)?,
        file_type: create.file_type,
        category: create.category,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let document = Documents::new(&mut conn).create(&request).await?;

    Ok((StatusCode::CREATED, Json(DocumentResponse::from(document))))
}

#[utoipa::path(
    patch,
    path = "/documents/{document_id}",
    tag = "documents",
    summary = "Update document",
    request_body = DocumentUpdate,
    params(("document_id" = uuid::Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Updated document", body = DocumentResponse),
        (status = 400, description = "Title or file URL cannot be blank"),
        (status = 404, description = "Document not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_document(
    State(state): State<AppState>,
    Path(document_id): Path<DocumentId>,
    _: RequiresPermission<resource::Documents, operation::UpdateAll>,
    Json(update): Json<DocumentUpdate>,
) -> Result<Json<DocumentResponse>> {
    let request = DocumentUpdateDBRequest {
        title: optional_title(update.title)?,
        description: update.description,
        file_url: update.file_url.as_deref().map(required_file_url).transpose()?,
        file_type: update.file_type,
        category: update.category,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    match Documents::new(&mut conn).update(document_id, &request).await {
        Ok(document) => Ok(Json(DocumentResponse::from(document))),
        Err(DbError::NotFound) => Err(document_not_found(document_id)),
        Err(e) => Err(e.into()),
    }
}

#[utoipa::path(
    delete,
    path = "/documents/{document_id}",
    tag = "documents",
    summary = "Delete document",
    params(("document_id" = uuid::Uuid, Path, description = "Document ID")),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 404, description = "Document not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<DocumentId>,
    _: RequiresPermission<resource::Documents, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Documents::new(&mut conn).delete(document_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(document_not_found(document_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::test_utils::*;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_document_library(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let auth = add_auth_headers(&admin);

        for (title, category) in [("Rate sheet", "Pricing"), ("Claims guide", "Operations")] {
            app.post("/admin/api/v1/documents")
                .add_header(&auth[0].0, &auth[0].1)
                .json(&json!({
                    "title": title,
                    "file_url": "https://files.example.com/doc.pdf",
                    "file_type": "pdf",
                    "category": category
                }))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let member = create_test_user(&pool, Role::TeamMember).await;
        let member_auth = add_auth_headers(&member);

        let response = app
            .get("/admin/api/v1/documents")
            .add_header(&member_auth[0].0, &member_auth[0].1)
            .await;
        let documents: Vec<DocumentResponse> = response.json();
        assert_eq!(documents.len(), 2);

        let response = app
            .get("/admin/api/v1/documents?search=PRICING")
            .add_header(&member_auth[0].0, &member_auth[0].1)
            .await;
        let documents: Vec<DocumentResponse> = response.json();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].title, "Rate sheet");

        app.post("/admin/api/v1/documents")
            .add_header(&member_auth[0].0, &member_auth[0].1)
            .json(&json!({"title": "Nope", "file_url": "https://example.com"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_document_validation_and_delete(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let auth = add_auth_headers(&admin);

        app.post("/admin/api/v1/documents")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"title": "No file", "file_url": " "}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let document: DocumentResponse = app
            .post("/admin/api/v1/documents")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"title": "Handbook", "file_url": "https://example.com/h.pdf"}))
            .await
            .json();

        let response = app
            .patch(&format!("/admin/api/v1/documents/{}", document.id))
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"category": "HR"}))
            .await;
        let updated: DocumentResponse = response.json();
        assert_eq!(updated.category.as_deref(), Some("HR"));
        assert_eq!(updated.title, "Handbook");

        app.delete(&format!("/admin/api/v1/documents/{}", document.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.delete(&format!("/admin/api/v1/documents/{}", document.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
