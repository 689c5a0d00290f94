//! Signed object downloads.
//!
//! This route sits outside the authenticated API: possession of a valid, unexpired signed URL is
//! the only credential. The signature is checked before the object is touched.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use utoipa::IntoParams;

use crate::{
    AppState,
    errors::{Error, Result},
    storage::signing::{self, SignatureError},
    types::{Operation, Permission, Resource},
};

/// Both fields are optional so a truncated link is refused like any other bad signature.
#[derive(Debug, Deserialize, IntoParams)]
pub struct SignedUrlQuery {
    /// Unix timestamp after which the link stops working
    #[param(value_type = Option<i64>)]
    pub expires: Option<String>,
    pub token: Option<String>,
}

impl SignedUrlQuery {
    fn parts(&self) -> std::result::Result<(i64, &str), SignatureError> {
        let expires = self
            .expires
            .as_deref()
            .and_then(|raw| raw.parse().ok())
            .ok_or(SignatureError::Invalid)?;
        let token = self.token.as_deref().ok_or(SignatureError::Invalid)?;
        Ok((expires, token))
    }
}

fn refused(reason: SignatureError) -> Error {
    let resource = match reason {
        SignatureError::Expired => "expired download link",
        SignatureError::Invalid => "invalid download link",
    };
    Error::InsufficientPermissions {
        required: Permission::Allow(Resource::Uploads, Operation::ReadAll),
        action: Operation::ReadAll,
        resource: resource.to_string(),
    }
}

/// Stream a stored object named by a signed URL
#[utoipa::path(
    get,
    path = "/storage/{bucket}/{path}",
    tag = "storage",
    summary = "Download a stored object",
    params(
        ("bucket" = String, Path, description = "Bucket name"),
        ("path" = String, Path, description = "Object path inside the bucket"),
        SignedUrlQuery,
    ),
    responses(
        (status = 200, description = "Object content"),
        (status = 403, description = "Link expired or signature invalid"),
        (status = 404, description = "Object not found"),
    )
)]
#[tracing::instrument(skip(state, query))]
pub async fn download(
    State(state): State<AppState>,
    Path((bucket, path)): Path<(String, String)>,
    Query(query): Query<SignedUrlQuery>,
) -> Result<Response> {
    let secret = state.config.secret_key.as_deref().ok_or_else(|| Error::Internal {
        operation: "verify a signed URL without a secret key".to_string(),
    })?;

    let (expires, token) = query.parts().map_err(refused)?;
    signing::verify(secret, &bucket, &path, expires, token, Utc::now()).map_err(refused)?;

    let object = state.storage.open(&bucket, &path).await?;

    let content_type = mime_guess::from_path(&path).first_or_octet_stream();
    let mut response = Body::from_stream(ReaderStream::new(object.file)).into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(content_type.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(object.size));

    Ok(response)
}
