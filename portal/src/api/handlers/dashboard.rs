use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::dashboard::DashboardResponse,
    auth::permissions::{RequiresPermission, operation, resource},
    db::handlers::{Courses, Documents, Events},
    errors::{Error, Result},
};

/// Landing page: the caller's profile and catalogue counts
#[utoipa::path(
    get,
    path = "/dashboard",
    tag = "dashboard",
    summary = "Dashboard summary",
    responses(
        (status = 200, description = "Profile and counts", body = DashboardResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_dashboard(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Dashboard, operation::ReadOwn>,
) -> Result<Json<DashboardResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let document_count = Documents::new(&mut conn).count().await?;
    let course_count = Courses::new(&mut conn).count().await?;
    let event_count = Events::new(&mut conn).count().await?;

    Ok(Json(DashboardResponse {
        profile: current_user.user,
        document_count,
        course_count,
        event_count,
    }))
}
