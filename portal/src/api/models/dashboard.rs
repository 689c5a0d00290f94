use super::users::CurrentUser;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Landing page summary for the caller
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardResponse {
    pub profile: CurrentUser,
    pub document_count: i64,
    pub course_count: i64,
    pub event_count: i64,
}
