//! API models for agency-owner self-service and team progress.

use super::users::Role;
use crate::db::models::courses::TeamEnrollmentRow;
use crate::db::models::users::ProfileDBResponse;
use crate::types::{CourseId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Shown for enrollments whose course no longer exists
pub const UNKNOWN_COURSE: &str = "Unknown Course";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InviteRequest {
    pub email: String,
    /// `team_member` or `team_manager`
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    /// An existing account joined the team
    Added,
    /// No account exists yet; the owner should forward the sign-up link
    Invitation,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InviteResponse {
    pub status: InviteStatus,
    pub message: String,
}

/// A member of the caller's agency team
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AgencyTeamMember {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

impl From<ProfileDBResponse> for AgencyTeamMember {
    fn from(db: ProfileDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            first_name: db.first_name,
            last_name: db.last_name,
            roles: db.roles,
            created_at: db.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeamEnrollment {
    #[schema(value_type = String, format = "uuid")]
    pub course_id: CourseId,
    pub course_title: String,
    pub progress: i32,
    pub completed: bool,
    pub enrolled_at: DateTime<Utc>,
}

impl From<TeamEnrollmentRow> for TeamEnrollment {
    fn from(row: TeamEnrollmentRow) -> Self {
        Self {
            course_id: row.course_id,
            course_title: row.course_title.unwrap_or_else(|| UNKNOWN_COURSE.to_string()),
            progress: row.progress,
            completed: row.completed,
            enrolled_at: row.enrolled_at,
        }
    }
}

/// A visible team member with their course enrollments
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeamMemberProgress {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub enrollments: Vec<TeamEnrollment>,
}
