//! API request/response models for users, roles and agency owners.

use crate::db::models::users::ProfileDBResponse;
use crate::directory::{self, DirectoryQuery};
use crate::phone;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::{IntoParams, ToSchema};

use super::pagination::Pagination;

/// Portal roles. A user may hold several, or none.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, PartialOrd, Ord, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    TeamMember,
    TeamManager,
    AgencyOwner,
    Administrator,
}

impl Role {
    /// Roles an agency owner may hand out to their own team.
    pub fn is_team_role(self) -> bool {
        matches!(self, Role::TeamMember | Role::TeamManager)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::TeamMember => "team_member",
            Role::TeamManager => "team_manager",
            Role::AgencyOwner => "agency_owner",
            Role::Administrator => "administrator",
        };
        f.write_str(name)
    }
}

/// The authenticated caller, reloaded from the database on every request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Formatted as `(XXX) XXX-XXXX`
    pub phone_number: Option<String>,
    pub agency_name: Option<String>,
    pub agency_city: Option<String>,
    pub agency_state: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub agency_owner_id: Option<UserId>,
    pub roles: Vec<Role>,
}

impl CurrentUser {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Administrator)
    }
}

impl From<ProfileDBResponse> for CurrentUser {
    fn from(db: ProfileDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            first_name: db.first_name,
            last_name: db.last_name,
            phone_number: db.phone_number.as_deref().map(phone::format),
            agency_name: db.agency_name,
            agency_city: db.agency_city,
            agency_state: db.agency_state,
            agency_owner_id: db.agency_owner_id,
            roles: db.roles,
        }
    }
}

/// Agency owner reference attached to each user in the directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct AgencyOwnerRef {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub name: String,
}

// User response models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub agency_name: Option<String>,
    pub agency_city: Option<String>,
    pub agency_state: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub agency_owner_id: Option<UserId>,
    pub roles: Vec<Role>,
    /// Agency owners this user is linked to
    pub agency_owners: Vec<AgencyOwnerRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProfileDBResponse> for UserResponse {
    fn from(db: ProfileDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            first_name: db.first_name,
            last_name: db.last_name,
            phone_number: db.phone_number.as_deref().map(phone::format),
            agency_name: db.agency_name,
            agency_city: db.agency_city,
            agency_state: db.agency_state,
            agency_owner_id: db.agency_owner_id,
            roles: db.roles,
            agency_owners: Vec::new(), // Filled in by the directory listing
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl UserResponse {
    pub fn with_agency_owners(mut self, owners: Vec<AgencyOwnerRef>) -> Self {
        self.agency_owners = owners;
        self
    }
}

// User request models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCreate {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub role: Role,
    /// Required for team members and managers
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub agency_owner_ids: Vec<UserId>,
    /// Required for agency owners
    pub agency_name: Option<String>,
    pub agency_city: Option<String>,
    pub agency_state: Option<String>,
}

/// Partial profile update. Absent fields are left alone; an empty phone clears the number.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub agency_name: Option<String>,
    pub agency_city: Option<String>,
    pub agency_state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AgencyOwnersUpdate {
    #[schema(value_type = Vec<String>)]
    pub agency_owner_ids: Vec<UserId>,
}

/// Query parameters for the user directory
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListUsersQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub directory: DirectoryQuery,

    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

/// The admin user directory, with facets computed over the unfiltered list
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserDirectoryResponse {
    pub users: Vec<UserResponse>,
    pub cities: Vec<String>,
    pub states: Vec<String>,
    /// Number of users matching the filters, before pagination
    pub total_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AgencyOwnerResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub agency_name: Option<String>,
    pub agency_city: Option<String>,
    pub agency_state: Option<String>,
    /// Agency name, else full name, else email
    pub display_name: String,
}

impl From<ProfileDBResponse> for AgencyOwnerResponse {
    fn from(db: ProfileDBResponse) -> Self {
        let display_name = directory::owner_display_name(
            db.agency_name.as_deref(),
            db.first_name.as_deref(),
            db.last_name.as_deref(),
            &db.email,
        );
        Self {
            id: db.id,
            email: db.email,
            first_name: db.first_name,
            last_name: db.last_name,
            agency_name: db.agency_name,
            agency_city: db.agency_city,
            agency_state: db.agency_state,
            display_name,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListAgencyOwnersQuery {
    /// Case-insensitive substring over owner name, city and state
    pub search: Option<String>,
}

/// Promote (or create) an agency owner from a name and an email address
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AgencyOwnerCreate {
    pub name: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_users_query_parses_filters_and_page() {
        let owner = uuid::Uuid::new_v4();
        let uri: axum::http::Uri = format!("/users?role=agency_owner&agency={owner}&city=Austin&sort=city&order=desc&skip=5&limit=10")
            .parse()
            .unwrap();
        let axum::extract::Query(query) = axum::extract::Query::<ListUsersQuery>::try_from_uri(&uri).unwrap();

        assert_eq!(query.directory.role, Some(Role::AgencyOwner));
        assert_eq!(query.directory.agency, Some(owner));
        assert_eq!(query.directory.city.as_deref(), Some("Austin"));
        assert_eq!(query.directory.sort, Some(directory::SortField::City));
        assert_eq!(query.directory.order, Some(directory::SortOrder::Desc));
        assert_eq!(query.pagination.skip(), 5);
        assert_eq!(query.pagination.limit(), 10);
    }

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::AgencyOwner).unwrap(), "\"agency_owner\"");
        let role: Role = serde_json::from_str("\"team_manager\"").unwrap();
        assert_eq!(role, Role::TeamManager);
        assert_eq!(Role::Administrator.to_string(), "administrator");
    }

    #[test]
    fn test_team_roles() {
        assert!(Role::TeamMember.is_team_role());
        assert!(Role::TeamManager.is_team_role());
        assert!(!Role::AgencyOwner.is_team_role());
        assert!(!Role::Administrator.is_team_role());
    }
}
