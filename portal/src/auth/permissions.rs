//! Role-based access control.
//!
//! Every authenticated user holds a base set of grants (read the catalogue, manage their own
//! profile, progress and sales figures). Roles add to that base:
//!
//! - `administrator` holds every permission
//! - `agency_owner` manages their own agency and sees their team
//! - `team_manager` sees the team of the agency owners they are linked to
//! - `team_member` adds nothing beyond the base set
//!
//! Handlers declare what they need with the [`RequiresPermission`] extractor:
//!
//! ```ignore
//! pub async fn create_course(
//!     State(state): State<AppState>,
//!     _: RequiresPermission<resource::Courses, operation::CreateAll>,
//!     Json(create): Json<CourseCreate>,
//! ) -> Result<(StatusCode, Json<CourseResponse>)> { ... }
//! ```

use std::marker::PhantomData;
use std::ops::Deref;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    AppState,
    api::models::users::{CurrentUser, Role},
    errors::{Error, Result},
    types::{Operation, Permission, Resource},
};

/// Grants held by every authenticated user, whatever their roles.
fn base_permission(resource: Resource, operation: Operation) -> bool {
    use Operation::*;
    use Resource::*;

    matches!(
        (resource, operation),
        (Courses | Modules | Lessons | Documents | Events, ReadAll)
            | (Users, ReadOwn | UpdateOwn)
            | (Dashboard, ReadOwn)
            | (Progress, ReadOwn | UpdateOwn)
            | (Enrollments, ReadOwn | CreateOwn)
            | (SalesMetrics, ReadOwn | CreateOwn | UpdateOwn)
            | (Leaderboard, ReadAll)
    )
}

/// Grants a single role adds on top of the base set.
pub fn role_has_permission(role: &Role, resource: Resource, operation: Operation) -> bool {
    use Operation::*;

    match role {
        Role::Administrator => true,
        Role::AgencyOwner => matches!(
            (resource, operation),
            (Resource::Agency, CreateOwn | ReadOwn | UpdateOwn | DeleteOwn)
                | (Resource::Team, ReadOwn)
                | (Resource::AgencyOwners, ReadAll)
        ),
        Role::TeamManager => matches!((resource, operation), (Resource::Team, ReadOwn)),
        Role::TeamMember => false,
    }
}

/// Check whether a user may perform an operation on a resource.
pub fn has_permission(user: &CurrentUser, resource: Resource, operation: Operation) -> bool {
    base_permission(resource, operation) || user.roles.iter().any(|role| role_has_permission(role, resource, operation))
}

/// Return an error unless the user holds the permission.
pub fn require(user: &CurrentUser, resource: Resource, operation: Operation) -> Result<()> {
    if has_permission(user, resource, operation) {
        Ok(())
    } else {
        Err(Error::InsufficientPermissions {
            required: Permission::Allow(resource, operation),
            action: operation,
            resource: resource.to_string(),
        })
    }
}

/// Type-level resource markers for [`RequiresPermission`]
pub mod resource {
    use crate::types::Resource;

    pub trait ResourceMarker {
        const RESOURCE: Resource;
    }

    macro_rules! markers {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl ResourceMarker for $name {
                    const RESOURCE: Resource = Resource::$name;
                }
            )*
        };
    }

    markers!(
        Users,
        Roles,
        AgencyOwners,
        Agency,
        Team,
        Courses,
        Modules,
        Lessons,
        Progress,
        Enrollments,
        Events,
        Documents,
        Dashboard,
        SalesMetrics,
        Leaderboard,
        Uploads,
    );
}

/// Type-level operation markers for [`RequiresPermission`]
pub mod operation {
    use crate::types::Operation;

    pub trait OperationMarker {
        const OPERATION: Operation;
    }

    macro_rules! markers {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl OperationMarker for $name {
                    const OPERATION: Operation = Operation::$name;
                }
            )*
        };
    }

    markers!(CreateAll, CreateOwn, ReadAll, ReadOwn, UpdateAll, UpdateOwn, DeleteAll, DeleteOwn);
}

/// Extractor that authenticates the caller and checks a single permission.
///
/// Dereferences to the [`CurrentUser`].
pub struct RequiresPermission<R, O> {
    pub user: CurrentUser,
    _marker: PhantomData<fn() -> (R, O)>,
}

impl<R, O> Deref for RequiresPermission<R, O> {
    type Target = CurrentUser;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl<R, O> FromRequestParts<AppState> for RequiresPermission<R, O>
where
    R: resource::ResourceMarker,
    O: operation::OperationMarker,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        require(&user, R::RESOURCE, O::OPERATION)?;

        Ok(Self {
            user,
            _marker: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user_with(roles: Vec<Role>) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "someone@example.com".to_string(),
            first_name: None,
            last_name: None,
            phone_number: None,
            agency_name: None,
            agency_city: None,
            agency_state: None,
            agency_owner_id: None,
            roles,
        }
    }

    #[test]
    fn test_roleless_user_gets_base_grants() {
        let user = user_with(vec![]);
        assert!(has_permission(&user, Resource::Courses, Operation::ReadAll));
        assert!(has_permission(&user, Resource::Documents, Operation::ReadAll));
        assert!(has_permission(&user, Resource::Events, Operation::ReadAll));
        assert!(has_permission(&user, Resource::Dashboard, Operation::ReadOwn));
        assert!(has_permission(&user, Resource::SalesMetrics, Operation::CreateOwn));
        assert!(has_permission(&user, Resource::Leaderboard, Operation::ReadAll));
        assert!(has_permission(&user, Resource::Progress, Operation::UpdateOwn));

        assert!(!has_permission(&user, Resource::Courses, Operation::CreateAll));
        assert!(!has_permission(&user, Resource::Users, Operation::ReadAll));
        assert!(!has_permission(&user, Resource::Team, Operation::ReadOwn));
        assert!(!has_permission(&user, Resource::Uploads, Operation::CreateAll));
    }

    #[test]
    fn test_administrator_has_everything() {
        let admin = user_with(vec![Role::Administrator]);
        for resource in [Resource::Users, Resource::Roles, Resource::Uploads, Resource::Team] {
            for operation in [Operation::CreateAll, Operation::ReadAll, Operation::UpdateAll, Operation::DeleteAll] {
                assert!(has_permission(&admin, resource, operation));
            }
        }
    }

    #[test]
    fn test_agency_roles() {
        let owner = user_with(vec![Role::AgencyOwner]);
        assert!(has_permission(&owner, Resource::Agency, Operation::CreateOwn));
        assert!(has_permission(&owner, Resource::Team, Operation::ReadOwn));
        assert!(has_permission(&owner, Resource::AgencyOwners, Operation::ReadAll));
        assert!(!has_permission(&owner, Resource::Team, Operation::ReadAll));
        assert!(!has_permission(&owner, Resource::Users, Operation::UpdateAll));

        let manager = user_with(vec![Role::TeamManager]);
        assert!(has_permission(&manager, Resource::Team, Operation::ReadOwn));
        assert!(!has_permission(&manager, Resource::Agency, Operation::ReadOwn));

        let member = user_with(vec![Role::TeamMember]);
        assert!(!has_permission(&member, Resource::Team, Operation::ReadOwn));
    }

    #[test]
    fn test_require_error_message() {
        let member = user_with(vec![Role::TeamMember]);
        let err = require(&member, Resource::Courses, Operation::DeleteAll).unwrap_err();
        assert_eq!(err.user_message(), "Insufficient permissions to Delete courses");
    }
}
