use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::users::{
        AgencyOwnerCreate, AgencyOwnerRef, AgencyOwnerResponse, AgencyOwnersUpdate, CurrentUser, ListAgencyOwnersQuery,
        ListUsersQuery, ProfileUpdate, Role, UserCreate, UserDirectoryResponse, UserResponse,
    },
    auth::{
        password,
        permissions::{RequiresPermission, operation, resource},
        utils::split_full_name,
    },
    db::{
        handlers::{Repository, Users},
        models::users::{AgencyOwnerLink, ProfileCreateDBRequest, ProfileDBResponse, ProfileUpdateDBRequest},
    },
    directory, phone,
    errors::{Error, Result},
    types::UserId,
};

const MISSING_AGENCY_OWNERS: &str = "Please select at least one agency owner for team members and managers.";
const MISSING_AGENCY_DETAILS: &str = "Please provide agency name, city, and state for agency owners.";

fn user_not_found(id: UserId) -> Error {
    Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Turn an API patch into a database patch. An empty phone clears the stored number.
fn profile_update_request(update: ProfileUpdate) -> Result<ProfileUpdateDBRequest> {
    let phone_number = match update.phone_number {
        Some(raw) => Some(phone::validate(&raw)?),
        None => None,
    };

    Ok(ProfileUpdateDBRequest {
        first_name: update.first_name.map(|v| v.trim().to_string()),
        last_name: update.last_name.map(|v| v.trim().to_string()),
        phone_number,
        agency_name: update.agency_name.map(|v| v.trim().to_string()),
        agency_city: update.agency_city.map(|v| v.trim().to_string()),
        agency_state: update.agency_state.map(|v| v.trim().to_string()),
        password_hash: None,
    })
}

/// Attach agency owner names to directory entries
fn with_owner_names(profiles: Vec<ProfileDBResponse>, links: Vec<AgencyOwnerLink>) -> Vec<UserResponse> {
    let mut owners: HashMap<UserId, Vec<AgencyOwnerRef>> = HashMap::new();
    for link in links {
        owners.entry(link.user_id).or_default().push(AgencyOwnerRef {
            id: link.agency_owner_id,
            name: directory::person_name(link.first_name.as_deref(), link.last_name.as_deref(), &link.email),
        });
    }

    profiles
        .into_iter()
        .map(|profile| {
            let refs = owners.remove(&profile.id).unwrap_or_default();
            UserResponse::from(profile).with_agency_owners(refs)
        })
        .collect()
}

/// Check role prerequisites for a new user before anything is written
fn validate_user_create(create: &UserCreate, password_config: &crate::config::PasswordConfig) -> Result<Option<String>> {
    if create.email.trim().is_empty() || !create.email.contains('@') {
        return Err(Error::BadRequest {
            message: "Please enter a valid email address".to_string(),
        });
    }
    if create.first_name.trim().is_empty() || create.last_name.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "First and last name are required".to_string(),
        });
    }

    password::validate_length(&create.password, password_config)?;

    if create.role.is_team_role() && create.agency_owner_ids.is_empty() {
        return Err(Error::BadRequest {
            message: MISSING_AGENCY_OWNERS.to_string(),
        });
    }

    if create.role == Role::AgencyOwner {
        let missing = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());
        if missing(&create.agency_name) || missing(&create.agency_city) || missing(&create.agency_state) {
            return Err(Error::BadRequest {
                message: MISSING_AGENCY_DETAILS.to_string(),
            });
        }
    }

    phone::validate(create.phone_number.as_deref().unwrap_or(""))
}

/// Get the session user
#[utoipa::path(
    get,
    path = "/users/current",
    tag = "users",
    summary = "Get current user",
    responses(
        (status = 200, description = "The authenticated user with roles", body = CurrentUser),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_current_user(current_user: RequiresPermission<resource::Users, operation::ReadOwn>) -> Result<Json<CurrentUser>> {
    Ok(Json(current_user.user))
}

/// Update the caller's own profile
#[utoipa::path(
    patch,
    path = "/users/current",
    tag = "users",
    summary = "Update own profile",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Updated profile", body = CurrentUser),
        (status = 400, description = "Invalid phone number"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_current_user(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Users, operation::UpdateOwn>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<CurrentUser>> {
    let request = profile_update_request(update)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let updated = Users::new(&mut conn).update(current_user.id, &request).await?;

    Ok(Json(CurrentUser::from(updated)))
}

/// Admin user directory
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    summary = "List users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Filtered and sorted users with facets", body = UserDirectoryResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
    _: RequiresPermission<resource::Users, operation::ReadAll>,
) -> Result<Json<UserDirectoryResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);

    let profiles = repo.list_all().await?;
    let ids: Vec<UserId> = profiles.iter().map(|p| p.id).collect();
    let links = repo.agency_owner_links(&ids).await?;

    let users = with_owner_names(profiles, links);
    let (cities, states) = directory::facets(&users);
    let filtered = directory::filter_and_sort(users, &query.directory);
    let total_count = filtered.len() as i64;

    Ok(Json(UserDirectoryResponse {
        users: query.pagination.apply(filtered),
        cities,
        states,
        total_count,
    }))
}

/// Create a user with a role and, depending on the role, agency owners or agency details
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    summary = "Create user",
    request_body = UserCreate,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Email already registered"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Users, operation::CreateAll>,
    Json(create): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let phone_number = validate_user_create(&create, &state.config.auth.native.password)?;
    let password_hash = password::hash_password(create.password.clone(), &state.config.auth.native.password).await?;

    let is_owner = create.role == Role::AgencyOwner;
    let agency_field = |value: &Option<String>| if is_owner { trimmed(value.clone()) } else { None };

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut tx);

    let created = repo
        .create(&ProfileCreateDBRequest {
            email: create.email.trim().to_string(),
            password_hash: Some(password_hash),
            first_name: trimmed(Some(create.first_name.clone())),
            last_name: trimmed(Some(create.last_name.clone())),
            phone_number,
            agency_name: agency_field(&create.agency_name),
            agency_city: agency_field(&create.agency_city),
            agency_state: agency_field(&create.agency_state),
            roles: vec![create.role],
        })
        .await?;

    if !create.agency_owner_ids.is_empty() {
        repo.set_agency_owners(created.id, &create.agency_owner_ids).await?;
    }
    let links = repo.agency_owner_links(&[created.id]).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(user_id = %created.id, role = %create.role, "Created user");

    let mut users = with_owner_names(vec![created], links);
    let user = users.pop().ok_or_else(|| Error::Internal {
        operation: "build created user response".to_string(),
    })?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Inline edit of profile fields
#[utoipa::path(
    patch,
    path = "/users/{user_id}",
    tag = "users",
    summary = "Update user",
    request_body = ProfileUpdate,
    params(("user_id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Invalid phone number"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    _: RequiresPermission<resource::Users, operation::UpdateAll>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<UserResponse>> {
    let request = profile_update_request(update)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);
    let updated = match repo.update(user_id, &request).await {
        Ok(user) => user,
        Err(crate::db::errors::DbError::NotFound) => return Err(user_not_found(user_id)),
        Err(e) => return Err(e.into()),
    };
    let links = repo.agency_owner_links(&[user_id]).await?;

    let mut users = with_owner_names(vec![updated], links);
    users.pop().map(Json).ok_or_else(|| user_not_found(user_id))
}

#[utoipa::path(
    delete,
    path = "/users/{user_id}",
    tag = "users",
    summary = "Delete user",
    params(("user_id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: RequiresPermission<resource::Users, operation::DeleteAll>,
) -> Result<StatusCode> {
    if user_id == current_user.id {
        return Err(Error::BadRequest {
            message: "You cannot delete your own account".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Users::new(&mut conn).delete(user_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(user_not_found(user_id))
    }
}

/// Grant a role. Granting a role the user already holds is a no-op.
#[utoipa::path(
    post,
    path = "/users/{user_id}/roles/{role}",
    tag = "users",
    summary = "Add role",
    params(
        ("user_id" = uuid::Uuid, Path, description = "User ID"),
        ("role" = Role, Path, description = "Role to grant"),
    ),
    responses(
        (status = 200, description = "User with updated roles", body = UserResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn add_role(
    State(state): State<AppState>,
    Path((user_id, role)): Path<(UserId, Role)>,
    _: RequiresPermission<resource::Roles, operation::CreateAll>,
) -> Result<Json<UserResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);

    if repo.get_by_id(user_id).await?.is_none() {
        return Err(user_not_found(user_id));
    }
    repo.add_role(user_id, role).await?;

    let user = repo.get_by_id(user_id).await?.ok_or_else(|| user_not_found(user_id))?;
    let links = repo.agency_owner_links(&[user_id]).await?;
    let mut users = with_owner_names(vec![user], links);
    users.pop().map(Json).ok_or_else(|| user_not_found(user_id))
}

/// Revoke exactly one `(user, role)` pair
#[utoipa::path(
    delete,
    path = "/users/{user_id}/roles/{role}",
    tag = "users",
    summary = "Remove role",
    params(
        ("user_id" = uuid::Uuid, Path, description = "User ID"),
        ("role" = Role, Path, description = "Role to revoke"),
    ),
    responses(
        (status = 204, description = "Role removed"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "The user does not hold this role"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn remove_role(
    State(state): State<AppState>,
    Path((user_id, role)): Path<(UserId, Role)>,
    _: RequiresPermission<resource::Roles, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Users::new(&mut conn).remove_role(user_id, role).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound {
            resource: "Role".to_string(),
            id: format!("{role} for user {user_id}"),
        })
    }
}

/// Replace the agency owners a user is linked to
#[utoipa::path(
    put,
    path = "/users/{user_id}/agency-owners",
    tag = "users",
    summary = "Set agency owners",
    request_body = AgencyOwnersUpdate,
    params(("user_id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User with updated agency owners", body = UserResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn set_agency_owners(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    _: RequiresPermission<resource::Users, operation::UpdateAll>,
    Json(update): Json<AgencyOwnersUpdate>,
) -> Result<Json<UserResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut tx);

    let user = repo.get_by_id(user_id).await?.ok_or_else(|| user_not_found(user_id))?;
    repo.set_agency_owners(user_id, &update.agency_owner_ids).await?;
    let links = repo.agency_owner_links(&[user_id]).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let mut users = with_owner_names(vec![user], links);
    users.pop().map(Json).ok_or_else(|| user_not_found(user_id))
}

/// List agency owners, optionally searched by name, city or state
#[utoipa::path(
    get,
    path = "/agency-owners",
    tag = "users",
    summary = "List agency owners",
    params(ListAgencyOwnersQuery),
    responses(
        (status = 200, description = "Agency owners ordered by first name", body = Vec<AgencyOwnerResponse>),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_agency_owners(
    State(state): State<AppState>,
    Query(query): Query<ListAgencyOwnersQuery>,
    _: RequiresPermission<resource::AgencyOwners, operation::ReadAll>,
) -> Result<Json<Vec<AgencyOwnerResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let owners = Users::new(&mut conn).list_by_role(Role::AgencyOwner).await?;

    let mut owners: Vec<AgencyOwnerResponse> = owners.into_iter().map(AgencyOwnerResponse::from).collect();
    owners.sort_by(directory::compare_owners);

    Ok(Json(directory::search_agency_owners(owners, query.search.as_deref())))
}

/// Promote an existing account to agency owner, or create a password-less one
#[utoipa::path(
    post,
    path = "/agency-owners",
    tag = "users",
    summary = "Create agency owner",
    request_body = AgencyOwnerCreate,
    responses(
        (status = 201, description = "Agency owner", body = AgencyOwnerResponse),
        (status = 400, description = "Name and email are required"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_agency_owner(
    State(state): State<AppState>,
    _: RequiresPermission<resource::AgencyOwners, operation::CreateAll>,
    Json(create): Json<AgencyOwnerCreate>,
) -> Result<(StatusCode, Json<AgencyOwnerResponse>)> {
    let email = create.email.trim().to_string();
    if create.name.trim().is_empty() || email.is_empty() {
        return Err(Error::BadRequest {
            message: "Name and email are required".to_string(),
        });
    }
    let (first_name, last_name) = split_full_name(&create.name);

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut tx);

    let owner_id = match repo.get_by_email(&email).await? {
        Some(existing) => {
            repo.update(
                existing.id,
                &ProfileUpdateDBRequest {
                    first_name: Some(first_name),
                    last_name: Some(last_name),
                    ..Default::default()
                },
            )
            .await?;
            existing.id
        }
        None => {
            repo.create(&ProfileCreateDBRequest {
                email,
                password_hash: None,
                first_name: Some(first_name),
                last_name: Some(last_name),
                ..Default::default()
            })
            .await?
            .id
        }
    };
    repo.add_role(owner_id, Role::AgencyOwner).await?;
    let owner = repo.get_by_id(owner_id).await?.ok_or_else(|| user_not_found(owner_id))?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(AgencyOwnerResponse::from(owner))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use serde_json::json;
    use sqlx::PgPool;

    fn owner_create(owner_ids: Vec<UserId>, role: Role) -> serde_json::Value {
        json!({
            "email": "created@example.com",
            "password": "password123",
            "first_name": "Casey",
            "last_name": "Jones",
            "phone_number": "555-123-4567",
            "role": role,
            "agency_owner_ids": owner_ids,
        })
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_current_user_roundtrip(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::TeamMember).await;
        let auth = add_auth_headers(&user);

        let response = app.get("/admin/api/v1/users/current").add_header(&auth[0].0, &auth[0].1).await;
        response.assert_status_ok();
        let body: CurrentUser = response.json();
        assert_eq!(body.id, user.id);

        let response = app
            .patch("/admin/api/v1/users/current")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"first_name": "Robin", "phone_number": "5551234567"}))
            .await;
        response.assert_status_ok();
        let body: CurrentUser = response.json();
        assert_eq!(body.first_name.as_deref(), Some("Robin"));
        assert_eq!(body.phone_number.as_deref(), Some("(555) 123-4567"));

        let response = app
            .patch("/admin/api/v1/users/current")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"phone_number": "12345"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.text(), "Please enter a valid 10-digit US phone number");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unauthenticated_requests_rejected(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        app.get("/admin/api/v1/users/current")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_directory_requires_admin(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let member = create_test_user(&pool, Role::TeamMember).await;
        let auth = add_auth_headers(&member);

        let response = app.get("/admin/api/v1/users").add_header(&auth[0].0, &auth[0].1).await;
        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_directory_filters_and_facets(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let auth = add_auth_headers(&admin);
        let owner = create_test_user(&pool, Role::AgencyOwner).await;
        let member = create_test_user(&pool, Role::TeamMember).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);
        repo.update(
            owner.id,
            &ProfileUpdateDBRequest {
                agency_city: Some("Austin".to_string()),
                agency_state: Some("TX".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        repo.link_agency_owner(member.id, owner.id).await.unwrap();

        let response = app
            .get(&format!("/admin/api/v1/users?agency={}", owner.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await;
        response.assert_status_ok();
        let body: UserDirectoryResponse = response.json();
        let ids: Vec<UserId> = body.users.iter().map(|u| u.id).collect();
        assert_eq!(body.total_count, 2);
        assert!(ids.contains(&owner.id) && ids.contains(&member.id));
        assert_eq!(body.cities, vec!["Austin".to_string()]);
        assert_eq!(body.states, vec!["TX".to_string()]);

        let linked = body.users.iter().find(|u| u.id == member.id).unwrap();
        assert_eq!(linked.agency_owners.len(), 1);
        assert_eq!(linked.agency_owners[0].id, owner.id);

        let response = app
            .get("/admin/api/v1/users?role=administrator&limit=10")
            .add_header(&auth[0].0, &auth[0].1)
            .await;
        let body: UserDirectoryResponse = response.json();
        assert!(body.users.iter().all(|u| u.roles.contains(&Role::Administrator)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_user_validates_role_prerequisites(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let auth = add_auth_headers(&admin);

        let response = app
            .post("/admin/api/v1/users")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&owner_create(vec![], Role::TeamMember))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.text(), MISSING_AGENCY_OWNERS);

        let response = app
            .post("/admin/api/v1/users")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&owner_create(vec![], Role::AgencyOwner))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.text(), MISSING_AGENCY_DETAILS);

        // Nothing was written
        let mut conn = pool.acquire().await.unwrap();
        assert!(
            Users::new(&mut conn)
                .get_by_email("created@example.com")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_team_member_with_owner(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let auth = add_auth_headers(&admin);
        let owner = create_test_user(&pool, Role::AgencyOwner).await;

        let response = app
            .post("/admin/api/v1/users")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&owner_create(vec![owner.id], Role::TeamMember))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: UserResponse = response.json();
        assert_eq!(body.roles, vec![Role::TeamMember]);
        assert_eq!(body.phone_number.as_deref(), Some("(555) 123-4567"));
        assert_eq!(body.agency_owners.len(), 1);
        assert!(body.agency_name.is_none());

        let response = app
            .post("/admin/api/v1/users")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&owner_create(vec![owner.id], Role::TeamMember))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        assert!(response.text().contains("An account with this email address already exists"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_remove_role_removes_exactly_that_pair(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let auth = add_auth_headers(&admin);
        let user = create_test_user(&pool, Role::TeamMember).await;

        let response = app
            .post(&format!("/admin/api/v1/users/{}/roles/team_manager", user.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await;
        response.assert_status_ok();
        let body: UserResponse = response.json();
        assert_eq!(body.roles, vec![Role::TeamMember, Role::TeamManager]);

        // Adding again is a no-op
        app.post(&format!("/admin/api/v1/users/{}/roles/team_manager", user.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .assert_status_ok();

        app.delete(&format!("/admin/api/v1/users/{}/roles/team_member", user.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let mut conn = pool.acquire().await.unwrap();
        let reloaded = Users::new(&mut conn).get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.roles, vec![Role::TeamManager]);

        app.delete(&format!("/admin/api/v1/users/{}/roles/team_member", user.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_inline_update_clears_phone(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let auth = add_auth_headers(&admin);
        let user = create_test_user(&pool, Role::TeamMember).await;

        app.patch(&format!("/admin/api/v1/users/{}", user.id))
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"phone_number": "(555) 987-6543", "agency_city": "Denver"}))
            .await
            .assert_status_ok();

        let response = app
            .patch(&format!("/admin/api/v1/users/{}", user.id))
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"phone_number": ""}))
            .await;
        response.assert_status_ok();
        let body: UserResponse = response.json();
        assert!(body.phone_number.is_none());
        assert_eq!(body.agency_city.as_deref(), Some("Denver"));

        app.patch(&format!("/admin/api/v1/users/{}", uuid::Uuid::new_v4()))
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"first_name": "Nobody"}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_set_agency_owners_and_delete(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let auth = add_auth_headers(&admin);
        let first = create_test_user(&pool, Role::AgencyOwner).await;
        let second = create_test_user(&pool, Role::AgencyOwner).await;
        let user = create_test_user(&pool, Role::TeamMember).await;

        let response = app
            .put(&format!("/admin/api/v1/users/{}/agency-owners", user.id))
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"agency_owner_ids": [first.id, second.id]}))
            .await;
        response.assert_status_ok();
        let body: UserResponse = response.json();
        assert_eq!(body.agency_owners.len(), 2);

        let response = app
            .put(&format!("/admin/api/v1/users/{}/agency-owners", user.id))
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"agency_owner_ids": [second.id]}))
            .await;
        let body: UserResponse = response.json();
        assert_eq!(body.agency_owners.iter().map(|o| o.id).collect::<Vec<_>>(), vec![second.id]);

        app.delete(&format!("/admin/api/v1/users/{}", user.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.delete(&format!("/admin/api/v1/users/{}", user.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_agency_owner_from_name_and_email(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let auth = add_auth_headers(&admin);
        let existing = create_test_user(&pool, Role::TeamMember).await;

        // Existing account: name split and saved, role added
        let response = app
            .post("/admin/api/v1/agency-owners")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"name": "Mary Ann Smith", "email": existing.email}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: AgencyOwnerResponse = response.json();
        assert_eq!(body.id, existing.id);
        assert_eq!(body.first_name.as_deref(), Some("Mary"));
        assert_eq!(body.last_name.as_deref(), Some("Ann Smith"));

        // New account without a password
        let response = app
            .post("/admin/api/v1/agency-owners")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"name": "Zed", "email": "zed@example.com"}))
            .await;
        response.assert_status(StatusCode::CREATED);

        let mut conn = pool.acquire().await.unwrap();
        let created = Users::new(&mut conn).get_by_email("zed@example.com").await.unwrap().unwrap();
        assert!(created.password_hash.is_none());
        assert_eq!(created.roles, vec![Role::AgencyOwner]);

        // Agency owners may list, and search narrows the list
        let owner = create_test_user(&pool, Role::AgencyOwner).await;
        let owner_auth = add_auth_headers(&owner);
        let response = app
            .get("/admin/api/v1/agency-owners?search=mary")
            .add_header(&owner_auth[0].0, &owner_auth[0].1)
            .await;
        response.assert_status_ok();
        let owners: Vec<AgencyOwnerResponse> = response.json();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].id, existing.id);
    }
}
