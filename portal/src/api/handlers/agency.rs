//! Agency-owner self-service: the owner's team, invitations and team roles.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        agency::{AgencyTeamMember, InviteRequest, InviteResponse, InviteStatus},
        users::Role,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{Repository, Users},
        models::users::ProfileDBResponse,
    },
    errors::{Error, Result},
    types::UserId,
};

fn require_team_role(role: Role) -> Result<()> {
    if role.is_team_role() {
        Ok(())
    } else {
        Err(Error::BadRequest {
            message: format!("Agency owners can only assign team_member or team_manager, not {role}"),
        })
    }
}

/// Load a profile that belongs to `owner_id`'s team, or 404
async fn team_member(repo: &mut Users<'_>, owner_id: UserId, user_id: UserId) -> Result<ProfileDBResponse> {
    repo.get_by_id(user_id)
        .await?
        .filter(|profile| profile.agency_owner_id == Some(owner_id))
        .ok_or_else(|| Error::NotFound {
            resource: "Team member".to_string(),
            id: user_id.to_string(),
        })
}

/// List the caller's agency team
#[utoipa::path(
    get,
    path = "/agency/team",
    tag = "agency",
    summary = "List my team",
    responses(
        (status = 200, description = "Profiles that joined the caller's agency", body = Vec<AgencyTeamMember>),
        (status = 403, description = "Caller is not an agency owner"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_team(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Agency, operation::ReadOwn>,
) -> Result<Json<Vec<AgencyTeamMember>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let members = Users::new(&mut conn).list_by_agency_owner_id(current_user.id).await?;

    Ok(Json(members.into_iter().map(AgencyTeamMember::from).collect()))
}

/// Invite someone to the caller's team by email
#[utoipa::path(
    post,
    path = "/agency/invitations",
    tag = "agency",
    summary = "Invite team member",
    request_body = InviteRequest,
    responses(
        (status = 200, description = "Existing account added, or an invitation link to forward", body = InviteResponse),
        (status = 400, description = "Role is not a team role"),
        (status = 403, description = "Caller is not an agency owner"),
        (status = 409, description = "This user is already part of a team."),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn invite(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Agency, operation::CreateOwn>,
    Json(request): Json<InviteRequest>,
) -> Result<Json<InviteResponse>> {
    require_team_role(request.role)?;
    let email = request.email.trim().to_string();
    if email.is_empty() {
        return Err(Error::BadRequest {
            message: "Please enter a valid email address".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut tx);

    let Some(profile) = repo.get_by_email(&email).await? else {
        return Ok(Json(InviteResponse {
            status: InviteStatus::Invitation,
            message: format!(
                "Send this link to {email}: {}/auth with role: {}",
                state.config.public_base(),
                request.role
            ),
        }));
    };

    if profile.agency_owner_id.is_some() {
        return Err(Error::Conflict {
            message: "This user is already part of a team.".to_string(),
        });
    }

    repo.set_agency_owner_id(profile.id, current_user.id).await?;
    repo.link_agency_owner(profile.id, current_user.id).await?;
    repo.add_role(profile.id, request.role).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(user_id = %profile.id, owner_id = %current_user.id, role = %request.role, "Added user to agency team");

    Ok(Json(InviteResponse {
        status: InviteStatus::Added,
        message: format!("{email} has been added to your team."),
    }))
}

/// Grant a team role to one of the caller's team members
#[utoipa::path(
    post,
    path = "/agency/team/{user_id}/roles/{role}",
    tag = "agency",
    summary = "Add team role",
    params(
        ("user_id" = uuid::Uuid, Path, description = "Team member ID"),
        ("role" = Role, Path, description = "team_member or team_manager"),
    ),
    responses(
        (status = 200, description = "Team member with updated roles", body = AgencyTeamMember),
        (status = 400, description = "Role is not a team role"),
        (status = 404, description = "User is not on the caller's team"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn add_team_role(
    State(state): State<AppState>,
    Path((user_id, role)): Path<(UserId, Role)>,
    current_user: RequiresPermission<resource::Agency, operation::UpdateOwn>,
) -> Result<Json<AgencyTeamMember>> {
    require_team_role(role)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);
    team_member(&mut repo, current_user.id, user_id).await?;

    repo.add_role(user_id, role).await?;
    let member = team_member(&mut repo, current_user.id, user_id).await?;

    Ok(Json(AgencyTeamMember::from(member)))
}

/// Revoke a team role from one of the caller's team members
#[utoipa::path(
    delete,
    path = "/agency/team/{user_id}/roles/{role}",
    tag = "agency",
    summary = "Remove team role",
    params(
        ("user_id" = uuid::Uuid, Path, description = "Team member ID"),
        ("role" = Role, Path, description = "team_member or team_manager"),
    ),
    responses(
        (status = 204, description = "Role removed"),
        (status = 400, description = "Role is not a team role"),
        (status = 404, description = "User is not on the caller's team"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn remove_team_role(
    State(state): State<AppState>,
    Path((user_id, role)): Path<(UserId, Role)>,
    current_user: RequiresPermission<resource::Agency, operation::DeleteOwn>,
) -> Result<StatusCode> {
    require_team_role(role)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);
    team_member(&mut repo, current_user.id, user_id).await?;

    repo.remove_role(user_id, role).await?;
    Ok(StatusCode::NO_CONTENT)
}
