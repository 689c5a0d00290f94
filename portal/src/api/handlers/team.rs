use std::collections::HashMap;

use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::{
        agency::{TeamEnrollment, TeamMemberProgress},
        users::{CurrentUser, Role},
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{Progress, Users},
        models::users::ProfileDBResponse,
    },
    errors::{Error, Result},
    types::{Operation, Permission, Resource, UserId},
};

/// Profiles the caller may see, by role precedence: administrator, then agency owner, then team manager.
async fn visible_profiles(repo: &mut Users<'_>, user: &CurrentUser) -> Result<Vec<ProfileDBResponse>> {
    if user.is_admin() {
        return Ok(repo.list_all().await?);
    }
    if user.has_role(Role::AgencyOwner) {
        return Ok(repo.list_linked_to_owners(&[user.id]).await?);
    }
    if user.has_role(Role::TeamManager) {
        let owner_ids = repo.linked_owner_ids(user.id).await?;
        return Ok(repo.list_linked_to_owners(&owner_ids).await?);
    }

    Err(Error::InsufficientPermissions {
        required: Permission::Allow(Resource::Team, Operation::ReadOwn),
        action: Operation::ReadOwn,
        resource: Resource::Team.to_string(),
    })
}

/// Team members with their course enrollments
#[utoipa::path(
    get,
    path = "/team",
    tag = "team",
    summary = "Team progress",
    responses(
        (status = 200, description = "Visible team members and their enrollments", body = Vec<TeamMemberProgress>),
        (status = 403, description = "Caller has no team visibility"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn team_progress(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Team, operation::ReadOwn>,
) -> Result<Json<Vec<TeamMemberProgress>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let profiles = visible_profiles(&mut Users::new(&mut conn), &current_user).await?;
    let ids: Vec<UserId> = profiles.iter().map(|p| p.id).collect();
    let rows = Progress::new(&mut conn).enrollments_for_users(&ids).await?;

    let mut enrollments: HashMap<UserId, Vec<TeamEnrollment>> = HashMap::new();
    for row in rows {
        enrollments.entry(row.user_id).or_default().push(TeamEnrollment::from(row));
    }

    let members = profiles
        .into_iter()
        .map(|profile| TeamMemberProgress {
            enrollments: enrollments.remove(&profile.id).unwrap_or_default(),
            id: profile.id,
            first_name: profile.first_name,
            last_name: profile.last_name,
            email: profile.email,
        })
        .collect();

    Ok(Json(members))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Courses, Repository};
    use crate::db::models::courses::CourseCreateDBRequest;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_team_visibility_follows_role_precedence(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let owner = create_test_user(&pool, Role::AgencyOwner).await;
        let other_owner = create_test_user(&pool, Role::AgencyOwner).await;
        let manager = create_test_user(&pool, Role::TeamManager).await;
        let member = create_test_user(&pool, Role::TeamMember).await;
        let outsider = create_test_user(&pool, Role::TeamMember).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut users = Users::new(&mut conn);
        users.link_agency_owner(manager.id, owner.id).await.unwrap();
        users.link_agency_owner(member.id, owner.id).await.unwrap();
        users.link_agency_owner(outsider.id, other_owner.id).await.unwrap();

        let course = Courses::new(&mut conn)
            .create(&CourseCreateDBRequest {
                title: "Onboarding".to_string(),
                description: None,
                thumbnail_url: None,
            })
            .await
            .unwrap();
        Progress::new(&mut conn).enroll(member.id, course.id).await.unwrap();

        let ids_for = |body: &Vec<TeamMemberProgress>| {
            let mut ids: Vec<UserId> = body.iter().map(|m| m.id).collect();
            ids.sort();
            ids
        };
        let mut expected = vec![manager.id, member.id];
        expected.sort();

        // Owner sees users linked to them
        let auth = add_auth_headers(&owner);
        let response = app.get("/admin/api/v1/team").add_header(&auth[0].0, &auth[0].1).await;
        response.assert_status_ok();
        let body: Vec<TeamMemberProgress> = response.json();
        assert_eq!(ids_for(&body), expected);
        let enrolled = body.iter().find(|m| m.id == member.id).unwrap();
        assert_eq!(enrolled.enrollments.len(), 1);
        assert_eq!(enrolled.enrollments[0].course_title, "Onboarding");
        assert_eq!(enrolled.enrollments[0].progress, 0);

        // Manager sees everyone linked to their owners, including themselves
        let auth = add_auth_headers(&manager);
        let response = app.get("/admin/api/v1/team").add_header(&auth[0].0, &auth[0].1).await;
        let body: Vec<TeamMemberProgress> = response.json();
        assert_eq!(ids_for(&body), expected);

        // Admin sees everyone
        let admin = create_test_admin(&pool).await;
        let auth = add_auth_headers(&admin);
        let response = app.get("/admin/api/v1/team").add_header(&auth[0].0, &auth[0].1).await;
        let body: Vec<TeamMemberProgress> = response.json();
        assert!(body.iter().any(|m| m.id == outsider.id));

        // Plain members are refused
        let auth = add_auth_headers(&member);
        app.get("/admin/api/v1/team")
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
}
