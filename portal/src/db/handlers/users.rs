//! Database repository for profiles, roles and agency owner links.

use crate::types::{UserId, abbrev_uuid};
use crate::{
    api::models::users::Role,
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::users::{AgencyOwnerLink, ProfileCreateDBRequest, ProfileDBResponse, ProfileUpdateDBRequest},
    },
};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing profiles
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub skip: i64,
    pub limit: i64,
}

impl UserFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Profile {
    pub id: UserId,
    pub email: String,
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub agency_name: Option<String>,
    pub agency_city: Option<String>,
    pub agency_state: Option<String>,
    pub agency_owner_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<(Vec<Role>, Profile)> for ProfileDBResponse {
    fn from((roles, profile): (Vec<Role>, Profile)) -> Self {
        Self {
            id: profile.id,
            email: profile.email,
            password_hash: profile.password_hash,
            first_name: profile.first_name,
            last_name: profile.last_name,
            phone_number: profile.phone_number,
            agency_name: profile.agency_name,
            agency_city: profile.agency_city,
            agency_state: profile.agency_state,
            agency_owner_id: profile.agency_owner_id,
            roles,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = ProfileCreateDBRequest;
    type UpdateRequest = ProfileUpdateDBRequest;
    type Response = ProfileDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(email = %request.email), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let user_id = Uuid::new_v4();

        let mut tx = self.db.begin().await?;
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, email, password_hash, first_name, last_name, phone_number,
                                  agency_name, agency_city, agency_state)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&request.email)
        .bind(&request.password_hash)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.phone_number)
        .bind(&request.agency_name)
        .bind(&request.agency_city)
        .bind(&request.agency_state)
        .fetch_one(&mut *tx)
        .await?;

        let mut roles = request.roles.clone();
        roles.sort();
        roles.dedup();
        for role in &roles {
            sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
                .bind(user_id)
                .bind(role)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(ProfileDBResponse::from((roles, profile)))
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        match profile {
            Some(profile) => {
                let roles = self.roles_of(id).await?;
                Ok(Some(ProfileDBResponse::from((roles, profile))))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<UserId>) -> Result<HashMap<Self::Id, ProfileDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let profiles = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        let responses = self.attach_roles(profiles).await?;
        Ok(responses.into_iter().map(|p| (p.id, p)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let profiles = sqlx::query_as::<_, Profile>("SELECT * FROM profiles ORDER BY created_at DESC, id LIMIT $1 OFFSET $2")
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;

        self.attach_roles(profiles).await
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                phone_number = CASE WHEN $4::boolean THEN $5::text ELSE phone_number END,
                agency_name = COALESCE($6, agency_name),
                agency_city = COALESCE($7, agency_city),
                agency_state = COALESCE($8, agency_state),
                password_hash = COALESCE($9, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(request.phone_number.is_some())
        .bind(request.phone_number.clone().flatten())
        .bind(&request.agency_name)
        .bind(&request.agency_city)
        .bind(&request.agency_state)
        .bind(&request.password_hash)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        let roles = self.roles_of(id).await?;
        Ok(ProfileDBResponse::from((roles, profile)))
    }
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    async fn roles_of(&mut self, id: UserId) -> Result<Vec<Role>> {
        let roles = sqlx::query_scalar::<_, Role>("SELECT role FROM user_roles WHERE user_id = $1 ORDER BY role")
            .bind(id)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(roles)
    }

    /// Load roles for many profiles in one query, preserving the input order.
    async fn attach_roles(&mut self, profiles: Vec<Profile>) -> Result<Vec<ProfileDBResponse>> {
        let ids: Vec<UserId> = profiles.iter().map(|p| p.id).collect();
        let rows = sqlx::query_as::<_, (UserId, Role)>(
            "SELECT user_id, role FROM user_roles WHERE user_id = ANY($1) ORDER BY user_id, role",
        )
        .bind(&ids)
        .fetch_all(&mut *self.db)
        .await?;

        let mut roles: HashMap<UserId, Vec<Role>> = HashMap::new();
        for (user_id, role) in rows {
            roles.entry(user_id).or_default().push(role);
        }

        Ok(profiles
            .into_iter()
            .map(|p| {
                let user_roles = roles.remove(&p.id).unwrap_or_default();
                ProfileDBResponse::from((user_roles, p))
            })
            .collect())
    }

    /// Case-insensitive lookup by email address
    #[instrument(skip(self, email), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<ProfileDBResponse>> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE LOWER(email) = LOWER($1)")
            .bind(email.trim())
            .fetch_optional(&mut *self.db)
            .await?;

        match profile {
            Some(profile) => {
                let roles = self.roles_of(profile.id).await?;
                Ok(Some(ProfileDBResponse::from((roles, profile))))
            }
            None => Ok(None),
        }
    }

    /// Every profile, newest first
    #[instrument(skip(self), err)]
    pub async fn list_all(&mut self) -> Result<Vec<ProfileDBResponse>> {
        let profiles = sqlx::query_as::<_, Profile>("SELECT * FROM profiles ORDER BY created_at DESC, id")
            .fetch_all(&mut *self.db)
            .await?;

        self.attach_roles(profiles).await
    }

    /// Profiles holding a role, ordered by first name
    #[instrument(skip(self), fields(role = %role), err)]
    pub async fn list_by_role(&mut self, role: Role) -> Result<Vec<ProfileDBResponse>> {
        let profiles = sqlx::query_as::<_, Profile>(
            r#"
            SELECT p.* FROM profiles p
            JOIN user_roles r ON r.user_id = p.id
            WHERE r.role = $1
            ORDER BY p.first_name NULLS LAST, p.email
            "#,
        )
        .bind(role)
        .fetch_all(&mut *self.db)
        .await?;

        self.attach_roles(profiles).await
    }

    /// Grant a role. Returns false when the user already held it.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), role = %role), err)]
    pub async fn add_role(&mut self, user_id: UserId, role: Role) -> Result<bool> {
        let result = sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .bind(role)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revoke exactly one role. Returns false when the user did not hold it.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), role = %role), err)]
    pub async fn remove_role(&mut self, user_id: UserId, role: Role) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role = $2")
            .bind(user_id)
            .bind(role)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace every agency owner link of a user
    #[instrument(skip(self, owner_ids), fields(user_id = %abbrev_uuid(&user_id), count = owner_ids.len()), err)]
    pub async fn set_agency_owners(&mut self, user_id: UserId, owner_ids: &[UserId]) -> Result<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM team_agency_owners WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for owner_id in owner_ids {
            sqlx::query("INSERT INTO team_agency_owners (user_id, agency_owner_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(user_id)
                .bind(owner_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Add one agency owner link, ignoring duplicates
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), owner_id = %abbrev_uuid(&owner_id)), err)]
    pub async fn link_agency_owner(&mut self, user_id: UserId, owner_id: UserId) -> Result<()> {
        sqlx::query("INSERT INTO team_agency_owners (user_id, agency_owner_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .bind(owner_id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    /// Agency owner links of the given users, with the owners' names
    #[instrument(skip(self, user_ids), fields(count = user_ids.len()), err)]
    pub async fn agency_owner_links(&mut self, user_ids: &[UserId]) -> Result<Vec<AgencyOwnerLink>> {
        let links = sqlx::query_as::<_, AgencyOwnerLink>(
            r#"
            SELECT t.user_id, t.agency_owner_id, o.email, o.first_name, o.last_name
            FROM team_agency_owners t
            JOIN profiles o ON o.id = t.agency_owner_id
            WHERE t.user_id = ANY($1)
            ORDER BY t.user_id, o.first_name NULLS LAST, o.email
            "#,
        )
        .bind(user_ids)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(links)
    }

    /// Agency owners a user is linked to
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn linked_owner_ids(&mut self, user_id: UserId) -> Result<Vec<UserId>> {
        let ids = sqlx::query_scalar::<_, UserId>("SELECT agency_owner_id FROM team_agency_owners WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(ids)
    }

    /// Profiles linked to any of the given agency owners, newest first
    #[instrument(skip(self, owner_ids), fields(count = owner_ids.len()), err)]
    pub async fn list_linked_to_owners(&mut self, owner_ids: &[UserId]) -> Result<Vec<ProfileDBResponse>> {
        if owner_ids.is_empty() {
            return Ok(Vec::new());
        }

        let profiles = sqlx::query_as::<_, Profile>(
            r#"
            SELECT p.* FROM profiles p
            WHERE p.id IN (SELECT user_id FROM team_agency_owners WHERE agency_owner_id = ANY($1))
            ORDER BY p.created_at DESC, p.id
            "#,
        )
        .bind(owner_ids)
        .fetch_all(&mut *self.db)
        .await?;

        self.attach_roles(profiles).await
    }

    /// Set the single-owner link used by agency self-service
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), owner_id = %abbrev_uuid(&owner_id)), err)]
    pub async fn set_agency_owner_id(&mut self, user_id: UserId, owner_id: UserId) -> Result<()> {
        let result = sqlx::query("UPDATE profiles SET agency_owner_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(owner_id)
            .execute(&mut *self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Profiles whose single-owner link points at `owner_id`, newest first
    #[instrument(skip(self), fields(owner_id = %abbrev_uuid(&owner_id)), err)]
    pub async fn list_by_agency_owner_id(&mut self, owner_id: UserId) -> Result<Vec<ProfileDBResponse>> {
        let profiles = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE agency_owner_id = $1 ORDER BY created_at DESC, id")
            .bind(owner_id)
            .fetch_all(&mut *self.db)
            .await?;

        self.attach_roles(profiles).await
    }
}
