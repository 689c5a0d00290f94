//! Database models for profiles.

use crate::api::models::users::Role;
use crate::types::UserId;
use chrono::{DateTime, Utc};

/// Database request for creating a new profile
#[derive(Debug, Clone, Default)]
pub struct ProfileCreateDBRequest {
    pub email: String,
    /// None for profiles that cannot sign in until a password is set
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Raw digits
    pub phone_number: Option<String>,
    pub agency_name: Option<String>,
    pub agency_city: Option<String>,
    pub agency_state: Option<String>,
    pub roles: Vec<Role>,
}

/// Database request for updating profile fields.
///
/// `None` leaves a column alone. `phone_number: Some(None)` clears the stored number.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdateDBRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<Option<String>>,
    pub agency_name: Option<String>,
    pub agency_city: Option<String>,
    pub agency_state: Option<String>,
    pub password_hash: Option<String>,
}

/// Database response for a profile with its roles
#[derive(Debug, Clone)]
pub struct ProfileDBResponse {
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
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One `team_agency_owners` link, with the owner's name columns for display
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AgencyOwnerLink {
    pub user_id: UserId,
    pub agency_owner_id: UserId,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}
