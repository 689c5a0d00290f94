//! API request and response data models.
//!
//! API models are distinct from the database records in [`crate::db::models`]; each response type
//! has a `From` conversion from its record. Everything here derives `utoipa` schemas for the
//! generated OpenAPI document.
//!
//! - [`users`]: profiles, roles, the admin directory and agency owners
//! - [`agency`]: agency team invitations and team progress
//! - [`courses`]: courses, modules, lessons, playback and progress
//! - [`events`], [`documents`], [`dashboard`]
//! - [`sales`]: monthly metrics and the leaderboard
//! - [`auth`]: sign-up, sign-in and sign-out payloads

pub mod agency;
pub mod auth;
pub mod courses;
pub mod dashboard;
pub mod documents;
pub mod events;
pub mod pagination;
pub mod sales;
pub mod users;
