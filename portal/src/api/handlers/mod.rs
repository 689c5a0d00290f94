//! HTTP request handlers for all API endpoints.
//!
//! This module contains Axum route handlers organized by resource type.
//! Each handler is responsible for:
//! - Request validation and deserialization
//! - Authentication and authorization checks
//! - Business logic execution via database repositories
//! - Response serialization
//!
//! # Handler Modules
//!
//! - [`auth`]: Registration, login and logout
//! - [`users`]: Current user profile, the admin directory, roles and agency owners
//! - [`agency`]: Agency-owner team, invitations and team roles
//! - [`team`]: Team progress for owners, managers and administrators
//! - [`courses`], [`modules`], [`lessons`]: Course content, ordering, video and completion
//! - [`events`], [`documents`], [`dashboard`]
//! - [`sales`]: Monthly sales metrics and the leaderboard
//! - [`storage`]: Signed downloads of stored objects
//!
//! # Authentication
//!
//! Handlers authenticate through the [`crate::api::models::users::CurrentUser`] extractor, or
//! through [`crate::auth::permissions::RequiresPermission`] when a permission check is needed.
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which converts to the matching HTTP status with a
//! user-facing message body.

pub mod agency;
pub mod auth;
pub mod courses;
pub mod dashboard;
pub mod documents;
pub mod events;
pub mod lessons;
pub mod modules;
pub mod sales;
pub mod storage;
pub mod team;
pub mod users;

use crate::errors::{Error, Result};

/// Trim a title and reject it when blank
pub(crate) fn required_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::BadRequest {
            message: "Title is required".to_string(),
        });
    }
    Ok(title.to_string())
}

/// Like [`required_title`], for optional patches
pub(crate) fn optional_title(title: Option<String>) -> Result<Option<String>> {
    title.as_deref().map(required_title).transpose()
}
