//! Authentication and authorization.
//!
//! # Authentication
//!
//! Native email/password accounts only:
//! - Users sign up via `/authentication/register` (when enabled) or are created by an administrator
//! - Users log in via `/authentication/login` and receive an HS256 JWT
//! - The token is set as an HTTP-only session cookie and returned in the response body, so
//!   non-browser clients can send it as `Authorization: Bearer <token>`
//!
//! The [`CurrentUser`](crate::api::models::users::CurrentUser) extractor verifies the token and
//! reloads the profile and its roles from the database on every request.
//!
//! # Authorization
//!
//! Roles grant permissions on resources, see [`permissions`]. Handlers declare requirements with
//! [`permissions::RequiresPermission`] or check them inline with [`permissions::has_permission`].
//!
//! # Modules
//!
//! - [`current_user`]: Extractor for the authenticated user
//! - [`password`]: Password hashing and verification using Argon2
//! - [`permissions`]: Role grants and the permission extractor
//! - [`session`]: JWT session tokens
//! - [`utils`]: Cookie and name helpers

pub mod current_user;
pub mod password;
pub mod permissions;
pub mod session;
pub mod utils;
