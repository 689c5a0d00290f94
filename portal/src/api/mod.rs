//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! Authentication (`/authentication/*`: registration, login, logout) is served at the root. The
//! rest lives under `/admin/api/v1`:
//!
//! - **Users** (`/users/*`, `/agency-owners`): Directory, roles and agency owner links
//! - **Agency** (`/agency/*`, `/team`): Agency self-service and team progress
//! - **Courses** (`/courses/*`, `/modules/*`, `/lessons/*`): The learning catalogue
//! - **Events and documents** (`/events/*`, `/documents/*`)
//! - **Sales** (`/sales-metrics/*`, `/leaderboard`)
//!
//! Signed object downloads live outside the API prefix at `/storage/{bucket}/{*path}`.
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`.
//! API documentation is available at `/admin/docs` when the server is running.

pub mod handlers;
pub mod models;
