//! Database record models matching table schemas.
//!
//! Each `*DBResponse` struct mirrors a table row (or a row joined with the few columns a view
//! needs) and derives `sqlx::FromRow`. `*DBRequest` structs carry validated input for inserts and
//! partial updates. API models in [`crate::api::models`] convert from these with `From` impls, so
//! storage and wire formats can evolve independently.
//!
//! - [`users`]: profiles, roles and agency owner links
//! - [`courses`]: courses, modules, lessons, lesson progress and enrollments
//! - [`events`]: calendar events
//! - [`documents`]: document library entries
//! - [`sales_metrics`]: monthly sales counters and leaderboard rows

pub mod courses;
pub mod documents;
pub mod events;
pub mod sales_metrics;
pub mod users;
