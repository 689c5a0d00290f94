//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut PgConnection` (a pooled connection or an open
//! transaction) and runs parameterized SQL for one entity. Repositories with a
//! CRUD shape implement [`Repository`]; entity-specific operations such as
//! reordering, role links or progress toggles are inherent methods.
//!
//! # Available Repositories
//!
//! - [`Users`]: profiles, roles and agency-owner links
//! - [`Courses`], [`Modules`], [`Lessons`]: course content and ordering
//! - [`Progress`]: lesson completion and course enrollments
//! - [`Events`]: the events calendar
//! - [`Documents`]: the document library
//! - [`SalesMetrics`]: monthly sales counters and leaderboard rows
//!
//! ```ignore
//! use portal::db::handlers::{Courses, Repository};
//!
//! let mut tx = pool.begin().await?;
//! let course = Courses::new(&mut tx).create(&request).await?;
//! tx.commit().await?;
//! ```

pub mod courses;
pub mod documents;
pub mod events;
pub mod lessons;
pub mod modules;
pub mod progress;
pub mod repository;
pub mod sales_metrics;
pub mod users;

pub use courses::Courses;
pub use documents::Documents;
pub use events::Events;
pub use lessons::Lessons;
pub use modules::Modules;
pub use progress::Progress;
pub use repository::Repository;
pub use sales_metrics::SalesMetrics;
pub use users::Users;
