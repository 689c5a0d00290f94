//! Common type definitions and permission system types.
//!
//! This module defines:
//! - Type aliases for entity IDs (UserId, CourseId, etc.)
//! - Resource and operation enums for access control
//!
//! # Permission System
//!
//! The permission system is based on three core types:
//!
//! - [`Resource`]: What entity type is being accessed (Courses, Users, Team, etc.)
//! - [`Operation`]: What action is being performed (Read, Create, Update, Delete)
//! - [`Permission`]: Authorization requirement combining resource and operation
//!
//! Operations come in two flavors:
//! - **All**: Unrestricted access to all entities (e.g., `ReadAll`, `DeleteAll`)
//! - **Own**: Restricted to the caller's own entities (e.g., `ReadOwn`, `UpdateOwn`)
//!
//! Which roles hold which permissions lives in [`crate::auth::permissions`].

use std::fmt;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type CourseId = Uuid;
pub type ModuleId = Uuid;
pub type LessonId = Uuid;
pub type EventId = Uuid;
pub type DocumentId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

// Operations that can be performed on resources
// *-All means unrestricted access, *-Own means restricted to own resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateAll,
    CreateOwn,
    ReadAll,
    ReadOwn,
    UpdateAll,
    UpdateOwn,
    DeleteAll,
    DeleteOwn,
}

// Resources that can be operated on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Users,
    Roles,
    AgencyOwners,
    Agency,
    Team,
    Courses,
    Modules,
    Lessons,
    Progress,
    Enrollments,
    Events,
    Documents,
    Dashboard,
    SalesMetrics,
    Leaderboard,
    Uploads,
}

// Permission types for authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Simple permission: (Resource, Operation)
    Allow(Resource, Operation),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateAll | Operation::CreateOwn => write!(f, "Create"),
            Operation::ReadAll | Operation::ReadOwn => write!(f, "Read"),
            Operation::UpdateAll | Operation::UpdateOwn => write!(f, "Update"),
            Operation::DeleteAll | Operation::DeleteOwn => write!(f, "Delete"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Users => "users",
            Resource::Roles => "roles",
            Resource::AgencyOwners => "agency owners",
            Resource::Agency => "agency",
            Resource::Team => "team",
            Resource::Courses => "courses",
            Resource::Modules => "modules",
            Resource::Lessons => "lessons",
            Resource::Progress => "progress",
            Resource::Enrollments => "enrollments",
            Resource::Events => "events",
            Resource::Documents => "documents",
            Resource::Dashboard => "dashboard",
            Resource::SalesMetrics => "sales metrics",
            Resource::Leaderboard => "leaderboard",
            Resource::Uploads => "uploads",
        };
        f.write_str(name)
    }
}
