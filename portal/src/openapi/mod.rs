//! OpenAPI documentation for the portal API at `/admin/api/v1/*`.
//!
//! The document is served as JSON at `/api-docs/openapi.json` and rendered at `/admin/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api::{handlers, models};

/// Bearer token and session cookie, both carrying the same JWT.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token returned by `/authentication/login`:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
            components.security_schemes.insert(
                "CookieAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("portal_session"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Portal API",
        description = "Courses, documents, events, sales leaderboard and agency teams for portal members."
    ),
    servers((url = "/admin/api/v1")),
    paths(
        handlers::auth::get_registration_info,
        handlers::auth::register,
        handlers::auth::get_login_info,
        handlers::auth::login,
        handlers::auth::logout,
        handlers::users::get_current_user,
        handlers::users::update_current_user,
        handlers::users::list_users,
        handlers::users::create_user,
        handlers::users::update_user,
        handlers::users::delete_user,
        handlers::users::add_role,
        handlers::users::remove_role,
        handlers::users::set_agency_owners,
        handlers::users::list_agency_owners,
        handlers::users::create_agency_owner,
        handlers::agency::list_team,
        handlers::agency::invite,
        handlers::agency::add_team_role,
        handlers::agency::remove_team_role,
        handlers::team::team_progress,
        handlers::courses::list_courses,
        handlers::courses::list_all_courses,
        handlers::courses::get_course,
        handlers::courses::create_course,
        handlers::courses::update_course,
        handlers::courses::delete_course,
        handlers::courses::reorder_courses,
        handlers::courses::get_course_content,
        handlers::courses::enroll,
        handlers::modules::create_module,
        handlers::modules::update_module,
        handlers::modules::delete_module,
        handlers::modules::reorder_modules,
        handlers::lessons::create_lesson,
        handlers::lessons::create_blank_lesson,
        handlers::lessons::reorder_lessons,
        handlers::lessons::get_lesson,
        handlers::lessons::update_lesson,
        handlers::lessons::update_lesson_content,
        handlers::lessons::update_lesson_title,
        handlers::lessons::delete_lesson,
        handlers::lessons::upload_lesson_video,
        handlers::lessons::remove_lesson_video,
        handlers::lessons::get_playback,
        handlers::lessons::toggle_completion,
        handlers::events::list_events,
        handlers::events::list_all_events,
        handlers::events::create_event,
        handlers::events::update_event,
        handlers::events::delete_event,
        handlers::documents::list_documents,
        handlers::documents::create_document,
        handlers::documents::update_document,
        handlers::documents::delete_document,
        handlers::dashboard::get_dashboard,
        handlers::sales::my_history,
        handlers::sales::submit_current_month,
        handlers::sales::get_leaderboard,
        handlers::storage::download,
    ),
    components(schemas(
        models::auth::RegistrationInfo,
        models::auth::LoginInfo,
        models::auth::RegisterRequest,
        models::auth::LoginRequest,
        models::auth::AuthResponse,
        models::auth::AuthSuccessResponse,
        models::users::Role,
        models::users::CurrentUser,
        models::users::AgencyOwnerRef,
        models::users::UserResponse,
        models::users::UserCreate,
        models::users::ProfileUpdate,
        models::users::AgencyOwnersUpdate,
        models::users::UserDirectoryResponse,
        models::users::AgencyOwnerResponse,
        models::users::AgencyOwnerCreate,
        models::agency::InviteRequest,
        models::agency::InviteStatus,
        models::agency::InviteResponse,
        models::agency::AgencyTeamMember,
        models::agency::TeamEnrollment,
        models::agency::TeamMemberProgress,
        models::courses::CourseCreate,
        models::courses::CourseUpdate,
        models::courses::CourseResponse,
        models::courses::ModuleCreate,
        models::courses::ModuleUpdate,
        models::courses::ModuleResponse,
        models::courses::LessonCreate,
        models::courses::LessonUpdate,
        models::courses::LessonContentUpdate,
        models::courses::LessonTitleUpdate,
        models::courses::LessonResponse,
        models::courses::ModuleWithLessons,
        models::courses::CourseContentResponse,
        models::courses::PlaybackSource,
        models::courses::PlaybackResponse,
        models::courses::CompletionResponse,
        models::courses::EnrollmentResponse,
        models::courses::ReorderRequest,
        models::events::EventCreate,
        models::events::EventUpdate,
        models::events::EventResponse,
        models::documents::DocumentCreate,
        models::documents::DocumentUpdate,
        models::documents::DocumentResponse,
        models::dashboard::DashboardResponse,
        models::sales::SalesMetricsSubmit,
        models::sales::SalesMetricsResponse,
        models::sales::LeaderboardEntry,
        crate::directory::SortField,
        crate::directory::SortOrder,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "authentication", description = "Sign-up, sign-in and sign-out"),
        (name = "users", description = "Profiles, roles, agency owners and the admin user directory"),
        (name = "agency", description = "An agency owner's own team"),
        (name = "team", description = "Course progress across a team"),
        (name = "courses", description = "Courses and enrollment"),
        (name = "modules", description = "Course modules"),
        (name = "lessons", description = "Lessons, videos and completion"),
        (name = "events", description = "Events calendar"),
        (name = "documents", description = "Document library"),
        (name = "dashboard", description = "Landing page summary"),
        (name = "sales", description = "Monthly sales metrics and the leaderboard"),
        (name = "storage", description = "Signed object downloads"),
    )
)]
pub struct ApiDoc;
