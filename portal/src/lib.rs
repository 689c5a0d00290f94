//! # portal: membership portal service
//!
//! `portal` is the backend for an insurance agency network's member portal. It serves a learning
//! catalogue (courses made of modules and lessons, with per-user progress), a document library, an
//! events calendar, a monthly sales tracker with a rolling leaderboard, and the agency hierarchy
//! that ties team members to the agency owners they work for.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses PostgreSQL for all persistence. Uploaded lesson videos are written to a local object store
//! and handed out through short-lived signed URLs.
//!
//! ### Request Flow
//!
//! Everything under `/admin/api/v1/*` follows the same path. The [`CurrentUser`] extractor reads
//! a session JWT (from the `Authorization: Bearer` header, else the session cookie), reloads the
//! profile and its roles, and the [`RequiresPermission`] extractor checks the roles against the
//! route's resource and operation. Handlers then talk to the database through the repositories in
//! [`db::handlers`].
//!
//! Two surfaces sit outside that flow: `/authentication/*` for sign-up and sign-in, and
//! `/storage/{bucket}/{*path}`, where a valid signed URL is the only credential.
//!
//! [`CurrentUser`]: api::models::users::CurrentUser
//! [`RequiresPermission`]: auth::permissions::RequiresPermission
//!
//! ### Core Components
//!
//! - **API layer** ([`api`]): handlers and request/response models
//! - **Authentication** ([`auth`]): passwords, sessions, role permissions
//! - **Database** ([`db`]): one repository per entity over a borrowed connection
//! - **Domain helpers**: [`ordering`] (drag-and-drop reorder), [`progress`] (completion
//!   percentages), [`leaderboard`] (rolling window aggregation), [`directory`] (admin user
//!   search), [`phone`] and [`video`] (input normalization)
//! - **Object storage** ([`storage`]): bucketed files and URL signing
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use portal::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = portal::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     portal::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! Migrations run automatically on startup:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::migrate::MigrateError> {
//! portal::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod directory;
pub mod errors;
pub mod leaderboard;
mod openapi;
pub mod ordering;
pub mod phone;
pub mod progress;
pub mod storage;
pub mod telemetry;
pub mod types;
pub mod video;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::{
    api::models::users::Role,
    auth::password,
    config::CorsOrigin,
    db::{
        handlers::{Repository, Users},
        models::users::{ProfileCreateDBRequest, ProfileUpdateDBRequest},
    },
    openapi::ApiDoc,
    storage::{FileStorage, LocalFileStorage},
};
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue},
    routing::{get, patch, post, put},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::UserId;

/// Headroom over `storage.max_video_size` for multipart framing, so oversized files reach the
/// handler and get its error message instead of a bare 413.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .storage(Arc::new(LocalFileStorage::new(root)))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub storage: Arc<dyn FileStorage>,
}

/// Get the portal database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial administrator if it doesn't exist.
///
/// Idempotent: an existing account keeps its profile, has its password replaced when one is
/// configured, and is granted the administrator role if it lacks it.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(email: &str, password: Option<&str>, db: &PgPool) -> anyhow::Result<UserId> {
    let password_hash = password.map(password::hash_string).transpose()?;

    let mut tx = db.begin().await?;
    let mut users = Users::new(&mut tx);

    let user_id = match users.get_by_email(email).await? {
        Some(existing) => {
            if password_hash.is_some() {
                users
                    .update(
                        existing.id,
                        &ProfileUpdateDBRequest {
                            password_hash,
                            ..Default::default()
                        },
                    )
                    .await?;
            }
            users.add_role(existing.id, Role::Administrator).await?;
            existing.id
        }
        None => {
            let created = users
                .create(&ProfileCreateDBRequest {
                    email: email.to_string(),
                    password_hash,
                    roles: vec![Role::Administrator],
                    ..Default::default()
                })
                .await?;
            info!("Created initial administrator {}", email);
            created.id
        }
    };

    tx.commit().await?;
    Ok(user_id)
}

/// Connect, run migrations and make sure the administrator exists
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let pool_settings = &config.database.pool;
    let pool = PgPoolOptions::new()
        .max_connections(pool_settings.max_connections)
        .min_connections(pool_settings.min_connections)
        .acquire_timeout(pool_settings.acquire_timeout)
        .idle_timeout(pool_settings.idle_timeout)
        .connect(&config.database.url)
        .await?;

    migrator().run(&pool).await?;

    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.auth.security.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(config.auth.security.cors.allow_credentials)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PUT,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .expose_headers(vec![http::header::LOCATION]);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the main application router: authentication, the `/admin/api/v1` API, signed storage
/// downloads, API docs, and the CORS and tracing layers.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    use api::handlers::{agency, auth, courses, dashboard, documents, events, lessons, modules, sales, storage, team, users};

    let auth_routes = Router::new()
        .route(
            "/authentication/register",
            get(auth::get_registration_info).post(auth::register),
        )
        .route("/authentication/login", get(auth::get_login_info).post(auth::login))
        .route("/authentication/logout", post(auth::logout))
        .with_state(state.clone());

    // Video upload gets its own body ceiling; every other route keeps the default
    let upload_limit = state.config.storage.max_video_size.saturating_add(MULTIPART_OVERHEAD);
    let upload_routes = Router::new().route(
        "/lessons/{lesson_id}/video",
        post(lessons::upload_lesson_video)
            .delete(lessons::remove_lesson_video)
            .layer(DefaultBodyLimit::max(usize::try_from(upload_limit).unwrap_or(usize::MAX))),
    );

    let api_routes = Router::new()
        // Users and roles
        .route("/users/current", get(users::get_current_user).patch(users::update_current_user))
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/{user_id}", patch(users::update_user).delete(users::delete_user))
        .route("/users/{user_id}/roles/{role}", post(users::add_role).delete(users::remove_role))
        .route("/users/{user_id}/agency-owners", put(users::set_agency_owners))
        .route(
            "/agency-owners",
            get(users::list_agency_owners).post(users::create_agency_owner),
        )
        // An agency owner's own team
        .route("/agency/team", get(agency::list_team))
        .route("/agency/invitations", post(agency::invite))
        .route(
            "/agency/team/{user_id}/roles/{role}",
            post(agency::add_team_role).delete(agency::remove_team_role),
        )
        .route("/team", get(team::team_progress))
        // Courses
        .route("/courses", get(courses::list_courses).post(courses::create_course))
        .route("/courses/all", get(courses::list_all_courses))
        .route("/courses/reorder", post(courses::reorder_courses))
        .route(
            "/courses/{course_id}",
            get(courses::get_course)
                .patch(courses::update_course)
                .delete(courses::delete_course),
        )
        .route("/courses/{course_id}/content", get(courses::get_course_content))
        .route("/courses/{course_id}/enrollment", post(courses::enroll))
        .route("/courses/{course_id}/modules", post(modules::create_module))
        .route("/courses/{course_id}/modules/reorder", post(modules::reorder_modules))
        // Modules and lessons
        .route("/modules/{module_id}", patch(modules::update_module).delete(modules::delete_module))
        .route("/modules/{module_id}/lessons", post(lessons::create_lesson))
        .route("/modules/{module_id}/lessons/blank", post(lessons::create_blank_lesson))
        .route("/modules/{module_id}/lessons/reorder", post(lessons::reorder_lessons))
        .route(
            "/lessons/{lesson_id}",
            get(lessons::get_lesson)
                .patch(lessons::update_lesson)
                .delete(lessons::delete_lesson),
        )
        .route("/lessons/{lesson_id}/content", put(lessons::update_lesson_content))
        .route("/lessons/{lesson_id}/title", put(lessons::update_lesson_title))
        .route("/lessons/{lesson_id}/playback", get(lessons::get_playback))
        .route("/lessons/{lesson_id}/completion", post(lessons::toggle_completion))
        .merge(upload_routes)
        // Events and documents
        .route("/events", get(events::list_events).post(events::create_event))
        .route("/events/all", get(events::list_all_events))
        .route("/events/{event_id}", patch(events::update_event).delete(events::delete_event))
        .route(
            "/documents",
            get(documents::list_documents).post(documents::create_document),
        )
        .route(
            "/documents/{document_id}",
            patch(documents::update_document).delete(documents::delete_document),
        )
        // Dashboard and sales
        .route("/dashboard", get(dashboard::get_dashboard))
        .route("/sales-metrics", get(sales::my_history))
        .route("/sales-metrics/current", put(sales::submit_current_month))
        .route("/leaderboard", get(sales::get_leaderboard))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/storage/{bucket}/{*path}", get(storage::download))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .with_state(state.clone())
        .merge(auth_routes)
        .nest("/admin/api/v1", api_routes)
        .merge(Scalar::with_url("/admin/docs", ApiDoc::openapi()));

    let mut router = router.layer(create_cors_layer(&state.config)?);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Connect to the configured database and build the application
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting portal with configuration: {:#?}", config);
        let pool = setup_database(&config).await?;
        Self::new_with_pool(config, pool).await
    }

    /// Build the application on an existing pool. Migrations are assumed to have run.
    pub async fn new_with_pool(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        create_initial_admin_user(&config.admin_email, config.admin_password.as_deref(), &pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {}", e))?;

        let storage = Arc::new(LocalFileStorage::new(config.storage.root_dir.clone()));
        let app_state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .storage(storage)
            .build();

        let router = build_router(&app_state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Portal listening on http://{}, available at {}",
            bind_addr,
            self.config.public_base()
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::create_initial_admin_user;
    use crate::{
        api::models::users::Role,
        auth::password,
        db::handlers::{Repository, Users},
        test_utils::*,
    };
    use axum::http::StatusCode;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_initial_admin_is_idempotent(pool: PgPool) {
        let first = create_initial_admin_user("boss@example.com", None, &pool).await.unwrap();
        let second = create_initial_admin_user("boss@example.com", Some("new-password"), &pool)
            .await
            .unwrap();
        assert_eq!(first, second);

        let mut conn = pool.acquire().await.unwrap();
        let admin = Users::new(&mut conn).get_by_id(first).await.unwrap().unwrap();
        assert_eq!(admin.roles, vec![Role::Administrator]);
        let hash = admin.password_hash.expect("password set on second call");
        assert!(password::verify_string("new-password", &hash).unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_existing_account_promoted_to_admin(pool: PgPool) {
        let member = create_test_user(&pool, Role::TeamMember).await;
        create_initial_admin_user(&member.email, None, &pool).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let promoted = Users::new(&mut conn).get_by_id(member.id).await.unwrap().unwrap();
        assert_eq!(promoted.roles, vec![Role::TeamMember, Role::Administrator]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_health_and_docs_are_public(pool: PgPool) {
        let app = create_test_app(pool).await;

        let response = app.get("/healthz").await;
        response.assert_status_ok();
        assert_eq!(response.text(), "OK");

        let response = app.get("/api-docs/openapi.json").await;
        response.assert_status_ok();
        let doc: serde_json::Value = response.json();
        assert!(doc["paths"]["/courses"].is_object());

        app.get("/admin/api/v1/courses").await.assert_status(StatusCode::UNAUTHORIZED);
    }
}
