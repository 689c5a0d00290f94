//! Test utilities for integration testing (available with `test-utils` feature).

use crate::{
    AppState,
    api::models::users::{CurrentUser, Role},
    auth::session::create_session_token,
    config::{Config, PasswordConfig},
    db::{
        handlers::{Repository, Users},
        models::users::ProfileCreateDBRequest,
    },
    storage::LocalFileStorage,
};
use axum_test::TestServer;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub fn create_test_config() -> Config {
    // Each test gets its own object store
    let storage_root = std::env::temp_dir().join(format!("portal-test-storage-{}", Uuid::new_v4().simple()));

    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        admin_email: "admin@test.com".to_string(),
        admin_password: None,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        ..Default::default()
    };
    config.auth.native.enabled = true;
    config.auth.native.session.cookie_secure = false;
    // Cheap hashing keeps password tests fast
    config.auth.native.password = PasswordConfig {
        argon2_memory_kib: 1024,
        argon2_iterations: 1,
        ..Default::default()
    };
    config.storage.root_dir = storage_root;
    config
}

pub fn create_test_state(pool: PgPool) -> AppState {
    create_test_state_with_config(pool, create_test_config())
}

pub fn create_test_state_with_config(pool: PgPool, config: Config) -> AppState {
    let storage = Arc::new(LocalFileStorage::new(config.storage.root_dir.clone()));
    AppState::builder().db(pool).config(config).storage(storage).build()
}

pub fn create_test_app_for_state(state: AppState) -> TestServer {
    let router = crate::build_router(&state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}

pub async fn create_test_app(pool: PgPool) -> TestServer {
    create_test_app_with_config(pool, create_test_config()).await
}

pub async fn create_test_app_with_config(pool: PgPool, config: Config) -> TestServer {
    let app = crate::Application::new_with_pool(config, pool)
        .await
        .expect("Failed to create application");
    app.into_test_server()
}

pub async fn create_test_user(pool: &PgPool, role: Role) -> CurrentUser {
    create_test_user_with_roles(pool, vec![role]).await
}

pub async fn create_test_admin(pool: &PgPool) -> CurrentUser {
    create_test_user_with_roles(pool, vec![Role::Administrator]).await
}

pub async fn create_test_user_with_roles(pool: &PgPool, roles: Vec<Role>) -> CurrentUser {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut users_repo = Users::new(&mut conn);
    let email = format!("testuser_{}@example.com", Uuid::new_v4().simple());

    let request = ProfileCreateDBRequest {
        email,
        first_name: Some("Test".to_string()),
        last_name: Some("User".to_string()),
        roles,
        ..Default::default()
    };

    let user = users_repo.create(&request).await.expect("Failed to create test user");
    CurrentUser::from(user)
}

/// `Authorization: Bearer` header carrying a session token for the user
pub fn add_auth_headers(user: &CurrentUser) -> Vec<(String, String)> {
    let token = create_session_token(user, &create_test_config()).expect("Failed to create session token");
    vec![("authorization".to_string(), format!("Bearer {token}"))]
}
