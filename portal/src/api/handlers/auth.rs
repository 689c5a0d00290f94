use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::{
        auth::{
            AuthResponse, AuthSuccessResponse, LoginInfo, LoginRequest, LoginResponse, LogoutResponse, RegisterRequest, RegisterResponse,
            RegistrationInfo,
        },
        users::CurrentUser,
    },
    auth::{password, session, utils},
    db::{
        handlers::{Repository, Users},
        models::users::ProfileCreateDBRequest,
    },
    errors::Error,
};

fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid email or password".to_string()),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Get registration information
#[utoipa::path(
    get,
    path = "/authentication/register",
    tag = "authentication",
    responses(
        (status = 200, description = "Registration info", body = RegistrationInfo),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_registration_info(State(state): State<AppState>) -> Result<Json<RegistrationInfo>, Error> {
    let enabled = state.config.auth.native.enabled && state.config.auth.native.allow_registration;
    Ok(Json(RegistrationInfo {
        enabled,
        message: if enabled {
            "Registration is enabled".to_string()
        } else {
            "Registration is disabled".to_string()
        },
    }))
}

/// Register a new account and start a session
#[utoipa::path(
    post,
    path = "/authentication/register",
    request_body = RegisterRequest,
    tag = "authentication",
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Invalid input or registration disabled"),
        (status = 409, description = "An account with this email address already exists"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> Result<RegisterResponse, Error> {
    if !state.config.auth.native.enabled {
        return Err(Error::BadRequest {
            message: "Native authentication is disabled".to_string(),
        });
    }

    if !state.config.auth.native.allow_registration {
        return Err(Error::BadRequest {
            message: "User registration is disabled".to_string(),
        });
    }

    let email = request.email.trim().to_string();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::BadRequest {
            message: "Please enter a valid email address".to_string(),
        });
    }

    let password_config = &state.config.auth.native.password;
    password::validate_length(&request.password, password_config)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut user_repo = Users::new(&mut tx);

    if user_repo.get_by_email(&email).await?.is_some() {
        return Err(Error::Conflict {
            message: "An account with this email address already exists".to_string(),
        });
    }

    let password_hash = password::hash_password(request.password, password_config).await?;

    let created = user_repo
        .create(&ProfileCreateDBRequest {
            email,
            password_hash: Some(password_hash),
            first_name: non_blank(request.first_name),
            last_name: non_blank(request.last_name),
            roles: state.config.auth.default_user_roles.clone(),
            ..Default::default()
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let user = CurrentUser::from(created);
    let token = session::create_session_token(&user, &state.config)?;
    let cookie = utils::session_cookie(&token, &state.config);

    tracing::info!(user_id = %user.id, "Registered new user");

    Ok(RegisterResponse {
        auth_response: AuthResponse {
            user,
            token,
            message: "Registration successful".to_string(),
        },
        cookie,
    })
}

/// Get login information
#[utoipa::path(
    get,
    path = "/authentication/login",
    tag = "authentication",
    responses(
        (status = 200, description = "Login info", body = LoginInfo),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_login_info(State(state): State<AppState>) -> Result<Json<LoginInfo>, Error> {
    Ok(Json(LoginInfo {
        enabled: state.config.auth.native.enabled,
        message: if state.config.auth.native.enabled {
            "Native login is enabled".to_string()
        } else {
            "Native login is disabled".to_string()
        },
    }))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/authentication/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<LoginResponse, Error> {
    if !state.config.auth.native.enabled {
        return Err(Error::BadRequest {
            message: "Native authentication is disabled".to_string(),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut pool_conn)
        .get_by_email(&request.email)
        .await?
        .ok_or_else(invalid_credentials)?;

    // Profiles created without a password cannot sign in
    let hash = user.password_hash.clone().ok_or_else(invalid_credentials)?;
    if !password::verify_password(request.password, hash).await? {
        return Err(invalid_credentials());
    }

    let user = CurrentUser::from(user);
    let token = session::create_session_token(&user, &state.config)?;
    let cookie = utils::session_cookie(&token, &state.config);

    Ok(LoginResponse {
        auth_response: AuthResponse {
            user,
            token,
            message: "Login successful".to_string(),
        },
        cookie,
    })
}

/// Logout (clear session)
#[utoipa::path(
    post,
    path = "/authentication/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logout successful", body = AuthSuccessResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> Result<LogoutResponse, Error> {
    Ok(LogoutResponse {
        auth_response: AuthSuccessResponse {
            message: "Logout successful".to_string(),
        },
        cookie: utils::clear_session_cookie(&state.config),
    })
}
