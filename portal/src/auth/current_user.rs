use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session::{self, SessionClaims},
    config::Config,
    db::handlers::{Repository, Users},
    errors::{Error, Result},
};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::{debug, instrument, trace};

/// Extract the session token from an `Authorization: Bearer` header if present
/// Returns:
/// - None: No Authorization header or not a Bearer token
/// - Some(Ok(claims)): Valid token found and verified
/// - Some(Err(error)): Bearer token present but invalid or expired
fn try_bearer_auth(parts: &Parts, config: &Config) -> Option<Result<SessionClaims>> {
    let auth_header = parts.headers.get(header::AUTHORIZATION)?;

    let auth_str = match auth_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid authorization header: {e}"),
            }));
        }
    };

    let token = auth_str.strip_prefix("Bearer ")?;
    Some(session::verify_session_token(token.trim(), config))
}

/// Extract the session token from the session cookie if present
/// Returns:
/// - None: No session cookie present
/// - Some(Ok(claims)): Valid token found and verified
/// - Some(Err(error)): Cookie present but every candidate failed verification
fn try_cookie_auth(parts: &Parts, config: &Config) -> Option<Result<SessionClaims>> {
    let cookie_header = parts.headers.get(header::COOKIE)?;

    let cookie_str = match cookie_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid cookie header: {e}"),
            }));
        }
    };
    let cookie_name = &config.auth.native.session.cookie_name;

    let mut last_error = None;
    for cookie in cookie_str.split(';') {
        let Some((name, value)) = cookie.trim().split_once('=') else {
            continue;
        };
        if name != cookie_name {
            continue;
        }
        // Expired tokens are expected here; keep looking in case a fresher cookie follows
        match session::verify_session_token(value, config) {
            Ok(claims) => return Some(Ok(claims)),
            Err(e) => last_error = Some(e),
        }
    }
    last_error.map(Err)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        if !state.config.auth.native.enabled {
            return Err(Error::Unauthenticated {
                message: Some("Native authentication is disabled".to_string()),
            });
        }

        // Bearer tokens win over cookies so API clients are unaffected by a stale browser session
        let claims = match try_bearer_auth(parts, &state.config) {
            Some(result) => result,
            None => try_cookie_auth(parts, &state.config).unwrap_or(Err(Error::Unauthenticated { message: None })),
        };

        let claims = match claims {
            Ok(claims) => claims,
            Err(e) => {
                trace!("Session authentication failed: {:?}", e);
                return Err(e);
            }
        };

        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let profile = Users::new(&mut conn).get_by_id(claims.sub).await?;

        match profile {
            Some(profile) => {
                debug!("Authenticated user: {}", profile.id);
                Ok(CurrentUser::from(profile))
            }
            None => {
                // Deleted since the token was issued
                trace!("Session subject {} no longer exists", claims.sub);
                Err(Error::Unauthenticated { message: None })
            }
        }
    }
}
