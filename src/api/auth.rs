// Request authentication: API tokens, session tokens and the session cookie

use crate::api::handlers::AppState;
use crate::db::{self, models::Profile};
use crate::utils::{self, tokens};
use crate::{Error, Result};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum::http::{header, HeaderMap};
use tower_cookies::Cookies;
use tracing::debug;

/// Cookie carrying a session token for browser clients
pub const SESSION_COOKIE: &str = "session";

/// Window of the per-token rate limit
const TOKEN_WINDOW_SECS: u64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    ApiToken { token_id: i64 },
    Session,
}

/// The authenticated caller
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub profile: Profile,
    pub method: AuthMethod,
}

impl AuthUser {
    pub fn user_id(&self) -> &str {
        &self.profile.id
    }
}

/// Caller with the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

/// Caller authenticated by a session rather than an API token
#[derive(Debug, Clone)]
pub struct SessionUser(pub AuthUser);

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<Option<String>> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| Error::Unauthorized("Invalid Authorization header format".to_string()))?;

    let token = value.strip_prefix("Bearer ").ok_or_else(|| {
        Error::Unauthorized("Authorization header must use Bearer token format".to_string())
    })?;

    let token = token.trim();
    if token.is_empty() {
        return Err(Error::Unauthorized("Bearer token is empty".to_string()));
    }

    Ok(Some(token.to_string()))
}

async fn authenticate_api_token(state: &AppState, token: &str) -> Result<AuthUser> {
    let api_token = db::tokens::find_active_token(&state.pool, &tokens::hash_token(token))
        .await?
        .ok_or_else(|| Error::Unauthorized("Invalid or revoked API token".to_string()))?;

    let allowed = db::tokens::check_rate_limit(
        &state.pool,
        api_token.id,
        api_token.rate_limit_per_hour,
        utils::now(),
    )
    .await?;

    if !allowed {
        return Err(Error::RateLimited {
            message: format!(
                "API token limit of {} requests per hour exceeded",
                api_token.rate_limit_per_hour
            ),
            retry_after_secs: TOKEN_WINDOW_SECS,
        });
    }

    let profile = db::profiles::get_profile(&state.pool, &api_token.user_id).await?;
    debug!("Authenticated {} via API token {}", profile.id, api_token.token_prefix);

    Ok(AuthUser {
        profile,
        method: AuthMethod::ApiToken {
            token_id: api_token.id,
        },
    })
}

async fn authenticate_session(state: &AppState, token: &str) -> Result<AuthUser> {
    let session =
        db::sessions::find_active_session(&state.pool, &tokens::hash_token(token), utils::now())
            .await?
            .ok_or_else(|| Error::Unauthorized("Invalid or expired session".to_string()))?;

    let profile = db::profiles::get_profile(&state.pool, &session.user_id).await?;

    Ok(AuthUser {
        profile,
        method: AuthMethod::Session,
    })
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = match extract_bearer_token(&parts.headers)? {
            Some(token) => token,
            None => {
                let cookies = Cookies::from_request_parts(parts, state)
                    .await
                    .map_err(|(_, msg)| Error::Internal(msg.to_string()))?;
                cookies
                    .get(SESSION_COOKIE)
                    .map(|c| c.value().to_string())
                    .ok_or_else(|| Error::Unauthorized("Authentication required".to_string()))?
            }
        };

        if token.starts_with(tokens::API_TOKEN_PREFIX) {
            authenticate_api_token(state, &token).await
        } else {
            authenticate_session(state, &token).await
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.profile.is_admin() {
            return Err(Error::Forbidden("Admin role required".to_string()));
        }
        Ok(AdminUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.method != AuthMethod::Session {
            return Err(Error::Forbidden(
                "API tokens can only be managed from a signed-in session".to_string(),
            ));
        }
        Ok(SessionUser(user))
    }
}
