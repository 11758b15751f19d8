//! Session lookup for handlers.
use crate::auth::Principal;
use crate::{error::AppError, AppState};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts, HeaderMap, HeaderValue},
};
use chrono::{DateTime, Utc};
use std::convert::Infallible;
use std::sync::Arc;
use uuid::Uuid;

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "session";

/// Session token from `Authorization: Bearer` or the session cookie
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value that installs a session until `expires_at`
pub fn session_cookie(token: &str, expires_at: DateTime<Utc>) -> Result<HeaderValue, AppError> {
    let max_age = (expires_at - Utc::now()).num_seconds().max(0);
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    ))
    .map_err(|e| AppError::Internal(format!("invalid cookie value: {e}")))
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// The authenticated caller
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub token: String,
    pub principal: Principal,
}

impl CurrentUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.principal.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin access required".to_string()))
        }
    }

    /// Allow the account owner or an admin
    pub fn require_self_or_admin(&self, user_id: Uuid) -> Result<(), AppError> {
        if self.principal.user_id == user_id || self.principal.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Not authorized".to_string()))
        }
    }
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or(AppError::Unauthenticated)?;
        let session = state
            .sessions
            .get(&token)
            .await
            .ok_or(AppError::Unauthenticated)?;
        Ok(CurrentUser {
            token,
            principal: session.principal,
        })
    }
}

impl OptionalFromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(
            <CurrentUser as FromRequestParts<Arc<AppState>>>::from_request_parts(parts, state)
                .await
                .ok(),
        )
    }
}
