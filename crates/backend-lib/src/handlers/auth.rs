// ============================
// crates/backend-lib/src/handlers/auth.rs
// ============================
//! Registration, login and password reset endpoints.
use crate::auth::Principal;
use crate::middleware::session::{clear_session_cookie, session_cookie};
use crate::middleware::{ClientIp, CurrentUser};
use crate::storage::Account;
use crate::validation::{validate_email, validate_new_password};
use crate::{error::AppError, AppState};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use eventmgmt_common::{
    ForgotPasswordRequest, LoginRequest, MessageResponse, RegisterRequest, ResetPasswordRequest,
    SessionResponse, UserRole, UserView,
};
use serde::Deserialize;
use std::sync::Arc;
use zeroize::Zeroizing;

pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If the email is registered, password reset instructions will be sent";

fn principal_of(account: &Account) -> Principal {
    Principal {
        user_id: account.id,
        email: account.email.clone(),
        role: account.role,
    }
}

/// Open a session for `account` and answer with its token and cookie
async fn session_response(
    state: &AppState,
    account: &Account,
    remember_me: bool,
    status: StatusCode,
) -> Result<Response, AppError> {
    let (token, session) = state
        .sessions
        .new_session(principal_of(account), remember_me)
        .await?;
    let cookie = session_cookie(&token, session.expires_at)?;
    let body = SessionResponse {
        token,
        expires_at: session.expires_at,
        user: account.view(),
    };
    Ok((status, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// POST /auth/register
///
/// Anyone may register an organizer. Creating an admin takes an admin
/// session; in that case the caller keeps their own session and gets the
/// new account back instead of a session for it.
pub async fn register(
    State(state): State<Arc<AppState>>,
    caller: Option<CurrentUser>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    let password = Zeroizing::new(req.password);
    let confirm = req.confirm_password.map(Zeroizing::new);

    let email = validate_email(&req.email)?;
    validate_new_password(
        &password,
        confirm.as_deref().map(String::as_str),
        &state.settings.password.requirements,
    )?;

    let role = req.role.unwrap_or(UserRole::Organizer);
    if role == UserRole::Admin {
        match &caller {
            Some(user) => user.require_admin()?,
            None => return Err(AppError::Forbidden("Admin access required".to_string())),
        }
    }

    let account = state
        .credentials
        .register(email, &password, role)
        .await?
        .ok_or(AppError::DuplicateEmail)?;

    match caller {
        Some(user) if user.principal.is_admin() => {
            tracing::info!(admin = %user.principal.user_id, user_id = %account.id, "account created by admin");
            Ok((StatusCode::CREATED, Json(account.view())).into_response())
        },
        _ => session_response(&state, &account, false, StatusCode::CREATED).await,
    }
}

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let password = Zeroizing::new(req.password);

    if !state.login_limiter.check_rate_limit(ip) {
        tracing::warn!(%ip, "login refused while locked out");
        return Err(AppError::AuthRateLimited);
    }

    if req.email.trim().is_empty() || password.is_empty() {
        return Err(AppError::InvalidInput(
            "Email and password are required".to_string(),
        ));
    }

    let Some(account) = state.credentials.authenticate(&req.email, &password).await? else {
        state.login_limiter.record_failed_attempt(ip);
        return Err(AppError::AuthenticationFailure);
    };

    state.login_limiter.record_success(ip);
    session_response(&state, &account, req.remember_me, StatusCode::OK).await
}

/// POST /auth/logout
pub async fn logout(State(state): State<Arc<AppState>>, user: CurrentUser) -> impl IntoResponse {
    state.sessions.remove(&user.token).await;
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clear_session_cookie())],
    )
}

/// GET /auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<UserView>, AppError> {
    let account = state
        .accounts
        .find_by_id(user.principal.user_id)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    Ok(Json(account.view()))
}

/// POST /auth/forgot
///
/// Always answers 202 with the same message.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> (StatusCode, Json<MessageResponse>) {
    match validate_email(&req.email) {
        Ok(email) => {
            if let Err(e) = state
                .reset
                .request_reset(email, &state.settings.public_base_url)
                .await
            {
                tracing::error!(error = %e, "password reset request failed");
            }
        },
        Err(e) => tracing::debug!(error = %e, "ignoring malformed reset request"),
    }

    (
        StatusCode::ACCEPTED,
        Json(MessageResponse::new(FORGOT_PASSWORD_MESSAGE)),
    )
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub token: String,
}

/// GET /auth/reset?token=
pub async fn check_reset_token(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<MessageResponse>, AppError> {
    if state.reset.check_token(&query.token) {
        Ok(Json(MessageResponse::new("Token is valid")))
    } else {
        Err(AppError::InvalidOrExpiredToken)
    }
}

/// POST /auth/reset
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let password = Zeroizing::new(req.password);
    let confirm = req.confirm_password.map(Zeroizing::new);

    if !state.reset.check_token(&req.token) {
        return Err(AppError::InvalidOrExpiredToken);
    }
    validate_new_password(
        &password,
        confirm.as_deref().map(String::as_str),
        &state.settings.password.requirements,
    )?;

    state.reset.complete_reset(&req.token, &password).await?;
    Ok(Json(MessageResponse::new(
        "Your password has been reset. You can now log in.",
    )))
}
