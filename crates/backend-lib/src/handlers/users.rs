// ============================
// crates/backend-lib/src/handlers/users.rs
// ============================
//! User administration endpoints.
use crate::auth::Principal;
use crate::middleware::CurrentUser;
use crate::storage::{normalize_email, Account};
use crate::validation::{validate_email, validate_new_password, validate_search_pattern};
use crate::{error::AppError, AppState};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    Json,
};
use eventmgmt_common::{ChangePasswordRequest, MessageResponse, UpdateUserRequest, UserRole, UserView};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use zeroize::Zeroizing;

const DEFAULT_PAGE_SIZE: usize = 10;
const MAX_PAGE_SIZE: usize = 100;

pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    /// Any value asks for the `X-Total-Count` header
    pub count: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub email: String,
}

fn views(accounts: Vec<Account>) -> Json<Vec<UserView>> {
    Json(accounts.iter().map(Account::view).collect())
}

async fn load(state: &AppState, id: Uuid) -> Result<Account, AppError> {
    state
        .accounts
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// GET /api/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<(HeaderMap, Json<Vec<UserView>>), AppError> {
    user.require_admin()?;

    let offset = query.offset.unwrap_or(0);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let accounts = state.accounts.list(offset, limit).await?;

    let mut headers = HeaderMap::new();
    if query.count.is_some() {
        let total = state.accounts.count().await?;
        headers.insert(TOTAL_COUNT_HEADER, HeaderValue::from(total));
    }

    Ok((headers, views(accounts)))
}

/// GET /api/users/{id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserView>, AppError> {
    user.require_self_or_admin(id)?;
    Ok(Json(load(&state, id).await?.view()))
}

/// GET /api/users/email/{email}
pub async fn get_user_by_email(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(email): Path<String>,
) -> Result<Json<UserView>, AppError> {
    user.require_admin()?;
    let account = state
        .accounts
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(account.view()))
}

/// GET /api/users/role/{role}
pub async fn get_users_by_role(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(role): Path<String>,
) -> Result<Json<Vec<UserView>>, AppError> {
    user.require_admin()?;
    let role: UserRole = role
        .parse()
        .map_err(|_| AppError::InvalidInput("Invalid user role".to_string()))?;
    Ok(views(state.accounts.find_by_role(role).await?))
}

/// GET /api/users/search?email=
pub async fn search_users(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<UserView>>, AppError> {
    user.require_admin()?;
    let pattern = validate_search_pattern(&query.email)?;
    Ok(views(state.accounts.search_by_email(pattern).await?))
}

/// PUT /api/users/{id}
///
/// Only admins may change roles. A password given here replaces the
/// current one without checking it and ends every session of the account.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserView>, AppError> {
    user.require_self_or_admin(id)?;
    let password = req.password.map(Zeroizing::new);

    if req.role.is_some() {
        user.require_admin()?;
    }
    let email = req.email.as_deref().map(validate_email).transpose()?;
    if let Some(password) = &password {
        validate_new_password(password, None, &state.settings.password.requirements)?;
    }

    let mut account = load(&state, id).await?;
    let previous_email = account.email.clone();
    let mut changed = false;

    if let Some(email) = email {
        if normalize_email(email) != account.email {
            account.email = email.to_string();
            changed = true;
        }
    }
    if let Some(role) = req.role {
        if role != account.role {
            account.role = role;
            changed = true;
        }
    }

    if changed {
        account = state.accounts.save(account).await?;
        if account.email != previous_email {
            state.reset_tokens().revoke_tokens_for(&previous_email);
        }
        state
            .sessions
            .refresh_principal(&Principal {
                user_id: account.id,
                email: account.email.clone(),
                role: account.role,
            })
            .await;
        tracing::info!(by = %user.principal.user_id, user_id = %id, "account updated");
    }

    if let Some(password) = &password {
        if !state.credentials.reset_password(id, password).await? {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        account = load(&state, id).await?;

        // same as any other password change: old sessions and reset links end
        state.sessions.remove_for_user(id).await;
        state.reset_tokens().revoke_tokens_for(&account.email);
        tracing::info!(by = %user.principal.user_id, user_id = %id, "password set by update");
    }

    Ok(Json(account.view()))
}

/// PUT /api/users/{id}/password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    user.require_self_or_admin(id)?;
    let current = Zeroizing::new(req.current_password);
    let new = Zeroizing::new(req.new_password);

    validate_new_password(&new, None, &state.settings.password.requirements)?;
    load(&state, id).await?;

    if !state.credentials.change_password(id, &current, &new).await? {
        return Err(AppError::InvalidInput("Invalid current password".to_string()));
    }

    // sessions opened with the old password end, the caller's included
    state.sessions.remove_for_user(id).await;

    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// DELETE /api/users/{id}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require_admin()?;

    let account = load(&state, id).await?;
    if !state.accounts.delete(id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    state.sessions.remove_for_user(id).await;
    state.reset_tokens().revoke_tokens_for(&account.email);
    tracing::info!(by = %user.principal.user_id, user_id = %id, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}
