// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! used for communication between event-management clients and the server.
//! This module defines the JSON request/response bodies of the auth and user APIs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Account role
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Full access to user administration
    Admin,
    /// Creates and manages events
    Organizer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::Organizer => "ORGANIZER",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role name is not recognised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown user role: {}", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for UserRole {
    type Err = UnknownRole;

    /// Role names are matched case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(UserRole::Admin),
            "ORGANIZER" => Ok(UserRole::Organizer),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Register a new account
/// # Fields
/// * `email` - Account email, must be unique
/// * `password` - Plaintext password
/// * `confirm_password` - Must match `password` when present
/// * `role` - Requested role (defaults to organizer)
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub confirm_password: Option<String>,
    #[serde(default)]
    pub role: Option<UserRole>,
}

/// Log in with email and password
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Extend the session lifetime
    #[serde(default)]
    pub remember_me: bool,
}

/// Successful login or registration
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    /// Opaque session token, also set as the `session` cookie
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserView,
}

/// Change the password of an account
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Start the forgot-password flow
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Finish the forgot-password flow
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
    #[serde(default)]
    pub confirm_password: Option<String>,
}

/// Partial account update; absent fields are left unchanged
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<UserRole>,
}

/// Public view of an account. Never carries credential material.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

/// Generic acknowledgement body
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
