// ============================
// crates/backend-lib/src/auth/mod.rs
// ============================
//! Credentials, sessions and password resets.

pub mod password;
pub mod rate_limit;
pub mod reset;
pub mod reset_token;
pub mod session;
pub mod token_generator;
mod service;
mod service_impl;

pub use password::{
    validate_password_strength, PasswordHasher, PasswordRequirements, PasswordScheme,
    MIN_PASSWORD_LENGTH,
};
pub use rate_limit::AuthRateLimiter;
pub use reset::PasswordResetService;
pub use reset_token::{ResetTokenStore, RESET_TOKEN_TTL};
pub use service::CredentialService;
pub use service_impl::DefaultCredentials;
pub use session::{Principal, Session, SessionManager, REMEMBER_ME_TTL, SESSION_TTL};
