// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Request field validation.

use crate::auth::password::MAX_PASSWORD_LENGTH;
use crate::auth::{validate_password_strength, PasswordRequirements};
use crate::error::AppError;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit
const MAX_SEARCH_PATTERN_LENGTH: usize = 100;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern is valid")
});

/// Possible validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Invalid search: {0}")]
    InvalidSearch(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

/// Validate an email address, returning it trimmed
pub fn validate_email(email: &str) -> ValidationResult<&str> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::InvalidEmail("Email is required".to_string()));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail(format!(
            "Email cannot exceed {MAX_EMAIL_LENGTH} characters"
        )));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail(
            "Invalid email format".to_string(),
        ));
    }

    Ok(email)
}

/** Validate a password chosen by the user
# Arguments
* `password` - The new password
* `confirm` - Confirmation field, when the form has one
* `requirements` - Configured complexity rules */
pub fn validate_new_password<'a>(
    password: &'a str,
    confirm: Option<&str>,
    requirements: &PasswordRequirements,
) -> ValidationResult<&'a str> {
    if password.trim().is_empty() {
        return Err(ValidationError::InvalidPassword(
            "Password is required".to_string(),
        ));
    }

    if confirm.is_some_and(|confirm| confirm != password) {
        return Err(ValidationError::PasswordMismatch);
    }

    if password.chars().count() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "Password cannot exceed {MAX_PASSWORD_LENGTH} characters"
        )));
    }

    if !validate_password_strength(password, requirements) {
        return Err(ValidationError::InvalidPassword(describe(requirements)));
    }

    Ok(password)
}

fn describe(requirements: &PasswordRequirements) -> String {
    let mut rules = vec![format!("at least {} characters", requirements.min_length)];
    if requirements.require_uppercase {
        rules.push("an uppercase letter".to_string());
    }
    if requirements.require_lowercase {
        rules.push("a lowercase letter".to_string());
    }
    if requirements.require_digit {
        rules.push("a digit".to_string());
    }
    if requirements.require_special {
        rules.push("a special character".to_string());
    }
    format!("Password must contain {}", rules.join(", "))
}

/// Validate an email search fragment, returning it trimmed
pub fn validate_search_pattern(pattern: &str) -> ValidationResult<&str> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Err(ValidationError::InvalidSearch(
            "Search pattern must not be empty".to_string(),
        ));
    }
    if pattern.len() > MAX_SEARCH_PATTERN_LENGTH {
        return Err(ValidationError::InvalidSearch(format!(
            "Search pattern cannot exceed {MAX_SEARCH_PATTERN_LENGTH} characters"
        )));
    }
    Ok(pattern)
}
