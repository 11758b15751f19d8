// ============================
// crates/backend-lib/src/auth/token_generator.rs
// ============================
use crate::error::AppError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
/** Secure token generation for authentication
This module provides cryptographically secure token generation
for session tokens and password reset tokens. */
use rand::{distr::Alphanumeric, rngs::OsRng, Rng, TryRngCore};
use uuid::Uuid;

/// Default token size in bytes (32 bytes = 256 bits of entropy)
const DEFAULT_TOKEN_BYTES: usize = 32;

/// Length of a password reset token in characters
pub const RESET_TOKEN_LENGTH: usize = 40;

/// Random bytes mixed into a reset token on top of the UUID
const RESET_TOKEN_EXTRA_BYTES: usize = 20;

fn fill_random(buffer: &mut [u8]) -> Result<(), AppError> {
    OsRng
        .try_fill_bytes(buffer)
        .map_err(|e| AppError::Internal(format!("OS random source unavailable: {e}")))
}

/** Generate a cryptographically secure random token
This uses OS-provided entropy to create a secure random token
that is suitable for session IDs.
# Returns
A base64 URL-safe encoded string without padding */
pub fn generate_secure_token() -> Result<String, AppError> {
    generate_secure_token_with_size(DEFAULT_TOKEN_BYTES)
}

/** Generate a cryptographically secure random token with specified size
# Arguments
* `bytes` - The size of the random token in bytes
# Returns
A base64 URL-safe encoded string without padding */
pub fn generate_secure_token_with_size(bytes: usize) -> Result<String, AppError> {
    let mut buffer = vec![0u8; bytes];
    fill_random(&mut buffer)?;
    Ok(URL_SAFE_NO_PAD.encode(buffer))
}

/** Generate a password reset token
A random UUID followed by 20 OS-random bytes, reduced to alphanumerics
and cut to exactly 40 characters. */
pub fn generate_reset_token() -> Result<String, AppError> {
    let mut extra = [0u8; RESET_TOKEN_EXTRA_BYTES];
    fill_random(&mut extra)?;

    let raw = format!("{}{}", Uuid::new_v4(), URL_SAFE_NO_PAD.encode(extra));
    let mut token: String = raw
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(RESET_TOKEN_LENGTH)
        .collect();

    // Filtering can leave the token short; top it up
    if token.len() < RESET_TOKEN_LENGTH {
        let mut rng = rand::rng();
        token.extend(
            (&mut rng)
                .sample_iter(Alphanumeric)
                .take(RESET_TOKEN_LENGTH - token.len())
                .map(char::from),
        );
    }

    Ok(token)
}
