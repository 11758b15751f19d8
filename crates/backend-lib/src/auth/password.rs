// ============================
// crates/backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
//!
//! Two stored-credential formats are understood:
//!
//! * `base64(salt):base64(digest)` where the digest is a single SHA-256 pass
//!   over `salt || password`. This is the persisted format of existing
//!   accounts. It has no work factor and is weak against offline brute force.
//! * scrypt PHC strings (`$scrypt$ln=..,r=..,p=..$salt$hash`).
//!
//! Verification accepts either; new credentials are produced in the
//! configured [`PasswordScheme`].
use crate::error::AppError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, TryRngCore};
use scrypt::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Params, Scrypt,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// Salt size in bytes (128 bits)
pub const SALT_LENGTH: usize = 16;

/// SHA-256 output size in bytes
pub const DIGEST_LENGTH: usize = 32;

/// Separator between salt and digest. Not part of the base64 alphabet.
pub const CREDENTIAL_DELIMITER: char = ':';

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum accepted password length
pub const MAX_PASSWORD_LENGTH: usize = 128;

pub type Salt = [u8; SALT_LENGTH];
pub type Digest = [u8; DIGEST_LENGTH];

/// Generate a random salt from the operating system CSPRNG
pub fn generate_salt() -> Result<Salt, AppError> {
    let mut salt = [0u8; SALT_LENGTH];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| AppError::Internal(format!("OS random source unavailable: {e}")))?;
    Ok(salt)
}

/// SHA-256 over `salt || password`
pub fn hash(password: &str, salt: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());

    let mut digest = [0u8; DIGEST_LENGTH];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// Hash a password with a fresh salt into `base64(salt):base64(digest)`
pub fn encrypt(password: &str) -> Result<String, AppError> {
    let salt = generate_salt()?;
    let digest = hash(password, &salt);
    Ok(format!(
        "{}{CREDENTIAL_DELIMITER}{}",
        STANDARD.encode(salt),
        STANDARD.encode(digest)
    ))
}

/// Verify a password against a `salt:digest` credential.
///
/// Any malformed credential verifies as `false`.
pub fn verify(password: &str, stored: &str) -> bool {
    let Some((salt_b64, digest_b64)) = stored.split_once(CREDENTIAL_DELIMITER) else {
        return false;
    };
    if digest_b64.contains(CREDENTIAL_DELIMITER) {
        return false;
    }

    let (Ok(salt), Ok(expected)) = (STANDARD.decode(salt_b64), STANDARD.decode(digest_b64)) else {
        return false;
    };

    let computed = hash(password, &salt);
    constant_time_eq(&expected, &computed)
}

/// Compare two byte strings without an early exit.
///
/// Differences are accumulated across the shorter length and a length
/// mismatch is folded into the result.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let mut diff = u8::from(a.len() != b.len());
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Format used for newly produced credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PasswordScheme {
    /// `base64(salt):base64(sha256(salt || password))`
    #[default]
    SaltedSha256,
    /// scrypt PHC string
    Scrypt,
}

impl PasswordScheme {
    /// Detect the scheme a stored credential was produced with
    pub fn of(stored: &str) -> Self {
        if stored.starts_with('$') {
            PasswordScheme::Scrypt
        } else {
            PasswordScheme::SaltedSha256
        }
    }
}

/// Password hasher bound to a configured scheme
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    scheme: PasswordScheme,
    scrypt_params: Params,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            scheme: PasswordScheme::default(),
            scrypt_params: Params::recommended(),
        }
    }
}

impl PasswordHasher {
    pub fn new(scheme: PasswordScheme, scrypt_params: Params) -> Self {
        Self { scheme, scrypt_params }
    }

    /// Build a hasher from scrypt cost parameters
    pub fn with_scrypt_cost(
        scheme: PasswordScheme,
        log_n: u8,
        r: u32,
        p: u32,
    ) -> Result<Self, AppError> {
        let params = Params::new(log_n, r, p, Params::RECOMMENDED_LEN)
            .map_err(|e| AppError::InvalidInput(format!("invalid scrypt parameters: {e}")))?;
        Ok(Self::new(scheme, params))
    }

    pub fn scheme(&self) -> PasswordScheme {
        self.scheme
    }

    /// Produce a stored credential for `password`
    pub fn encrypt(&self, password: &str) -> Result<String, AppError> {
        match self.scheme {
            PasswordScheme::SaltedSha256 => encrypt(password),
            PasswordScheme::Scrypt => {
                let salt = SaltString::encode_b64(&generate_salt()?)?;
                let hash = Scrypt.hash_password_customized(
                    password.as_bytes(),
                    None,
                    None,
                    self.scrypt_params,
                    &salt,
                )?;
                Ok(hash.to_string())
            },
        }
    }

    /// Verify `password` against a credential of either scheme
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        match PasswordScheme::of(stored) {
            PasswordScheme::SaltedSha256 => verify(password, stored),
            PasswordScheme::Scrypt => {
                let Ok(parsed) = PasswordHash::new(stored) else {
                    return false;
                };
                Scrypt.verify_password(password.as_bytes(), &parsed).is_ok()
            },
        }
    }

    /// Whether `stored` should be re-encrypted under the configured scheme
    pub fn needs_rehash(&self, stored: &str) -> bool {
        PasswordScheme::of(stored) != self.scheme
    }
}

/// Password complexity requirements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordRequirements {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordRequirements {
    fn default() -> Self {
        Self {
            min_length: MIN_PASSWORD_LENGTH,
            require_uppercase: false,
            require_lowercase: false,
            require_digit: false,
            require_special: false,
        }
    }
}

/// Check if a password meets the complexity requirements
pub fn validate_password_strength(password: &str, requirements: &PasswordRequirements) -> bool {
    let length = password.chars().count();
    if password.trim().is_empty()
        || length < requirements.min_length
        || length > MAX_PASSWORD_LENGTH
    {
        return false;
    }

    if requirements.require_uppercase && !password.chars().any(char::is_uppercase) {
        return false;
    }

    if requirements.require_lowercase && !password.chars().any(char::is_lowercase) {
        return false;
    }

    if requirements.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }

    if requirements.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
        return false;
    }

    true
}
