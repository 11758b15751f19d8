use crate::error::AppError;
use crate::storage::Account;
use async_trait::async_trait;
use eventmgmt_common::UserRole;
use uuid::Uuid;

/// Account credential operations.
///
/// Outcomes a caller is expected to handle come back as `Option`/`bool`;
/// `Err` is reserved for storage and hashing failures.
#[async_trait]
pub trait CredentialService: Send + Sync {
    /// Create an account. `None` when the email is already registered.
    async fn register(
        &self,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> Result<Option<Account>, AppError>;

    /// The account for `email` if `password` matches. Unknown email and
    /// wrong password are indistinguishable.
    async fn authenticate(&self, email: &str, password: &str) -> Result<Option<Account>, AppError>;

    /// Swap the password after checking the current one. `false` leaves
    /// the account untouched.
    async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<bool, AppError>;

    /// Overwrite the password without checking the old one. The caller is
    /// responsible for having authorized the reset.
    async fn reset_password(&self, user_id: Uuid, new_password: &str) -> Result<bool, AppError>;
}
