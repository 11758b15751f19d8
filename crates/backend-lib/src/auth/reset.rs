// ============================
// crates/backend-lib/src/auth/reset.rs
// ============================
//! Forgot-password flow: issue a token, mail a link, redeem the token.
use super::{CredentialService, PasswordRequirements, ResetTokenStore, SessionManager};
use crate::error::AppError;
use crate::mail::MailTransport;
use crate::storage::AccountStore;
use crate::validation::validate_new_password;
use std::sync::Arc;

pub const RESET_MAIL_SUBJECT: &str = "Password Reset Request";

/// Path of the reset form the mailed link points at
pub const RESET_PATH: &str = "/auth/reset";

#[derive(Clone)]
pub struct PasswordResetService {
    tokens: ResetTokenStore,
    accounts: Arc<dyn AccountStore>,
    credentials: Arc<dyn CredentialService>,
    mailer: Arc<dyn MailTransport>,
    sessions: SessionManager,
    requirements: PasswordRequirements,
}

impl PasswordResetService {
    pub fn new(
        tokens: ResetTokenStore,
        accounts: Arc<dyn AccountStore>,
        credentials: Arc<dyn CredentialService>,
        mailer: Arc<dyn MailTransport>,
        sessions: SessionManager,
        requirements: PasswordRequirements,
    ) -> Self {
        Self {
            tokens,
            accounts,
            credentials,
            mailer,
            sessions,
            requirements,
        }
    }

    pub fn tokens(&self) -> &ResetTokenStore {
        &self.tokens
    }

    /** Start a reset for `email`.
    Succeeds whether or not the account exists, so the caller cannot use it
    to probe for registered addresses. Delivery failures are only logged.
    # Arguments
    * `email` - Address the user typed in
    * `base_url` - Public origin the link is built on, without trailing slash */
    pub async fn request_reset(&self, email: &str, base_url: &str) -> Result<(), AppError> {
        let Some(account) = self.accounts.find_by_email(email).await? else {
            tracing::info!("password reset requested for unknown email");
            return Ok(());
        };

        let token = match self.tokens.generate_token(&account.email) {
            Ok(token) => token,
            Err(e) => {
                tracing::error!(user_id = %account.id, error = %e, "could not issue reset token");
                return Ok(());
            },
        };

        let link = format!(
            "{}{}?token={}",
            base_url.trim_end_matches('/'),
            RESET_PATH,
            token
        );
        let body = format!(
            "Click the link below to reset your password:\n\n{link}\n\nThe link expires in {} minutes.",
            self.tokens.ttl().num_minutes()
        );

        if self.mailer.send(&account.email, RESET_MAIL_SUBJECT, &body).await {
            tracing::info!(user_id = %account.id, "password reset mail sent");
        } else {
            tracing::error!(user_id = %account.id, "password reset mail could not be delivered");
        }
        Ok(())
    }

    /// Whether `token` can still be redeemed
    pub fn check_token(&self, token: &str) -> bool {
        self.tokens.is_valid_token(token)
    }

    /// Redeem `token` and set `new_password` on its account
    pub async fn complete_reset(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        if token.trim().is_empty() || !self.tokens.is_valid_token(token) {
            return Err(AppError::InvalidOrExpiredToken);
        }

        // a rejected password leaves the token usable for another try
        validate_new_password(new_password, None, &self.requirements)?;

        let email = self
            .tokens
            .consume_token(token)
            .ok_or(AppError::InvalidOrExpiredToken)?;

        let account = self
            .accounts
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::NotFound("Account no longer exists".to_string()))?;

        if !self.credentials.reset_password(account.id, new_password).await? {
            return Err(AppError::NotFound("Account no longer exists".to_string()));
        }

        let dropped = self.sessions.remove_for_user(account.id).await;
        tracing::info!(user_id = %account.id, sessions_dropped = dropped, "password reset completed");
        Ok(())
    }
}
