use crate::auth::{CredentialService, PasswordHasher};
use crate::error::AppError;
use crate::metrics::{
    ACCOUNT_REGISTERED, CREDENTIAL_UPGRADED, LOGIN_FAILED, LOGIN_SUCCEEDED, PASSWORD_CHANGED,
    PASSWORD_RESET,
};
use crate::storage::{Account, AccountStore};
use async_trait::async_trait;
use eventmgmt_common::UserRole;
use metrics::counter;
use std::sync::Arc;
use uuid::Uuid;

/// Credential service backed by an [`AccountStore`]
#[derive(Clone)]
pub struct DefaultCredentials {
    accounts: Arc<dyn AccountStore>,
    hasher: PasswordHasher,
}

impl DefaultCredentials {
    pub fn new(accounts: Arc<dyn AccountStore>, hasher: PasswordHasher) -> Self {
        Self { accounts, hasher }
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    // hashing runs on the blocking pool
    async fn encrypt(&self, password: &str) -> Result<String, AppError> {
        let hasher = self.hasher.clone();
        let password = zeroize::Zeroizing::new(password.to_string());
        tokio::task::spawn_blocking(move || hasher.encrypt(&password))
            .await
            .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
    }

    async fn verify(&self, password: &str, stored: &str) -> Result<bool, AppError> {
        let hasher = self.hasher.clone();
        let password = zeroize::Zeroizing::new(password.to_string());
        let stored = stored.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &stored))
            .await
            .map_err(|e| AppError::Internal(format!("verification task failed: {e}")))
    }

}

#[async_trait]
impl CredentialService for DefaultCredentials {
    async fn register(
        &self,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> Result<Option<Account>, AppError> {
        if self.accounts.find_by_email(email).await?.is_some() {
            return Ok(None);
        }

        let account = Account::new(email, self.encrypt(password).await?, role);
        match self.accounts.save(account).await {
            Ok(account) => {
                counter!(ACCOUNT_REGISTERED).increment(1);
                tracing::info!(user_id = %account.id, role = %account.role, "account registered");
                Ok(Some(account))
            },
            // lost a race with a concurrent registration
            Err(AppError::DuplicateEmail) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Option<Account>, AppError> {
        let Some(mut account) = self.accounts.find_by_email(email).await? else {
            counter!(LOGIN_FAILED).increment(1);
            tracing::warn!("login failed");
            return Ok(None);
        };

        if !self.verify(password, &account.stored_credential).await? {
            counter!(LOGIN_FAILED).increment(1);
            tracing::warn!(user_id = %account.id, "login failed");
            return Ok(None);
        }

        if self.hasher.needs_rehash(&account.stored_credential) {
            let upgraded = self.encrypt(password).await?;
            // a change that landed after the read wins over the upgrade
            match self
                .accounts
                .update_credential_if(account.id, &account.stored_credential, upgraded.clone())
                .await
            {
                Ok(true) => {
                    account.stored_credential = upgraded;
                    counter!(CREDENTIAL_UPGRADED).increment(1);
                    tracing::info!(user_id = %account.id, scheme = ?self.hasher.scheme(), "credential upgraded");
                },
                Ok(false) => {
                    tracing::debug!(user_id = %account.id, "credential changed during login, upgrade skipped");
                },
                Err(e) => {
                    tracing::error!(user_id = %account.id, error = %e, "failed to upgrade credential");
                },
            }
        }

        counter!(LOGIN_SUCCEEDED).increment(1);
        tracing::info!(user_id = %account.id, "login succeeded");
        Ok(Some(account))
    }

    async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<bool, AppError> {
        let Some(account) = self.accounts.find_by_id(user_id).await? else {
            return Ok(false);
        };

        if !self.verify(current_password, &account.stored_credential).await? {
            tracing::warn!(%user_id, "password change rejected");
            return Ok(false);
        }

        let credential = self.encrypt(new_password).await?;
        if !self
            .accounts
            .update_credential_if(user_id, &account.stored_credential, credential)
            .await?
        {
            tracing::warn!(%user_id, "password changed concurrently, change rejected");
            return Ok(false);
        }

        counter!(PASSWORD_CHANGED).increment(1);
        tracing::info!(%user_id, "password changed");
        Ok(true)
    }

    async fn reset_password(&self, user_id: Uuid, new_password: &str) -> Result<bool, AppError> {
        let credential = self.encrypt(new_password).await?;

        // retry against whatever credential is current; other fields stay untouched
        loop {
            let Some(account) = self.accounts.find_by_id(user_id).await? else {
                return Ok(false);
            };
            if self
                .accounts
                .update_credential_if(user_id, &account.stored_credential, credential.clone())
                .await?
            {
                break;
            }
        }

        counter!(PASSWORD_RESET).increment(1);
        tracing::info!(%user_id, "password reset");
        Ok(true)
    }
}
