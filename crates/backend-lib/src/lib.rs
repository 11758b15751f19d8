// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Core of the event management backend: credentials, password resets,
//! sessions and the HTTP surface over them.

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod storage;
pub mod validation;

use crate::auth::{
    AuthRateLimiter, CredentialService, DefaultCredentials, PasswordResetService, ResetTokenStore,
    SessionManager,
};
use crate::clock::{Clock, SystemClock};
use crate::config::{Settings, StorageBackend};
use crate::error::AppError;
use crate::mail::MailTransport;
use crate::middleware::RateLimiter;
use crate::storage::{AccountStore, FlatFileStorage, MemoryAccountStore};
use std::sync::Arc;
use std::time::Duration;

pub use router::create_router;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub accounts: Arc<dyn AccountStore>,
    pub credentials: Arc<dyn CredentialService>,
    pub sessions: SessionManager,
    pub reset: PasswordResetService,
    pub mailer: Arc<dyn MailTransport>,
    /// Per-IP login lockout
    pub login_limiter: AuthRateLimiter,
    /// Per-IP request limit for the whole API
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Wire the services together over the given collaborators
    pub fn new(
        settings: Settings,
        accounts: Arc<dyn AccountStore>,
        mailer: Arc<dyn MailTransport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let hasher = settings.password.hasher()?;
        let credentials: Arc<dyn CredentialService> =
            Arc::new(DefaultCredentials::new(accounts.clone(), hasher));
        let sessions = SessionManager::new(
            clock.clone(),
            settings.session.ttl(),
            settings.session.remember_me_ttl(),
        );
        let tokens = ResetTokenStore::new(
            clock,
            settings.reset.token_ttl(),
            settings.reset.revoke_previous,
        );
        let reset = PasswordResetService::new(
            tokens,
            accounts.clone(),
            credentials.clone(),
            mailer.clone(),
            sessions.clone(),
            settings.password.requirements.clone(),
        );
        let login_limiter = AuthRateLimiter::new(
            settings.auth_rate_limit.max_attempts,
            Duration::from_secs(settings.auth_rate_limit.lockout_secs),
        );
        let rate_limiter = Arc::new(RateLimiter::new(
            Duration::from_secs(settings.rate_limit.window_secs),
            settings.rate_limit.max_requests,
        ));

        Ok(Self {
            settings: Arc::new(settings),
            accounts,
            credentials,
            sessions,
            reset,
            mailer,
            login_limiter,
            rate_limiter,
        })
    }

    /// Build storage and mail transport as configured, on the wall clock
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let accounts: Arc<dyn AccountStore> = match settings.storage {
            StorageBackend::Memory => Arc::new(MemoryAccountStore::new()),
            StorageBackend::FlatFile => Arc::new(FlatFileStorage::new(&settings.data_dir)?),
        };
        let mailer = mail::transport_from_settings(&settings.mail)?;
        Ok(Self::new(settings, accounts, mailer, Arc::new(SystemClock))?)
    }

    /// Reset token store behind the reset flow
    pub fn reset_tokens(&self) -> &ResetTokenStore {
        self.reset.tokens()
    }
}
