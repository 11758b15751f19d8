// ============================
// crates/backend-lib/src/auth/reset_token.rs
// ============================
//! Expiring, single-use password reset tokens.
//!
//! Tokens live only in process memory. A token grants nothing once it has
//! been consumed, invalidated or has passed its expiry.
use super::token_generator::generate_reset_token;
use crate::clock::{Clock, SystemClock};
use crate::error::AppError;
use crate::metrics::{RESET_TOKEN_ACTIVE, RESET_TOKEN_CONSUMED, RESET_TOKEN_EXPIRED, RESET_TOKEN_ISSUED};
use chrono::{DateTime, Duration, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use metrics::{counter, gauge};
use std::sync::{Arc, Mutex};

/// Default token lifetime
pub const RESET_TOKEN_TTL: Duration = Duration::minutes(60);

/// What a token authorizes
#[derive(Debug, Clone, PartialEq, Eq)]
struct TokenInfo {
    email: String,
    expires_at: DateTime<Utc>,
}

impl TokenInfo {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Concurrent token -> email map with lazy and swept expiry
#[derive(Clone)]
pub struct ResetTokenStore {
    tokens: Arc<DashMap<String, TokenInfo>>,
    // makes revoke-then-insert one step for concurrent issuers
    issue_lock: Arc<Mutex<()>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    revoke_previous: bool,
}

impl Default for ResetTokenStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), RESET_TOKEN_TTL, true)
    }
}

impl ResetTokenStore {
    /** Create a token store
    # Arguments
    * `clock` - Time source for issuance and expiry
    * `ttl` - Lifetime of each token
    * `revoke_previous` - Drop outstanding tokens for an email when a new one is issued */
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration, revoke_previous: bool) -> Self {
        Self {
            tokens: Arc::new(DashMap::new()),
            issue_lock: Arc::new(Mutex::new(())),
            clock,
            ttl,
            revoke_previous,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token authorizing a reset of `email`'s password
    pub fn generate_token(&self, email: &str) -> Result<String, AppError> {
        let _issuing = self.issue_lock.lock().unwrap_or_else(|e| e.into_inner());
        if self.revoke_previous {
            self.revoke_tokens_for(email);
        }

        let info = TokenInfo {
            email: email.to_string(),
            expires_at: self.clock.now() + self.ttl,
        };

        // A collision on 40 random alphanumerics is not expected; never overwrite
        let token = loop {
            let candidate = generate_reset_token()?;
            if let Entry::Vacant(slot) = self.tokens.entry(candidate.clone()) {
                slot.insert(info);
                break candidate;
            }
        };

        counter!(RESET_TOKEN_ISSUED).increment(1);
        gauge!(RESET_TOKEN_ACTIVE).set(self.tokens.len() as f64);
        tracing::debug!(ttl_minutes = self.ttl.num_minutes(), "issued password reset token");

        Ok(token)
    }

    /// Whether `token` is present and unexpired. Expired tokens are evicted.
    pub fn is_valid_token(&self, token: &str) -> bool {
        let now = self.clock.now();
        let expired = match self.tokens.get(token) {
            None => return false,
            Some(info) => info.is_expired(now),
        };

        if expired {
            self.evict_if_expired(token, now);
            return false;
        }
        true
    }

    /// Email the token was issued for. Does not check expiry.
    pub fn get_email_from_token(&self, token: &str) -> Option<String> {
        self.tokens.get(token).map(|info| info.email.clone())
    }

    /// Remove a token unconditionally
    pub fn invalidate_token(&self, token: &str) {
        if self.tokens.remove(token).is_some() {
            gauge!(RESET_TOKEN_ACTIVE).set(self.tokens.len() as f64);
        }
    }

    /// Check expiry and remove in one step, returning the email if the
    /// token was live. Concurrent callers with the same token cannot both
    /// succeed.
    pub fn consume_token(&self, token: &str) -> Option<String> {
        let now = self.clock.now();
        match self.tokens.remove_if(token, |_, info| !info.is_expired(now)) {
            Some((_, info)) => {
                counter!(RESET_TOKEN_CONSUMED).increment(1);
                gauge!(RESET_TOKEN_ACTIVE).set(self.tokens.len() as f64);
                Some(info.email)
            },
            None => {
                self.evict_if_expired(token, now);
                None
            },
        }
    }

    /// Remove every token issued for `email`
    pub fn revoke_tokens_for(&self, email: &str) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|_, info| info.email != email);
        before.saturating_sub(self.tokens.len())
    }

    /// Drop all expired tokens, returning how many were removed
    pub fn cleanup_expired_tokens(&self) -> usize {
        let now = self.clock.now();
        let before = self.tokens.len();
        self.tokens.retain(|_, info| !info.is_expired(now));
        let removed = before.saturating_sub(self.tokens.len());

        if removed > 0 {
            counter!(RESET_TOKEN_EXPIRED).increment(removed as u64);
            gauge!(RESET_TOKEN_ACTIVE).set(self.tokens.len() as f64);
            tracing::debug!(removed, "swept expired password reset tokens");
        }
        removed
    }

    /// Number of tokens currently held, expired or not
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Spawn a task that sweeps expired tokens every `interval`
    pub fn spawn_cleanup_task(&self, interval: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                store.cleanup_expired_tokens();
            }
        })
    }

    fn evict_if_expired(&self, token: &str, now: DateTime<Utc>) {
        if self.tokens.remove_if(token, |_, info| info.is_expired(now)).is_some() {
            counter!(RESET_TOKEN_EXPIRED).increment(1);
            gauge!(RESET_TOKEN_ACTIVE).set(self.tokens.len() as f64);
        }
    }
}
