// ============================
// crates/backend-lib/src/auth/session.rs
// ============================
//! Session token handling and management.
use super::token_generator::generate_secure_token;
use crate::clock::{Clock, SystemClock};
use crate::error::AppError;
use crate::metrics::{SESSION_ACTIVE, SESSION_CREATED, SESSION_EXPIRED};
use chrono::{DateTime, Duration, Utc};
use eventmgmt_common::UserRole;
use metrics::{counter, gauge};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Session TTL (time to live)
pub const SESSION_TTL: Duration = Duration::minutes(30);

/// Session TTL when the user asked to be remembered
pub const REMEMBER_ME_TTL: Duration = Duration::days(7);

/// The authenticated user a session speaks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Session information
#[derive(Debug, Clone)]
pub struct Session {
    pub principal: Principal,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Session manager for handling authentication tokens
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    remember_me_ttl: Duration,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), SESSION_TTL, REMEMBER_ME_TTL)
    }
}

impl SessionManager {
    /// Create a new session manager. Call [`SessionManager::spawn_cleanup_task`]
    /// to sweep expired sessions in the background.
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration, remember_me_ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            clock,
            ttl,
            remember_me_ttl,
        }
    }

    /// Create a new session
    pub async fn new_session(
        &self,
        principal: Principal,
        remember_me: bool,
    ) -> Result<(String, Session), AppError> {
        let token = generate_secure_token()?;
        let now = self.clock.now();
        let ttl = if remember_me { self.remember_me_ttl } else { self.ttl };
        let session = Session {
            principal,
            created_at: now,
            expires_at: now + ttl,
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(token.clone(), session.clone());

        counter!(SESSION_CREATED).increment(1);
        gauge!(SESSION_ACTIVE).set(sessions.len() as f64);

        Ok((token, session))
    }

    /// Get a live session by token
    pub async fn get(&self, token: &str) -> Option<Session> {
        let now = self.clock.now();
        let sessions = self.sessions.read().await;
        sessions.get(token).filter(|s| s.is_live(now)).cloned()
    }

    /// Validate a session token
    pub async fn validate_session(&self, token: &str) -> bool {
        self.get(token).await.is_some()
    }

    /// End a session, returning whether it existed
    pub async fn remove(&self, token: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(token).is_some();
        gauge!(SESSION_ACTIVE).set(sessions.len() as f64);
        removed
    }

    /// End every session belonging to `user_id`
    pub async fn remove_for_user(&self, user_id: Uuid) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.principal.user_id != user_id);
        gauge!(SESSION_ACTIVE).set(sessions.len() as f64);
        before - sessions.len()
    }

    /// Replace the principal on every session of `principal.user_id`
    pub async fn refresh_principal(&self, principal: &Principal) {
        let mut sessions = self.sessions.write().await;
        for session in sessions.values_mut() {
            if session.principal.user_id == principal.user_id {
                session.principal = principal.clone();
            }
        }
    }

    /// Remove expired sessions
    pub async fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;
        let before_count = sessions.len();

        sessions.retain(|_, session| session.is_live(now));

        let after_count = sessions.len();
        let removed = before_count - after_count;

        if removed > 0 {
            counter!(SESSION_EXPIRED).increment(removed as u64);
            gauge!(SESSION_ACTIVE).set(after_count as f64);
            tracing::debug!(removed, "swept expired sessions");
        }
        removed
    }

    /// Periodically remove expired sessions
    pub fn spawn_cleanup_task(&self, interval: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                manager.cleanup_expired().await;
            }
        })
    }
}
