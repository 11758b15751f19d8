// ============================
// crates/backend-lib/src/auth/rate_limit.rs
// ============================
//! Rate limiting for login attempts.

use crate::metrics::LOGIN_LOCKED_OUT;
use dashmap::DashMap;
use metrics::counter;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default number of failed attempts before rate limiting
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default lockout duration (5 minutes)
pub const DEFAULT_LOCKOUT_DURATION: Duration = Duration::from_secs(5 * 60);

/// Failures older than this are forgotten by `cleanup`
const STALE_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
struct RateLimitEntry {
    failed_attempts: u32,
    last_failure: Instant,
    lockout_expiry: Option<Instant>,
}

impl RateLimitEntry {
    fn is_locked(&self, now: Instant) -> bool {
        self.lockout_expiry.is_some_and(|expiry| now < expiry)
    }
}

/// Rate limiter for login attempts, keyed by client IP
#[derive(Debug, Clone)]
pub struct AuthRateLimiter {
    attempts: Arc<DashMap<IpAddr, RateLimitEntry>>,
    max_attempts: u32,
    lockout_duration: Duration,
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_LOCKOUT_DURATION)
    }
}

impl AuthRateLimiter {
    pub fn new(max_attempts: u32, lockout_duration: Duration) -> Self {
        Self {
            attempts: Arc::new(DashMap::new()),
            max_attempts,
            lockout_duration,
        }
    }

    /// Record a failed login attempt
    pub fn record_failed_attempt(&self, ip: IpAddr) {
        let now = Instant::now();

        let mut entry = self.attempts.entry(ip).or_insert_with(|| RateLimitEntry {
            failed_attempts: 0,
            last_failure: now,
            lockout_expiry: None,
        });

        // a lapsed lockout starts a fresh count
        if entry.lockout_expiry.is_some_and(|expiry| now >= expiry) {
            entry.failed_attempts = 0;
            entry.lockout_expiry = None;
        }

        entry.failed_attempts += 1;
        entry.last_failure = now;

        if entry.failed_attempts >= self.max_attempts && entry.lockout_expiry.is_none() {
            entry.lockout_expiry = Some(now + self.lockout_duration);
            counter!(LOGIN_LOCKED_OUT).increment(1);
            tracing::warn!(%ip, attempts = entry.failed_attempts, "client locked out of login");
        }
    }

    /// Record a successful login
    pub fn record_success(&self, ip: IpAddr) {
        self.attempts.remove(&ip);
    }

    /// Check if an IP is allowed to attempt a login
    pub fn check_rate_limit(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        !self.attempts.get(&ip).is_some_and(|entry| entry.is_locked(now))
    }

    /// Clean up lapsed lockouts and stale failure counts
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.attempts.retain(|_, entry| match entry.lockout_expiry {
            Some(_) => entry.is_locked(now),
            None => now.duration_since(entry.last_failure) < STALE_AFTER,
        });
    }

    /// Number of tracked clients
    pub fn tracked(&self) -> usize {
        self.attempts.len()
    }
}
