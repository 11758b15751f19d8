// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
//!
//! Layers, lowest precedence first: built-in defaults, a TOML file
//! (`config.toml` unless another path is given), then `EVENTMGMT_`
//! environment variables with `__` separating nested keys, e.g.
//! `EVENTMGMT_MAIL__SMTP_HOST`.
use crate::auth::{PasswordHasher, PasswordRequirements, PasswordScheme, MIN_PASSWORD_LENGTH};
use crate::error::AppError;
use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "EVENTMGMT_";
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Origin used when building links sent to users
    pub public_base_url: String,
    /// Data directory path
    pub data_dir: PathBuf,
    pub log_level: String,
    pub log_format: LogFormat,
    pub storage: StorageBackend,
    pub password: PasswordSettings,
    pub reset: ResetSettings,
    pub session: SessionSettings,
    pub rate_limit: RateLimitSettings,
    pub auth_rate_limit: AuthRateLimitSettings,
    pub mail: MailSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    #[default]
    FlatFile,
}

/// Hashing scheme and complexity rules for new passwords
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordSettings {
    pub scheme: PasswordScheme,
    pub requirements: PasswordRequirements,
    pub scrypt_log_n: u8,
    pub scrypt_r: u32,
    pub scrypt_p: u32,
}

/// Password reset token settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetSettings {
    pub token_ttl_minutes: u32,
    pub sweep_interval_secs: u64,
    /// Issuing a token revokes the email's outstanding ones
    pub revoke_previous: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub ttl_minutes: u32,
    pub remember_me_days: u32,
    pub cleanup_interval_secs: u64,
}

/// Per-IP request rate limit for the whole API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub max_requests: u32,
    pub window_secs: u64,
    /// Key clients on `X-Forwarded-For` / `X-Real-IP`. Enable only behind a
    /// proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
}

/// Login lockout after repeated failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthRateLimitSettings {
    pub max_attempts: u32,
    pub lockout_secs: u64,
}

/// Outbound mail. Without `smtp_host` mail is only logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub starttls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            public_base_url: "http://127.0.0.1:3000".to_string(),
            data_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            storage: StorageBackend::default(),
            password: PasswordSettings::default(),
            reset: ResetSettings::default(),
            session: SessionSettings::default(),
            rate_limit: RateLimitSettings::default(),
            auth_rate_limit: AuthRateLimitSettings::default(),
            mail: MailSettings::default(),
        }
    }
}

impl Default for PasswordSettings {
    fn default() -> Self {
        let recommended = scrypt::Params::recommended();
        Self {
            scheme: PasswordScheme::default(),
            requirements: PasswordRequirements::default(),
            scrypt_log_n: recommended.log_n(),
            scrypt_r: recommended.r(),
            scrypt_p: recommended.p(),
        }
    }
}

impl Default for ResetSettings {
    fn default() -> Self {
        Self {
            token_ttl_minutes: 60,
            sweep_interval_secs: 5 * 60,
            revoke_previous: true,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_minutes: 30,
            remember_me_days: 7,
            cleanup_interval_secs: 60 * 60,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_secs: 60,
            trust_proxy_headers: false,
        }
    }
}

impl Default for AuthRateLimitSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_secs: 5 * 60,
        }
    }
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            starttls: true,
            username: None,
            password: None,
            from_address: "noreply@eventmgmt.local".to_string(),
            from_name: "Event Management".to_string(),
        }
    }
}

impl PasswordSettings {
    pub fn hasher(&self) -> Result<PasswordHasher, AppError> {
        PasswordHasher::with_scrypt_cost(self.scheme, self.scrypt_log_n, self.scrypt_r, self.scrypt_p)
    }
}

impl ResetSettings {
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.token_ttl_minutes))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl SessionSettings {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.ttl_minutes))
    }

    pub fn remember_me_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.remember_me_days))
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Settings {
    /// Check settings for values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            bail!("log_level must be one of {LOG_LEVELS:?}, got {:?}", self.log_level);
        }

        if self.public_base_url.trim().is_empty() {
            bail!("public_base_url must not be empty");
        }

        let min_length = self.password.requirements.min_length;
        if !(MIN_PASSWORD_LENGTH..=crate::auth::password::MAX_PASSWORD_LENGTH).contains(&min_length) {
            bail!("password.requirements.min_length must be at least {MIN_PASSWORD_LENGTH}");
        }
        if self.password.hasher().is_err() {
            bail!("password scrypt parameters are out of range");
        }

        if self.reset.token_ttl_minutes == 0 || self.reset.sweep_interval_secs == 0 {
            bail!("reset token ttl and sweep interval must be positive");
        }

        if self.session.ttl_minutes == 0
            || self.session.remember_me_days == 0
            || self.session.cleanup_interval_secs == 0
        {
            bail!("session ttl values and cleanup interval must be positive");
        }

        if self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0 {
            bail!("rate_limit values must be positive");
        }

        if self.auth_rate_limit.max_attempts == 0 || self.auth_rate_limit.lockout_secs == 0 {
            bail!("auth_rate_limit values must be positive");
        }

        if self
            .mail
            .smtp_host
            .as_deref()
            .is_some_and(|host| host.trim().is_empty())
        {
            bail!("mail.smtp_host must not be blank when set");
        }

        Ok(())
    }
}

/// Load and validate settings
pub fn load_settings(config_file: Option<&Path>) -> Result<Settings> {
    let file = config_file.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    if config_file.is_some() && !file.exists() {
        bail!("config file {} does not exist", file.display());
    }

    let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
        .merge(Toml::file(file))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;

    settings.validate()?;
    Ok(settings)
}
