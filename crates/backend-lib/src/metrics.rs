// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for Prometheus metric keys
pub const ACCOUNT_REGISTERED: &str = "account.registered";
pub const LOGIN_SUCCEEDED: &str = "login.succeeded";
pub const LOGIN_FAILED: &str = "login.failed";
pub const LOGIN_LOCKED_OUT: &str = "login.locked_out";
pub const PASSWORD_CHANGED: &str = "password.changed";
pub const PASSWORD_RESET: &str = "password.reset";
pub const CREDENTIAL_UPGRADED: &str = "credential.upgraded";
pub const RESET_TOKEN_ISSUED: &str = "reset_token.issued";
pub const RESET_TOKEN_CONSUMED: &str = "reset_token.consumed";
pub const RESET_TOKEN_EXPIRED: &str = "reset_token.expired";
pub const RESET_TOKEN_ACTIVE: &str = "reset_token.active";
pub const SESSION_CREATED: &str = "session.created";
pub const SESSION_EXPIRED: &str = "session.expired";
pub const SESSION_ACTIVE: &str = "session.active";
pub const MAIL_SENT: &str = "mail.sent";
pub const MAIL_FAILED: &str = "mail.failed";
