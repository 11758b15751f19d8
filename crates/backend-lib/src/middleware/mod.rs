// crates/backend-lib/src/middleware/mod.rs

//! Request middleware and extractors.

pub mod rate_limit;
pub mod session;

pub use rate_limit::{client_ip, rate_limit, ClientIp, RateLimiter};
pub use session::{session_token, CurrentUser, SESSION_COOKIE};
