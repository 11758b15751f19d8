use crate::{error::AppError, AppState};
use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Fixed-window request counter per client IP
#[derive(Debug)]
pub struct RateLimiter {
    entries: DashMap<IpAddr, RateLimitEntry>,
    window: Duration,
    max_requests: u32,
}

/// Rate limit entry for a client
#[derive(Debug)]
struct RateLimitEntry {
    requests: u32,
    window_start: Instant,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            entries: DashMap::new(),
            window,
            max_requests,
        }
    }

    /// Count a request from `ip`, returning whether it is within the limit
    pub fn check(&self, ip: IpAddr) -> bool {
        let mut entry = self.entries.entry(ip).or_insert_with(|| RateLimitEntry {
            requests: 0,
            window_start: Instant::now(),
        });

        if entry.window_start.elapsed() > self.window {
            entry.requests = 0;
            entry.window_start = Instant::now();
        }

        if entry.requests >= self.max_requests {
            return false;
        }

        entry.requests += 1;
        true
    }

    /// Forget clients whose window has lapsed
    pub fn cleanup(&self) {
        self.entries
            .retain(|_, entry| entry.window_start.elapsed() <= self.window);
    }
}

/// Rate limiter middleware
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>(),
        state.settings.rate_limit.trust_proxy_headers,
    );

    if !state.rate_limiter.check(ip) {
        tracing::warn!(%ip, path = %request.uri().path(), "request rate limit exceeded");
        return Err(AppError::RateLimitExceeded);
    }

    Ok(next.run(request).await)
}

/** Address a request is attributed to for rate limiting and lockouts.
Proxy headers are read only when `trust_proxy_headers` is set; otherwise
they are client-controlled and ignored.
# Arguments
* `headers` - Request headers
* `peer` - Socket peer, present when served with connect info
* `trust_proxy_headers` - Prefer `X-Forwarded-For`, then `X-Real-IP` */
pub fn client_ip(
    headers: &HeaderMap,
    peer: Option<&ConnectInfo<SocketAddr>>,
    trust_proxy_headers: bool,
) -> IpAddr {
    let proxied = || -> Option<IpAddr> {
        let forwarded: Option<IpAddr> = headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok());

        forwarded.or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
        })
    };

    trust_proxy_headers
        .then(proxied)
        .flatten()
        .or_else(|| peer.map(|ConnectInfo(addr)| addr.ip()))
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Extractor for the client address as seen by [`client_ip`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

impl FromRequestParts<Arc<AppState>> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(
            &parts.headers,
            parts.extensions.get::<ConnectInfo<SocketAddr>>(),
            state.settings.rate_limit.trust_proxy_headers,
        )))
    }
}
