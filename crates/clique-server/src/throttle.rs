//! Per-address throttling for credential endpoints.
//!
//! Register and login take an Argon2 hashing hit per attempt, so they get
//! a fixed-window counter per client address.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio::sync::Mutex;
use tracing::warn;

struct Window {
    started: Instant,
    attempts: u32,
}

/// Fixed-window attempt counter keyed by client IP.
#[derive(Clone)]
pub struct CredentialThrottle {
    windows: Arc<Mutex<HashMap<IpAddr, Window>>>,
    max_attempts: u32,
    window: Duration,
}

impl CredentialThrottle {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            max_attempts,
            window,
        }
    }

    /// Record one attempt from `ip` and report whether it is allowed.
    pub async fn check(&self, ip: IpAddr) -> bool {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();

        let entry = windows.entry(ip).or_insert(Window {
            started: now,
            attempts: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.attempts = 0;
        }

        entry.attempts += 1;
        entry.attempts <= self.max_attempts
    }

    /// Drop windows that have been idle past their duration. Called
    /// periodically so the map does not grow with one entry per address
    /// ever seen.
    pub async fn purge_stale(&self) {
        let mut windows = self.windows.lock().await;
        let window = self.window;
        let before = windows.len();
        windows.retain(|_, w| w.started.elapsed() < window);
        let purged = before - windows.len();
        if purged > 0 {
            tracing::debug!(purged, "purged stale throttle windows");
        }
    }
}

impl Default for CredentialThrottle {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(60))
    }
}

/// Axum middleware enforcing the throttle on the routes it wraps.
pub async fn credential_throttle_middleware(
    State(throttle): State<CredentialThrottle>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if !throttle.check(addr.ip()).await {
        warn!(ip = %addr.ip(), "credential endpoint throttled");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({ "error": "Too many attempts, slow down" })),
        )
            .into_response();
    }
    next.run(request).await
}
