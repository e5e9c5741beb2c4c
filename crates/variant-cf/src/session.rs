//! Control-plane session cache
//!
//! A session is a bearer token with a fixed two-hour lifetime. The HTTP
//! client refreshes it through [`Session::is_expired`] checks before every
//! authenticated call; a failed refresh resets the expiry to "now" so the
//! next call retries immediately instead of reusing a stale handle.

use std::time::{Duration, Instant};

/// Fixed session lifetime from issue
pub const SESSION_TTL: Duration = Duration::from_secs(7200);

/// An authenticated control-plane session
#[derive(Debug, Clone)]
pub struct Session {
    /// Bearer token for the CF API and networking API
    pub token: String,
    /// When the session stops being usable
    pub expires_at: Instant,
}

impl Session {
    /// A fresh session expiring [`SESSION_TTL`] from now.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: Instant::now() + SESSION_TTL,
        }
    }

    /// Whether the session has passed its expiry.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Force the session to be considered expired so the next accessor
    /// refreshes it.
    pub fn expire_now(&mut self) {
        self.expires_at = Instant::now();
    }
}
