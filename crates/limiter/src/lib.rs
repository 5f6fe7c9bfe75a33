//! Fixed-window rate limiting for the sluice gateway.
//!
//! Each request is classified by its strongest credential (bearer token,
//! then basic auth, then cookie, then nothing) and counted against a
//! per-credential key in a shared [`CounterStore`]. Cookie-only requests
//! bypass the limiter entirely so interactive users are never throttled;
//! anonymous requests are keyed by client address. Credential values never
//! reach the store — keys carry a SHA-256 of the value, nothing reversible.

pub mod error;

mod db;
mod store;

pub use crate::db::SqliteStore;
pub use crate::store::{CounterStore, Hit, MemoryStore, StoreHandle};

use crate::error::Result;
use sha2::{Digest, Sha256};
use sluice_auth::RequestCredentials;
use std::time::Duration;

/// How a request authenticated, for rate-limiting purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialClass {
    Cookie,
    Bearer,
    Basic,
    None,
}

/// Classify a request's credentials. Priority is bearer > basic > cookie:
/// a cookie only earns its bypass when it is the sole credential presented.
pub fn classify(credentials: &RequestCredentials) -> CredentialClass {
    if credentials.bearer.is_some() {
        CredentialClass::Bearer
    } else if credentials.basic.is_some() {
        CredentialClass::Basic
    } else if credentials.cookie.is_some() {
        CredentialClass::Cookie
    } else {
        CredentialClass::None
    }
}

fn obfuscate(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// The store key for a classified request, or `None` when the class
/// bypasses limiting.
fn derive_key(credentials: &RequestCredentials) -> Option<String> {
    match classify(credentials) {
        CredentialClass::Bearer => {
            Some(format!("token:{}", obfuscate(credentials.bearer.as_deref().unwrap_or_default())))
        },
        CredentialClass::Basic => {
            Some(format!("basic:{}", obfuscate(credentials.basic.as_deref().unwrap_or_default())))
        },
        CredentialClass::Cookie => None,
        CredentialClass::None => {
            let ip = credentials.ip.map(|ip| ip.to_string()).unwrap_or_else(|| "unknown".to_string());
            Some(format!("none:{}", obfuscate(&ip)))
        },
    }
}

/// Limiter settings; the defaults allow one request per second on average
/// over an hour-long window.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub limit: u64,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { enabled: false, limit: 3600, window: Duration::from_secs(3600) }
    }
}

/// The limiter's answer for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Limiting is disabled, or the credential class is exempt.
    Bypass,
    /// Under the limit; carries the numbers for informational headers.
    Allow { limit: u64, remaining: u64, resets_in: Duration },
    /// Over the limit; refuse with 429 and `Retry-After`.
    Limit { limit: u64, retry_after: Duration },
}

/// Fixed-window rate limiter over a shared counter store.
pub struct RateLimiter {
    store: StoreHandle,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: StoreHandle, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// Count this request and decide whether it may proceed.
    ///
    /// A store failure is an error, not a pass: when limiting is enabled
    /// the gateway refuses (503) rather than running unthrottled.
    pub async fn check(&self, credentials: &RequestCredentials) -> Result<Verdict> {
        if !self.config.enabled {
            return Ok(Verdict::Bypass);
        }
        let Some(key) = derive_key(credentials) else {
            return Ok(Verdict::Bypass);
        };
        let hit = self.store.increment(&key, self.config.window).await?;
        if hit.count > self.config.limit {
            tracing::info!(key = %key, count = hit.count, "rate limit exceeded");
            return Ok(Verdict::Limit { limit: self.config.limit, retry_after: hit.resets_in });
        }
        Ok(Verdict::Allow {
            limit: self.config.limit,
            remaining: self.config.limit - hit.count,
            resets_in: hit.resets_in,
        })
    }
}
