//! The sluice HTTP gateway.
//!
//! One resource-oriented API over heterogeneous storage backends:
//! `/v1/resources/{resource}/providers/{provider}/{id_or_path}`. This crate
//! wires the pipeline together — rate limiter, auth handler, provider
//! registry, action handlers, response shaping — and exposes [`app`] as a
//! plain `Router` so tests can drive it with `tower::ServiceExt`.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod metrics;
pub mod notify;
pub mod registry;
pub mod response;

use crate::config::ServerConfig;
use crate::metrics::{AtomicMetrics, MetricsSink};
use crate::notify::{LogNotifier, Notifier};
use crate::registry::ProviderRegistry;
use axum::routing::{any, get};
use axum::Router;
use sluice_auth::{AuthHandle, StaticAuthHandler};
use sluice_limiter::{MemoryStore, RateLimitConfig, RateLimiter, SqliteStore, StoreHandle};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

/// Everything the handlers share. All fields are handles; cloning is cheap
/// and per-request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub auth: AuthHandle,
    pub limiter: Arc<RateLimiter>,
    pub registry: Arc<ProviderRegistry>,
    pub metrics: Arc<dyn MetricsSink>,
    pub notifier: Arc<dyn Notifier>,
}

/// Build the default state for a config: static auth from the config's
/// resource table, SQLite or in-process rate-limit counters, log
/// notifications, atomic metrics.
pub async fn build_state(config: ServerConfig) -> std::io::Result<AppState> {
    let store: StoreHandle = match &config.rate_limiting.store_path {
        Some(path) => Arc::new(SqliteStore::connect(path).await.map_err(std::io::Error::other)?),
        None => Arc::new(MemoryStore::new()),
    };
    let limiter = RateLimiter::new(
        store,
        RateLimitConfig {
            enabled: config.rate_limiting.enabled,
            limit: config.rate_limiting.limit,
            window: Duration::from_secs(config.rate_limiting.window_seconds),
        },
    );
    let auth: AuthHandle = Arc::new(StaticAuthHandler::new(config.resources.clone()));

    Ok(AppState {
        config: Arc::new(config),
        auth,
        limiter: Arc::new(limiter),
        registry: Arc::new(ProviderRegistry::new()),
        metrics: Arc::new(AtomicMetrics::new()),
        notifier: Arc::new(LogNotifier),
    })
}

/// The gateway router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/status", get(handlers::status::status))
        // The root folder is the empty id-or-path with a trailing slash;
        // everything else lands on the wildcard.
        .route("/v1/resources/{resource}/providers/{provider}/", any(handlers::provider_root))
        .route("/v1/resources/{resource}/providers/{provider}/{*path}", any(handlers::provider_entry))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
