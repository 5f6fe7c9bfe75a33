//! The provider endpoint: one dispatcher, method-specific modules.
//!
//! `/v1/resources/{resource}/providers/{provider}/{id_or_path}` is a single
//! logical handler dispatched by HTTP method crossed with query
//! parameters, so the per-request order is identical for every action:
//! rate limiter, credential extraction, auth handler, provider
//! construction, path validation, action, response shaping, notification.

pub mod create;
pub mod fetch;
pub mod movecopy;
pub mod status;

use crate::error::ApiError;
use crate::extract;
use crate::AppState;
use axum::extract::connect_info::ConnectInfo;
use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use sluice_auth::{AuthAction, AuthBundle, RequestCredentials};
use sluice_limiter::Verdict;
use sluice_provider::ProviderHandle;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

/// Everything the action modules need about the current request.
pub struct RequestContext {
    pub state: AppState,
    pub resource: String,
    pub provider_name: String,
    pub raw_path: String,
    pub params: HashMap<String, String>,
    pub credentials: RequestCredentials,
}

impl RequestContext {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Bare query flags (`?zip=`, `?meta=`, `?direct`) count by presence.
    pub fn flag(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// `version` beats `revision`.
    pub fn version_param(&self) -> Option<&str> {
        self.param("version").or_else(|| self.param("revision"))
    }

    pub fn domain(&self) -> &str {
        &self.state.config.server.domain
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.state.config.transfers.inactivity_timeout_seconds)
    }

    /// Run the auth handler for this request and build the provider bound
    /// to the returned bundle.
    pub async fn bundle_and_provider(&self, action: AuthAction) -> Result<(AuthBundle, ProviderHandle), ApiError> {
        let bundle = self.state.auth.fetch(&self.resource, &self.provider_name, action, &self.credentials).await?;
        let provider = self.state.registry.make(&self.provider_name, &bundle)?;
        Ok((bundle, provider))
    }
}

/// Route entry for the provider root (`.../providers/{provider}/`).
pub async fn provider_root(
    State(state): State<AppState>,
    Path((resource, provider)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    request: Request,
) -> Response {
    dispatch(state, resource, provider, "/".to_string(), params, request).await
}

/// Route entry for everything below the root.
pub async fn provider_entry(
    State(state): State<AppState>,
    Path((resource, provider, rest)): Path<(String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
    request: Request,
) -> Response {
    let raw_path = format!("/{rest}");
    dispatch(state, resource, provider, raw_path, params, request).await
}

async fn dispatch(
    state: AppState,
    resource: String,
    provider_name: String,
    raw_path: String,
    params: HashMap<String, String>,
    request: Request,
) -> Response {
    state.metrics.record_request();
    // Present when served with connect info; absent under test drivers.
    let client_ip = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| addr.ip());
    let credentials = extract::credentials(
        request.headers(),
        params.get("cookie").map(String::as_str),
        params.get("view_only").map(String::as_str),
        client_ip,
    );
    let metrics = state.metrics.clone();

    let result = route(state, credentials, resource, provider_name, raw_path, params, request).await;
    match result {
        Ok(response) => response,
        Err(err) => {
            metrics.record_error(err.status.as_u16());
            err.into_response()
        },
    }
}

async fn route(
    state: AppState,
    credentials: RequestCredentials,
    resource: String,
    provider_name: String,
    raw_path: String,
    params: HashMap<String, String>,
    request: Request,
) -> Result<Response, ApiError> {
    match state.limiter.check(&credentials).await? {
        Verdict::Limit { limit, retry_after } => {
            state.metrics.record_rate_limited();
            return Ok(rate_limited_response(limit, retry_after));
        },
        Verdict::Allow { .. } | Verdict::Bypass => {},
    }

    let method = request.method().clone();
    let headers = request.headers().clone();
    let ctx = RequestContext { state, resource, provider_name, raw_path, params, credentials };

    match method {
        Method::GET => fetch::get(&ctx, &headers).await,
        Method::HEAD => fetch::head(&ctx).await,
        Method::PUT => create::put(&ctx, request).await,
        Method::POST => movecopy::post(&ctx, request).await,
        Method::DELETE => delete(&ctx).await,
        other => Err(ApiError::method_not_allowed(&other)),
    }
}

async fn delete(ctx: &RequestContext) -> Result<Response, ApiError> {
    let (bundle, provider) = ctx.bundle_and_provider(AuthAction::Delete).await?;
    let path = provider.validate_v1_path(&ctx.raw_path).await?;
    let confirm = matches!(ctx.param("confirm_delete"), Some("1") | Some("true"));
    provider.delete(&path, confirm).await?;

    crate::notify::dispatch(
        &ctx.state.notifier,
        crate::notify::NotifyEvent {
            action: "delete",
            resource: ctx.resource.clone(),
            provider: ctx.provider_name.clone(),
            path: path.materialized(),
            metadata: None,
            identity: bundle.identity,
        },
    );
    Ok(StatusCode::NO_CONTENT.into_response())
}

fn rate_limited_response(limit: u64, retry_after: Duration) -> Response {
    let retry_secs = retry_after.as_secs().max(1);
    let reset_epoch = time::OffsetDateTime::now_utc().unix_timestamp() + retry_secs as i64;
    let body = json!({ "code": "RateLimited", "message": "rate limit exceeded, retry later" });
    (
        StatusCode::TOO_MANY_REQUESTS,
        [
            ("Retry-After", retry_secs.to_string()),
            ("X-RateLimit-Limit", limit.to_string()),
            ("X-RateLimit-Remaining", "0".to_string()),
            ("X-RateLimit-Reset", reset_epoch.to_string()),
        ],
        Json(body),
    )
        .into_response()
}

pub(crate) fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers.get(axum::http::header::CONTENT_LENGTH)?.to_str().ok()?.parse().ok()
}
