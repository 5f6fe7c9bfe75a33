//! Error translation: every failure becomes `{code, message, data?}` with a
//! fixed status, and nothing from a backend leaks through raw.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// A request-fatal error, ready to serialise.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into(), data: None }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// 400 for malformed parameters and bodies.
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "InvalidArgument", message)
    }

    /// Like [`invalid_parameters`](Self::invalid_parameters) but with an
    /// explicit status (411 Length Required, 409 kind clash, 413 oversize).
    pub fn invalid_parameters_with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(status, "InvalidArgument", message)
    }

    pub fn method_not_allowed(method: &axum::http::Method) -> Self {
        Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            "NotSupported",
            format!("method {method} is not supported on this endpoint"),
        )
    }

    pub fn provider_not_found(provider: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NotFound", format!("provider '{provider}' not found"))
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "ServiceUnavailable", message)
    }
}

impl From<sluice_provider::error::Error> for ApiError {
    fn from(err: sluice_provider::error::Error) -> Self {
        use sluice_provider::error::ErrorKind;
        let kind = &*err;
        let status = StatusCode::from_u16(kind.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut api = ApiError::new(status, kind.code(), kind.to_string());
        if let ErrorKind::NamingConflict(name) = kind {
            api = api.with_data(json!({ "conflicting_name": name }));
        }
        if status.is_server_error() {
            tracing::error!(error = %err, "storage error");
            // Internal detail stays in the log.
            api.message = "an internal error occurred".to_string();
            if matches!(kind, ErrorKind::HashMismatch { .. }) {
                api.message = "transfer verification failed".to_string();
            }
        }
        api
    }
}

impl From<sluice_auth::error::Error> for ApiError {
    fn from(err: sluice_auth::error::Error) -> Self {
        let kind = &*err;
        let status = StatusCode::from_u16(kind.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        ApiError::new(status, kind.code(), kind.to_string())
    }
}

impl From<sluice_limiter::error::Error> for ApiError {
    fn from(err: sluice_limiter::error::Error) -> Self {
        tracing::error!(error = %err, "rate-limit store error");
        ApiError::service_unavailable("rate limiting is enabled but its store is unreachable")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({ "code": self.code, "message": self.message });
        if let Some(data) = self.data {
            body["data"] = data;
        }
        (self.status, Json(body)).into_response()
    }
}
