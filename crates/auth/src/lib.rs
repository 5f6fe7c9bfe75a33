//! The auth handler contract.
//!
//! The pipeline never decides permissions itself: for every request it asks
//! an [`AuthHandler`] to turn (resource, provider, action, caller
//! credentials) into an [`AuthBundle`] of backend credentials and settings.
//! The handler is pluggable; deployments fronting a real authority
//! implement the trait against it, while [`StaticAuthHandler`] serves
//! config-driven deployments and tests.
//!
//! Credential bundles are request-scoped: the core never logs them and
//! never persists them.

pub mod error;
mod static_auth;

pub use crate::static_auth::{ProviderGrant, ResourceAuth, StaticAuthHandler};

use crate::error::Result;
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;

/// A shareable auth handler instance.
pub type AuthHandle = Arc<dyn AuthHandler>;

/// The permission category of a request, inferred by the pipeline from the
/// HTTP method and parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    /// Metadata, listings, downloads, revisions, zip
    Read,
    /// Uploads, folder creation, renames, incoming copies
    Write,
    /// Deletes
    Delete,
    /// Reading the source side of a cross-resource transfer
    CopyFrom,
    /// Writing the destination side of a cross-resource transfer
    CopyTo,
}

impl AuthAction {
    /// Whether the action mutates the target resource.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Read | Self::CopyFrom)
    }
}

/// The caller's raw credentials, forwarded opaquely from the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct RequestCredentials {
    /// `Authorization: Bearer <token>`
    pub bearer: Option<String>,
    /// `Authorization: Basic <base64>`, still encoded
    pub basic: Option<String>,
    /// The session cookie value, if any
    pub cookie: Option<String>,
    /// The `view_only` query parameter, relayed as-is
    pub view_only: Option<String>,
    /// Client address, for handlers that care
    pub ip: Option<IpAddr>,
}

/// What an auth authority hands back for one (resource, provider, action):
/// opaque per-provider documents plus the caller's identity for
/// notifications.
#[derive(Debug, Clone)]
pub struct AuthBundle {
    /// Backend credentials (tokens, keys); opaque to the core.
    pub credentials: serde_json::Value,
    /// Backend settings (roots, buckets, folders); opaque to the core.
    pub settings: serde_json::Value,
    /// Who the caller is, as far as the authority knows.
    pub identity: serde_json::Value,
}

#[async_trait]
pub trait AuthHandler: Send + Sync {
    /// Resolve credentials and settings for one request.
    ///
    /// Fails `Unauthorized` for invalid tokens, `Forbidden` for valid
    /// tokens without permission, `NotFound` when the resource does not
    /// exist.
    async fn fetch(
        &self,
        resource: &str,
        provider: &str,
        action: AuthAction,
        credentials: &RequestCredentials,
    ) -> Result<AuthBundle>;
}
