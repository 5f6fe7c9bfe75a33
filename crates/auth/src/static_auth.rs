//! Config-driven auth handler.

use crate::error::{ErrorKind, Result};
use crate::{AuthAction, AuthBundle, AuthHandler, RequestCredentials};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

/// Credentials and settings for one provider mount under a resource.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderGrant {
    pub credentials: serde_json::Value,
    pub settings: serde_json::Value,
}

/// Access rules for one resource.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResourceAuth {
    /// Bearer token granting full access. `None` leaves the resource open
    /// (useful for local deployments and tests).
    pub token: Option<String>,
    /// A read-only capability token, matched against the `view_only`
    /// query parameter.
    pub view_only: Option<String>,
    /// Provider mounts available under this resource.
    pub providers: HashMap<String, ProviderGrant>,
}

/// An [`AuthHandler`] whose whole world is a config file.
///
/// Deployments fronting a real authority replace this with a handler that
/// calls out to it; the contract is the same.
pub struct StaticAuthHandler {
    resources: HashMap<String, ResourceAuth>,
}

impl StaticAuthHandler {
    pub fn new(resources: HashMap<String, ResourceAuth>) -> Self {
        Self { resources }
    }
}

#[async_trait]
impl AuthHandler for StaticAuthHandler {
    async fn fetch(
        &self,
        resource: &str,
        provider: &str,
        action: AuthAction,
        credentials: &RequestCredentials,
    ) -> Result<AuthBundle> {
        let rules = self
            .resources
            .get(resource)
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(resource.to_string())))?;

        let identity = match &rules.token {
            None => serde_json::json!({ "id": "anonymous" }),
            Some(expected) => {
                let bearer_ok = credentials.bearer.as_deref() == Some(expected.as_str());
                let view_only_ok = rules.view_only.is_some() && credentials.view_only == rules.view_only;
                if bearer_ok {
                    serde_json::json!({ "id": "token-holder" })
                } else if view_only_ok {
                    if action != AuthAction::Read && action != AuthAction::CopyFrom {
                        exn::bail!(ErrorKind::Forbidden(format!(
                            "view-only access to '{resource}' cannot modify it"
                        )));
                    }
                    serde_json::json!({ "id": "view-only" })
                } else if credentials.bearer.is_some() || credentials.view_only.is_some() {
                    exn::bail!(ErrorKind::Unauthorized(format!("invalid credentials for '{resource}'")));
                } else {
                    exn::bail!(ErrorKind::Unauthorized(format!("credentials required for '{resource}'")));
                }
            },
        };

        let grant = rules
            .providers
            .get(provider)
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(format!("{resource}/{provider}"))))?;

        Ok(AuthBundle { credentials: grant.credentials.clone(), settings: grant.settings.clone(), identity })
    }
}
