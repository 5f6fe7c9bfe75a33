//! Per-request provider construction.
//!
//! The registry turns a provider name plus the auth handler's settings
//! bundle into a fresh [`ProviderHandle`]. Instances are request-scoped;
//! the only thing that outlives them here is the backing tree of each
//! memory mount, which the registry owns so that uploads survive between
//! requests the way they would on a real backend.

use crate::error::ApiError;
use axum::http::StatusCode;
use sluice_auth::AuthBundle;
use sluice_provider::backend::{FilesystemProvider, MemoryProvider, MemoryTree};
use sluice_provider::ProviderHandle;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct ProviderRegistry {
    memory_mounts: Mutex<HashMap<String, Arc<MemoryTree>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a provider bound to this request's settings bundle.
    pub fn make(&self, provider: &str, bundle: &AuthBundle) -> Result<ProviderHandle, ApiError> {
        match provider {
            "filesystem" => {
                let folder = bundle.settings.get("folder").and_then(|v| v.as_str()).ok_or_else(|| {
                    ApiError::new(
                        StatusCode::SERVICE_UNAVAILABLE,
                        "ServiceUnavailable",
                        "filesystem mount is missing its 'folder' setting",
                    )
                })?;
                let instance = FilesystemProvider::new(folder)?;
                Ok(Arc::new(instance))
            },
            "memory" => {
                let mount = bundle.settings.get("mount").and_then(|v| v.as_str()).unwrap_or("default");
                let tree = {
                    let mut mounts = self.memory_mounts.lock().expect("memory mounts poisoned");
                    Arc::clone(mounts.entry(mount.to_string()).or_default())
                };
                Ok(Arc::new(MemoryProvider::new(tree, mount)))
            },
            other => Err(ApiError::provider_not_found(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle(settings: serde_json::Value) -> AuthBundle {
        AuthBundle { credentials: json!({}), settings, identity: json!({}) }
    }

    #[test]
    fn test_unknown_provider_is_404() {
        let registry = ProviderRegistry::new();
        let err = registry.make("gopherdrive", &bundle(json!({}))).unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_memory_mounts_are_shared_by_name() {
        let registry = ProviderRegistry::new();
        let one = registry.make("memory", &bundle(json!({"mount": "m1"}))).unwrap();
        let two = registry.make("memory", &bundle(json!({"mount": "m1"}))).unwrap();
        let other = registry.make("memory", &bundle(json!({"mount": "m2"}))).unwrap();
        assert!(one.shares_storage_root(two.as_ref()));
        assert!(!one.shares_storage_root(other.as_ref()));
    }

    #[test]
    fn test_filesystem_requires_folder_setting() {
        let registry = ProviderRegistry::new();
        let err = registry.make("filesystem", &bundle(json!({}))).unwrap_err();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
