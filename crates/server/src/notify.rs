//! Post-mutation notification hook.
//!
//! After a successful mutating action the pipeline fires one event at the
//! configured [`Notifier`], detached from the request: the response never
//! waits for it and never sees its failures. The queue or webhook behind a
//! real deployment lives outside this crate; the bundled implementation
//! just logs.

use async_trait::async_trait;
use std::sync::Arc;

/// What happened, to whom, by whom.
#[derive(Debug, Clone)]
pub struct NotifyEvent {
    /// `create`, `create_folder`, `update`, `move`, `copy` or `delete`.
    pub action: &'static str,
    pub resource: String,
    pub provider: String,
    pub path: String,
    /// JSON-API document of the resulting entity, where one exists.
    pub metadata: Option<serde_json::Value>,
    /// Caller identity as reported by the auth handler.
    pub identity: serde_json::Value,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: NotifyEvent);
}

/// Fire an event without tying it to the request's lifetime.
pub fn dispatch(notifier: &Arc<dyn Notifier>, event: NotifyEvent) {
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        notifier.notify(event).await;
    });
}

/// The default sink: a structured log line per mutation.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: NotifyEvent) {
        tracing::info!(
            action = event.action,
            resource = %event.resource,
            provider = %event.provider,
            path = %event.path,
            "file action",
        );
    }
}
