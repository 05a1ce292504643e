use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};

use super::format::format_snapshot;
use super::types::{ContainerAction, ContainerSnapshot};
use crate::cache::{Cache, NOTIFICATION_COUNT_KEY};
use crate::notify::Notifier;

/// Turns notification-worthy events into chat messages.
///
/// Every event that reaches the gate produces at most one send attempt.
/// When a suppression window is configured and a cache is available,
/// repeated `(container, action)` pairs inside the window are dropped.
#[derive(Clone)]
pub struct NotificationGate {
    notifier: Arc<dyn Notifier>,
    chat_id: i64,
    cache: Option<Arc<dyn Cache>>,
    suppress_window: Option<Duration>,
}

impl NotificationGate {
    pub fn new(notifier: Arc<dyn Notifier>, chat_id: i64, cache: Option<Arc<dyn Cache>>) -> Self {
        Self {
            notifier,
            chat_id,
            cache,
            suppress_window: None,
        }
    }

    pub fn with_suppression(mut self, window: Duration) -> Self {
        self.suppress_window = (!window.is_zero()).then_some(window);
        self
    }

    pub async fn process(&self, snapshot: &ContainerSnapshot, action: &ContainerAction) {
        let label = action.policy().label;
        let Some(message) = format_snapshot(snapshot, label) else {
            error!(
                "Unable to format notification for container {}: no name",
                snapshot.short_id
            );
            return;
        };

        if self.is_suppressed(snapshot, action).await {
            debug!(
                "Suppressed repeated {} notification for {}",
                action.as_ref(),
                snapshot.short_id
            );
            return;
        }

        if let Err(e) = self.notifier.send_message(self.chat_id, &message).await {
            error!("Failed to send notification for {}: {e}", snapshot.short_id);
            return;
        }
        self.open_window(snapshot, action).await;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.increment(NOTIFICATION_COUNT_KEY).await {
                debug!("Unable to increment notification counter: {e}");
            }
        }
    }

    fn window_key(snapshot: &ContainerSnapshot, action: &ContainerAction) -> String {
        format!("notification:{}:{}", snapshot.id, action.as_ref())
    }

    async fn is_suppressed(&self, snapshot: &ContainerSnapshot, action: &ContainerAction) -> bool {
        let (Some(cache), Some(_)) = (&self.cache, self.suppress_window) else {
            return false;
        };

        match cache.get(&Self::window_key(snapshot, action)).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                warn!("Suppression lookup failed, sending anyway: {e}");
                false
            }
        }
    }

    /// Only delivered notifications start a suppression window.
    async fn open_window(&self, snapshot: &ContainerSnapshot, action: &ContainerAction) {
        let (Some(cache), Some(window)) = (&self.cache, self.suppress_window) else {
            return;
        };

        let key = Self::window_key(snapshot, action);
        if let Err(e) = cache.set_with_ttl(&key, "1", window).await {
            warn!("Unable to record suppression window: {e}");
        }
    }
}
