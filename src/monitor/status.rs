use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use log::{error, warn};

use super::format::{TIMESTAMP_FORMAT, escape_markdown};
use super::types::ContainerSnapshot;
use crate::cache::{Cache, NOTIFICATION_COUNT_KEY, STATUS_CACHE_KEY};
use crate::runtime::{ContainerRuntime, RuntimeError};

pub const STATUS_CACHE_TTL: Duration = Duration::from_secs(30);

pub const NO_CONTAINERS_MESSAGE: &str = "No containers found.";
pub const QUERY_ERROR_MESSAGE: &str = "❌ An error occurred while checking the containers.";
pub const STATS_FALLBACK_MESSAGE: &str = "Bot started. Use /status to list containers.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub notifications: i64,
    pub active_containers: usize,
}

/// Answers operator queries about the current containers.
#[derive(Clone)]
pub struct StatusQueryService {
    runtime: Arc<dyn ContainerRuntime>,
    cache: Option<Arc<dyn Cache>>,
}

impl StatusQueryService {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, cache: Option<Arc<dyn Cache>>) -> Self {
        Self { runtime, cache }
    }

    /// Lists every container, stopped ones included. Repeated calls within
    /// [`STATUS_CACHE_TTL`] are served from the cache when one is configured.
    pub async fn list_status(&self) -> String {
        match self.try_list_status().await {
            Ok(status) => status,
            Err(e) => {
                error!("Unable to list containers: {e}");
                QUERY_ERROR_MESSAGE.to_string()
            }
        }
    }

    async fn try_list_status(&self) -> Result<String, RuntimeError> {
        if let Some(cache) = &self.cache {
            match cache.get(STATUS_CACHE_KEY).await {
                Ok(Some(cached)) => return Ok(cached),
                Ok(None) => {}
                Err(e) => warn!("Status cache unavailable: {e}"),
            }
        }

        let containers = self.runtime.list_containers(true).await?;
        if containers.is_empty() {
            return Ok(NO_CONTAINERS_MESSAGE.to_string());
        }

        let status = render_status(&containers, Local::now());
        if let Some(cache) = &self.cache {
            if let Err(e) = cache
                .set_with_ttl(STATUS_CACHE_KEY, &status, STATUS_CACHE_TTL)
                .await
            {
                warn!("Unable to cache container status: {e}");
            }
        }
        Ok(status)
    }

    pub async fn stats(&self) -> Result<Stats, RuntimeError> {
        let notifications = self.notification_count().await;
        let active_containers = self.runtime.count_running().await?;
        Ok(Stats {
            notifications,
            active_containers,
        })
    }

    /// Statistics summary, or a plain acknowledgement if the runtime cannot
    /// be queried.
    pub async fn render_stats(&self) -> String {
        match self.stats().await {
            Ok(stats) => format!(
                "🤖 *Docker Monitor Bot*\n\n\
                 📊 Statistics:\n\
                 • Notifications sent: {}\n\
                 • Active containers: {}\n\n\
                 Use /status to list the containers",
                stats.notifications, stats.active_containers
            ),
            Err(e) => {
                error!("Unable to collect statistics: {e}");
                STATS_FALLBACK_MESSAGE.to_string()
            }
        }
    }

    async fn notification_count(&self) -> i64 {
        let Some(cache) = &self.cache else {
            return 0;
        };
        match cache.get(NOTIFICATION_COUNT_KEY).await {
            Ok(value) => value.and_then(|v| v.parse().ok()).unwrap_or(0),
            Err(e) => {
                warn!("Unable to read notification counter: {e}");
                0
            }
        }
    }
}

pub fn render_status(containers: &[ContainerSnapshot], at: DateTime<Local>) -> String {
    let mut lines = Vec::with_capacity(containers.len() + 1);
    lines.push(format!(
        "📊 *Container status* (updated at {})\n",
        at.format(TIMESTAMP_FORMAT)
    ));
    for container in containers {
        lines.push(format!(
            "• *{}* (`{}`)\n  ⚙️ *Status:* {}\n  🖥 *Image:* {}\n",
            escape_markdown(container.name.as_deref().unwrap_or(&container.short_id)),
            container.short_id,
            container.health_or_state(),
            escape_markdown(container.image_or_default()),
        ));
    }
    lines.join("\n")
}
