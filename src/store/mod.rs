pub mod buffer;
pub mod delta;
pub mod schema;
pub mod writer;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deltalake::DeltaTableError;
use serde::{Deserialize, Serialize};

use crate::monitor::types::{ContainerAction, ContainerSnapshot};

pub use delta::DeltaEventStore;
pub use writer::EventWriter;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Delta Lake error: {0}")]
    Delta(#[from] DeltaTableError),
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),
}

/// One processed container event. Records are only ever appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub container_id: String,
    pub name: String,
    pub action: String,
    pub status: String,
    pub image: Option<String>,
    /// Timestamp in microseconds (UTC)
    pub timestamp: i64,
}

impl EventRecord {
    pub fn from_snapshot(
        snapshot: &ContainerSnapshot,
        action: &ContainerAction,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            container_id: snapshot.id.clone(),
            name: snapshot.name.clone().unwrap_or_default(),
            action: action.as_ref().to_string(),
            status: snapshot.state.as_ref().to_string(),
            image: snapshot.image.clone(),
            timestamp: at.timestamp_micros(),
        }
    }
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends `records` as a single commit.
    async fn append(&self, records: &[EventRecord]) -> Result<(), StoreError>;
}
