use chrono::Utc;
use log::{debug, error};
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;

use super::types::{ContainerAction, ContainerSnapshot};
use crate::store::EventRecord;

/// Best-effort persistence of processed events.
///
/// Records are handed to the background [`crate::store::EventWriter`] and
/// never wait on the store. A full or closed channel drops the record.
#[derive(Clone)]
pub struct DurableSink {
    tx: Option<Sender<EventRecord>>,
}

impl DurableSink {
    pub fn new(tx: Sender<EventRecord>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    pub fn process(&self, snapshot: &ContainerSnapshot, action: &ContainerAction) {
        let Some(tx) = &self.tx else {
            return;
        };

        let record = EventRecord::from_snapshot(snapshot, action, Utc::now());
        match tx.try_send(record) {
            Ok(()) => debug!("Queued {} event for {}", action.as_ref(), snapshot.short_id),
            Err(TrySendError::Full(record)) => error!(
                "Event queue full, dropping {} event for {}",
                record.action, record.container_id
            ),
            Err(TrySendError::Closed(record)) => error!(
                "Event writer stopped, dropping {} event for {}",
                record.action, record.container_id
            ),
        }
    }
}
