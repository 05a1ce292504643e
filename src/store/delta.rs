use async_trait::async_trait;
use deltalake::{DeltaOps, DeltaTable, DeltaTableError};
use log::{debug, info};
use tokio::sync::Mutex;

use super::buffer::EventsBuffer;
use super::schema::create_events_table;
use super::{EventRecord, EventStore, StoreError};
use crate::monitor::OPERATION_TIMEOUT;

/// Appends container events to a Delta Lake table.
pub struct DeltaEventStore {
    table_uri: String,
    table: Mutex<DeltaTable>,
}

impl DeltaEventStore {
    /// Opens the table, creating it on first use. This doubles as the startup
    /// connectivity probe and is bounded by [`OPERATION_TIMEOUT`].
    pub async fn connect(table_uri: &str) -> Result<Self, StoreError> {
        let table = tokio::time::timeout(OPERATION_TIMEOUT, open_or_create(table_uri))
            .await
            .map_err(|_| StoreError::Timeout(OPERATION_TIMEOUT))??;
        info!("Event table ready at {table_uri}");
        Ok(Self {
            table_uri: table_uri.to_string(),
            table: Mutex::new(table),
        })
    }
}

async fn open_or_create(table_uri: &str) -> Result<DeltaTable, DeltaTableError> {
    match deltalake::open_table(deltalake::ensure_table_uri(table_uri)?).await {
        Ok(table) => Ok(table),
        Err(DeltaTableError::NotATable(_)) => create_events_table(table_uri).await,
        Err(e) => Err(e),
    }
}

#[async_trait]
impl EventStore for DeltaEventStore {
    async fn append(&self, records: &[EventRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut buffer = EventsBuffer::new(records.len());
        for record in records {
            buffer.push(record);
        }
        let batch = buffer.into_record_batch()?;

        // Writes are serialized so every commit starts from the latest version.
        let mut table = self.table.lock().await;
        let write = DeltaOps(table.clone())
            .write(vec![batch])
            .with_save_mode(deltalake::protocol::SaveMode::Append);
        let updated = tokio::time::timeout(OPERATION_TIMEOUT, write)
            .await
            .map_err(|_| StoreError::Timeout(OPERATION_TIMEOUT))??;
        *table = updated;

        debug!("Appended {} events to {}", records.len(), self.table_uri);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, StringArray};
    use arrow::datatypes::DataType;
    use arrow::record_batch::RecordBatch;
    use futures_util::TryStreamExt;

    fn record(container_id: &str, action: &str) -> EventRecord {
        EventRecord {
            container_id: container_id.to_string(),
            name: format!("{container_id}-name"),
            action: action.to_string(),
            status: "running".to_string(),
            image: Some("nginx:latest".to_string()),
            timestamp: 1_700_000_000_000_000,
        }
    }

    async fn read_back(table_uri: &str) -> Vec<RecordBatch> {
        let table_url = deltalake::ensure_table_uri(table_uri).expect("valid table uri");
        let table = deltalake::open_table(table_url)
            .await
            .expect("table exists");
        let (_, stream) = DeltaOps(table).load().await.expect("loadable table");
        stream.try_collect().await.expect("readable batches")
    }

    fn container_ids(batches: &[RecordBatch]) -> Vec<String> {
        let mut ids = Vec::new();
        for batch in batches {
            let column = batch.column_by_name("container_id").expect("column present");
            let column = arrow::compute::cast(column, &DataType::Utf8).expect("castable");
            let column = column
                .as_any()
                .downcast_ref::<StringArray>()
                .expect("string column");
            ids.extend((0..column.len()).map(|row| column.value(row).to_string()));
        }
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn test_connect_creates_table_and_appends() {
        let dir = tempfile::tempdir().expect("temp dir");
        let table_uri = dir.path().to_str().expect("utf8 path").to_string();

        let store = DeltaEventStore::connect(&table_uri)
            .await
            .expect("table is created");
        store
            .append(&[record("c1", "create"), record("c2", "die")])
            .await
            .expect("first append");
        store
            .append(&[record("c3", "start")])
            .await
            .expect("second append");
        store.append(&[]).await.expect("empty append is a no-op");

        let batches = read_back(&table_uri).await;
        let rows: usize = batches.iter().map(RecordBatch::num_rows).sum();
        assert_eq!(rows, 3);
        assert_eq!(container_ids(&batches), vec!["c1", "c2", "c3"]);
    }

    #[tokio::test]
    async fn test_connect_reopens_existing_table() {
        let dir = tempfile::tempdir().expect("temp dir");
        let table_uri = dir.path().to_str().expect("utf8 path").to_string();

        let first = DeltaEventStore::connect(&table_uri).await.expect("created");
        first.append(&[record("c1", "create")]).await.expect("append");
        drop(first);

        let second = DeltaEventStore::connect(&table_uri).await.expect("reopened");
        second.append(&[record("c2", "die")]).await.expect("append");

        let batches = read_back(&table_uri).await;
        assert_eq!(container_ids(&batches), vec!["c1", "c2"]);
    }
}
