//! Background writer that batches event records into store commits.
//!
//! Records arrive over a bounded channel. They are buffered and appended in
//! one commit once the buffer reaches its limit, when the flush interval
//! elapses, or when every sender is gone.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{error, info, warn};
use tokio::sync::mpsc::Receiver;

use super::{EventRecord, EventStore};

pub const DEFAULT_BUFFER_SIZE: usize = 500;
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(60);
pub const CHANNEL_CAPACITY: usize = 1024;

pub struct EventWriter {
    store: Arc<dyn EventStore>,
    rx: Receiver<EventRecord>,
    buffer: Vec<EventRecord>,
    buffer_limit: usize,
    flush_interval: Duration,
}

impl EventWriter {
    pub fn new(store: Arc<dyn EventStore>, rx: Receiver<EventRecord>, buffer_limit: usize) -> Self {
        let buffer_limit = buffer_limit.max(1);
        Self {
            store,
            rx,
            buffer: Vec::with_capacity(buffer_limit),
            buffer_limit,
            flush_interval: FLUSH_INTERVAL,
        }
    }

    /// Intervals below one second are raised to one second.
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval.max(Duration::from_secs(1));
        self
    }

    /// Runs until the channel closes, then flushes what is left.
    pub async fn run(mut self) {
        info!("Event writer started");
        let mut flush_interval = tokio::time::interval(self.flush_interval);
        // The first tick completes immediately
        flush_interval.tick().await;

        loop {
            tokio::select! {
                maybe_record = self.rx.recv() => {
                    match maybe_record {
                        Some(record) => {
                            self.buffer.push(record);
                            if self.buffer.len() >= self.buffer_limit {
                                self.flush().await;
                            }
                        }
                        None => {
                            info!("Event channel closed, flushing remaining events");
                            self.flush().await;
                            break;
                        }
                    }
                }
                _ = flush_interval.tick() => {
                    if !self.buffer.is_empty() {
                        self.flush().await;
                    }
                }
            }
        }
        info!("Event writer stopped");
    }

    async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let start = Instant::now();
        let records = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.buffer_limit));

        match self.store.append(&records).await {
            Ok(()) => info!("Flushed {} events to the event store", records.len()),
            Err(e) => error!("Failed to store {} events: {e}", records.len()),
        }

        let duration = start.elapsed();
        if duration.as_secs() > 1 {
            warn!("Event flush took {:?}", duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeStore;
    use tokio::sync::mpsc;

    fn record(n: usize) -> EventRecord {
        EventRecord {
            container_id: format!("c{n}"),
            name: "web".to_string(),
            action: "start".to_string(),
            status: "running".to_string(),
            image: None,
            timestamp: n as i64,
        }
    }

    #[tokio::test]
    async fn test_records_are_flushed_as_one_batch() {
        let store = Arc::new(FakeStore::default());
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        for n in 0..20 {
            tx.try_send(record(n)).expect("channel has room");
        }
        drop(tx);

        EventWriter::new(store.clone(), rx, DEFAULT_BUFFER_SIZE).run().await;

        let batches = store.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 20);
        assert_eq!(store.attempts(), 1);
    }

    #[tokio::test]
    async fn test_full_buffer_triggers_flush() {
        let store = Arc::new(FakeStore::default());
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        for n in 0..12 {
            tx.try_send(record(n)).expect("channel has room");
        }
        drop(tx);

        EventWriter::new(store.clone(), rx, 5).run().await;

        let sizes: Vec<usize> = store.batches().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![5, 5, 2]);
        assert_eq!(store.records().len(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_flushes_partial_buffer() {
        let store = Arc::new(FakeStore::default());
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = tokio::spawn(
            EventWriter::new(store.clone(), rx, DEFAULT_BUFFER_SIZE)
                .with_flush_interval(Duration::from_secs(30))
                .run(),
        );

        for n in 0..3 {
            tx.send(record(n)).await.expect("writer is running");
        }
        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(store.batches().len(), 1);
        assert_eq!(store.records().len(), 3);
        assert!(!handle.is_finished());

        drop(tx);
        handle.await.expect("writer stops cleanly");
        assert_eq!(store.attempts(), 1);
    }

    #[tokio::test]
    async fn test_failed_flush_is_dropped() {
        let store = Arc::new(FakeStore::failing());
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tx.try_send(record(1)).expect("channel has room");
        tx.try_send(record(2)).expect("channel has room");
        drop(tx);

        EventWriter::new(store.clone(), rx, DEFAULT_BUFFER_SIZE).run().await;

        assert_eq!(store.attempts(), 1);
        assert!(store.records().is_empty());
    }
}
