//! In-memory stand-ins for the external collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, stream};

use crate::cache::{Cache, CacheError};
use crate::monitor::OPERATION_TIMEOUT;
use crate::monitor::types::{ContainerSnapshot, ContainerState, RuntimeEvent};
use crate::notify::{CommandSource, IncomingMessage, NotifyError, Notifier};
use crate::runtime::{ContainerRuntime, EventStream, RuntimeError};
use crate::store::{EventRecord, EventStore, StoreError};

type ScriptedStream = Result<Vec<Result<RuntimeEvent, RuntimeError>>, RuntimeError>;

#[derive(Default)]
pub struct FakeRuntime {
    containers: Mutex<Vec<ContainerSnapshot>>,
    streams: Mutex<VecDeque<ScriptedStream>>,
    opened: AtomicUsize,
    lookups: AtomicUsize,
    list_calls: AtomicUsize,
    fail_queries: AtomicBool,
}

impl FakeRuntime {
    pub fn add_container(&self, snapshot: ContainerSnapshot) {
        self.containers.lock().unwrap().push(snapshot);
    }

    pub fn containers(&self) -> Vec<ContainerSnapshot> {
        self.containers.lock().unwrap().clone()
    }

    /// Queues the events delivered by the next opened stream. The stream ends
    /// after the last item. Once the queue is empty, opened streams stay
    /// silent forever.
    pub fn push_stream(&self, events: Vec<Result<RuntimeEvent, RuntimeError>>) {
        self.streams.lock().unwrap().push_back(Ok(events));
    }

    pub fn fail_next_open(&self) {
        self.streams
            .lock()
            .unwrap()
            .push_back(Err(RuntimeError::Stream("daemon unavailable".to_string())));
    }

    pub fn fail_queries(&self) {
        self.fail_queries.store(true, Ordering::SeqCst);
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSnapshot>, RuntimeError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(RuntimeError::Timeout(OPERATION_TIMEOUT));
        }
        Ok(self
            .containers()
            .into_iter()
            .filter(|c| all || c.state == ContainerState::Running)
            .collect())
    }

    async fn count_running(&self) -> Result<usize, RuntimeError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(RuntimeError::Timeout(OPERATION_TIMEOUT));
        }
        Ok(self
            .containers()
            .iter()
            .filter(|c| c.state == ContainerState::Running)
            .count())
    }

    async fn get_container(&self, id: &str) -> Result<ContainerSnapshot, RuntimeError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.containers()
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))
    }

    async fn stream_events(&self) -> Result<EventStream, RuntimeError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        match self.streams.lock().unwrap().pop_front() {
            Some(Ok(events)) => Ok(stream::iter(events).boxed()),
            Some(Err(e)) => Err(e),
            None => Ok(stream::pending().boxed()),
        }
    }
}

#[derive(Default)]
pub struct FakeStore {
    batches: Mutex<Vec<Vec<EventRecord>>>,
    attempts: AtomicUsize,
    failing: bool,
}

impl FakeStore {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    /// One entry per successful append.
    pub fn batches(&self) -> Vec<Vec<EventRecord>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn records(&self) -> Vec<EventRecord> {
        self.batches().into_iter().flatten().collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventStore for FakeStore {
    async fn append(&self, records: &[EventRecord]) -> Result<(), StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(StoreError::Timeout(OPERATION_TIMEOUT));
        }
        self.batches.lock().unwrap().push(records.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    sent: Mutex<Vec<(i64, String)>>,
    attempts: AtomicUsize,
    failing: bool,
}

impl FakeNotifier {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(NotifyError::Rejected("Forbidden: bot was blocked".to_string()));
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

/// Expiry is not simulated, only recorded.
#[derive(Default)]
pub struct FakeCache {
    entries: Mutex<HashMap<String, (String, Option<Duration>)>>,
    failing: bool,
}

impl FakeCache {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), None));
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).map(|(v, _)| v.clone())
    }

    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.entries.lock().unwrap().get(key).and_then(|(_, ttl)| *ttl)
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.failing {
            return Err(CacheError::Timeout(OPERATION_TIMEOUT));
        }
        Ok(())
    }
}

#[async_trait]
impl Cache for FakeCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check()?;
        Ok(self.value(key))
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.check()?;
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), Some(ttl)));
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<i64, CacheError> {
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| ("0".to_string(), None));
        let next = entry.0.parse::<i64>().unwrap_or(0) + 1;
        entry.0 = next.to_string();
        Ok(next)
    }
}

/// Hands out one scripted batch of messages per poll.
#[derive(Default)]
pub struct FakeCommandSource {
    batches: Mutex<VecDeque<Result<Vec<IncomingMessage>, NotifyError>>>,
    offsets: Mutex<Vec<i64>>,
}

impl FakeCommandSource {
    pub fn push_batch(&self, messages: Vec<IncomingMessage>) {
        self.batches.lock().unwrap().push_back(Ok(messages));
    }

    pub fn push_error(&self) {
        self.batches
            .lock()
            .unwrap()
            .push_back(Err(NotifyError::Rejected("Conflict".to_string())));
    }

    pub fn offsets(&self) -> Vec<i64> {
        self.offsets.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandSource for FakeCommandSource {
    async fn poll_messages(&self, offset: i64) -> Result<Vec<IncomingMessage>, NotifyError> {
        self.offsets.lock().unwrap().push(offset);
        let next = self.batches.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }
}
