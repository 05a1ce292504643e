//! Background consumption of the runtime's event stream.
//!
//! The watcher alternates between two states. While `Connected` it drains the
//! current stream, handling each container event in order. When the stream
//! fails or ends it moves to `Reconnecting`, waits a fixed backoff and opens a
//! new stream. There is no retry ceiling: the loop only stops with the process.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, error, info, warn};

use super::OPERATION_TIMEOUT;
use super::gate::NotificationGate;
use super::sink::DurableSink;
use super::types::{EventKind, RuntimeEvent};
use crate::runtime::{ContainerRuntime, EventStream, RuntimeError};

pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(10);

pub enum WatcherState {
    Connected(EventStream),
    Reconnecting,
}

impl std::fmt::Debug for WatcherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected(_) => write!(f, "Connected"),
            Self::Reconnecting => write!(f, "Reconnecting"),
        }
    }
}

pub struct EventWatcher {
    runtime: Arc<dyn ContainerRuntime>,
    sink: DurableSink,
    gate: NotificationGate,
    backoff: Duration,
}

impl EventWatcher {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, sink: DurableSink, gate: NotificationGate) -> Self {
        Self {
            runtime,
            sink,
            gate,
            backoff: RECONNECT_BACKOFF,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub async fn run(self) {
        info!("Starting event watcher");
        let mut state = self.connect().await;
        loop {
            state = self.step(state).await;
        }
    }

    /// Advances the state machine by one transition.
    pub async fn step(&self, state: WatcherState) -> WatcherState {
        match state {
            WatcherState::Connected(mut stream) => {
                self.consume(&mut stream).await;
                warn!("Reconnecting to the event stream in {:?}", self.backoff);
                WatcherState::Reconnecting
            }
            WatcherState::Reconnecting => {
                tokio::time::sleep(self.backoff).await;
                self.connect().await
            }
        }
    }

    async fn connect(&self) -> WatcherState {
        match self.runtime.stream_events().await {
            Ok(stream) => {
                info!("Subscribed to container events");
                WatcherState::Connected(stream)
            }
            Err(e) => {
                error!("Unable to open the event stream: {e}");
                WatcherState::Reconnecting
            }
        }
    }

    async fn consume(&self, stream: &mut EventStream) {
        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => self.handle_event(event).await,
                Err(e) => {
                    error!("Event stream failed: {e}");
                    return;
                }
            }
        }
        warn!("Event stream ended");
    }

    /// Handles a single event. Failures are logged and never escape, so one
    /// bad event cannot stall the stream.
    pub async fn handle_event(&self, event: RuntimeEvent) {
        if event.kind != EventKind::Container {
            return;
        }

        let policy = event.action.policy();
        let persist = policy.log_worthy && self.sink.is_enabled();
        if !persist && !policy.notify_worthy {
            return;
        }

        debug!("Container event {} for {}", event.action.as_ref(), event.target);
        let snapshot = match tokio::time::timeout(
            OPERATION_TIMEOUT,
            self.runtime.get_container(&event.target),
        )
        .await
        .unwrap_or(Err(RuntimeError::Timeout(OPERATION_TIMEOUT)))
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    "Skipping {} event for {}: {e}",
                    event.action.as_ref(),
                    event.target
                );
                return;
            }
        };

        if persist {
            self.sink.process(&snapshot, &event.action);
        }
        if policy.notify_worthy {
            self.gate.process(&snapshot, &event.action).await;
        }
    }
}
