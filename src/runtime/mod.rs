//! Container runtime access.
//!
//! The monitor needs a handful of operations from the runtime: enumerate or
//! count containers, inspect a single container and subscribe to lifecycle
//! events.
//! They are expressed as a trait so the watcher and the query service can be
//! driven by an in-memory runtime in tests.

pub mod docker;

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::monitor::types::{ContainerSnapshot, RuntimeEvent};

pub use docker::DockerRuntime;

pub type EventStream = BoxStream<'static, Result<RuntimeEvent, RuntimeError>>;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Docker API error: {0}")]
    DockerApi(#[from] bollard::errors::Error),
    #[error("Container {0} not found")]
    NotFound(String),
    #[error("Runtime call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Event stream error: {0}")]
    Stream(String),
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSnapshot>, RuntimeError>;

    /// Number of running containers, without inspecting each one.
    async fn count_running(&self) -> Result<usize, RuntimeError>;

    async fn get_container(&self, id: &str) -> Result<ContainerSnapshot, RuntimeError>;

    /// Opens a fresh event stream. A broken stream cannot be resumed, callers
    /// open a new one instead.
    async fn stream_events(&self) -> Result<EventStream, RuntimeError>;
}
