//! Docker runtime using bollard.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{ContainerInspectResponse, EventMessage, EventMessageTypeEnum};
use bollard::query_parameters::{
    EventsOptions, InspectContainerOptions, InspectContainerOptionsBuilder,
    ListContainersOptions, ListContainersOptionsBuilder,
};
use chrono::Utc;
use futures_util::{StreamExt, stream};

use super::{ContainerRuntime, EventStream, RuntimeError};
use crate::monitor::OPERATION_TIMEOUT;
use crate::monitor::types::{
    ContainerAction, ContainerSnapshot, ContainerState, EventKind, HealthStatus, RuntimeEvent,
    normalize_name, short_id,
};

const INSPECT_CONCURRENCY: usize = 8;

// Event streams borrow the client, so it lives as long as the process.
static DOCKER_CLIENT: OnceLock<Docker> = OnceLock::new();

#[derive(Clone, Copy)]
pub struct DockerRuntime {
    docker: &'static Docker,
}

impl DockerRuntime {
    /// Connects using the default method (Unix socket on Linux/macOS, named
    /// pipe on Windows).
    pub fn connect() -> Result<Self, RuntimeError> {
        if let Some(docker) = DOCKER_CLIENT.get() {
            return Ok(Self { docker });
        }
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self {
            docker: DOCKER_CLIENT.get_or_init(|| docker),
        })
    }

    pub async fn ping(&self) -> Result<(), RuntimeError> {
        bounded(self.docker.ping()).await?;
        Ok(())
    }

    async fn inspect(&self, id: &str) -> Result<ContainerSnapshot, RuntimeError> {
        let options: InspectContainerOptions = InspectContainerOptionsBuilder::new().build();

        match bounded(self.docker.inspect_container(id, Some(options))).await {
            Ok(info) => Ok(snapshot_from_inspect(id, info)),
            Err(RuntimeError::DockerApi(bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                ..
            })) => Err(RuntimeError::NotFound(id.to_string())),
            Err(e) => Err(e),
        }
    }
}

async fn bounded<T, F>(call: F) -> Result<T, RuntimeError>
where
    F: Future<Output = Result<T, bollard::errors::Error>>,
{
    match tokio::time::timeout(OPERATION_TIMEOUT, call).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(RuntimeError::Timeout(OPERATION_TIMEOUT)),
    }
}

fn snapshot_from_inspect(id: &str, info: ContainerInspectResponse) -> ContainerSnapshot {
    let id = info.id.unwrap_or_else(|| id.to_string());
    let (state, health) = match info.state {
        Some(state) => (
            state
                .status
                .map(ContainerState::from)
                .unwrap_or(ContainerState::Unknown),
            state.health.and_then(|h| h.status).map(HealthStatus::from),
        ),
        None => (ContainerState::Unknown, None),
    };
    let (image, labels) = match info.config {
        Some(config) => (
            config.image.filter(|image| !image.is_empty()),
            config
                .labels
                .map(|labels| labels.into_iter().collect())
                .unwrap_or_default(),
        ),
        None => (None, BTreeMap::new()),
    };

    ContainerSnapshot {
        short_id: short_id(&id),
        id,
        name: info
            .name
            .map(|name| normalize_name(&name))
            .filter(|name| !name.is_empty()),
        image,
        state,
        health,
        labels,
        observed_at: Utc::now(),
    }
}

fn event_from_message(message: EventMessage) -> RuntimeEvent {
    let kind = match message.typ {
        Some(EventMessageTypeEnum::CONTAINER) => EventKind::Container,
        _ => EventKind::Other,
    };
    let target = message.actor.and_then(|actor| actor.id).unwrap_or_default();
    let action = ContainerAction::parse(message.action.as_deref().unwrap_or_default());
    RuntimeEvent {
        kind,
        action,
        target,
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSnapshot>, RuntimeError> {
        let options: ListContainersOptions = ListContainersOptionsBuilder::new().all(all).build();
        let summaries = bounded(self.docker.list_containers(Some(options))).await?;

        let ids = summaries.into_iter().filter_map(|summary| summary.id);
        let inspections: Vec<_> = stream::iter(ids)
            .map(|id| async move { self.inspect(&id).await })
            .buffered(INSPECT_CONCURRENCY)
            .collect()
            .await;

        let mut snapshots = Vec::with_capacity(inspections.len());
        for result in inspections {
            match result {
                Ok(snapshot) => snapshots.push(snapshot),
                // Removed between the listing and the inspection
                Err(RuntimeError::NotFound(id)) => {
                    log::debug!("Container {id} disappeared while listing");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(snapshots)
    }

    async fn count_running(&self) -> Result<usize, RuntimeError> {
        let options: ListContainersOptions = ListContainersOptionsBuilder::new().all(false).build();
        let summaries = bounded(self.docker.list_containers(Some(options))).await?;
        Ok(summaries.len())
    }

    async fn get_container(&self, id: &str) -> Result<ContainerSnapshot, RuntimeError> {
        self.inspect(id).await
    }

    async fn stream_events(&self) -> Result<EventStream, RuntimeError> {
        // The daemon is reachable when this returns, the stream itself only
        // fails once polled.
        self.ping().await?;
        let stream = self
            .docker
            .events(None::<EventsOptions>)
            .map(|result| result.map(event_from_message).map_err(RuntimeError::from));
        Ok(stream.boxed())
    }
}
