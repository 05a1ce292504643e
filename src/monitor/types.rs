use std::collections::BTreeMap;

use bollard::models::{ContainerStateStatusEnum, HealthStatusEnum};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SHORT_ID_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown,
}

impl AsRef<str> for ContainerState {
    fn as_ref(&self) -> &str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Restarting => "restarting",
            Self::Removing => "removing",
            Self::Exited => "exited",
            Self::Dead => "dead",
            Self::Unknown => "unknown",
        }
    }
}

impl From<ContainerStateStatusEnum> for ContainerState {
    fn from(status: ContainerStateStatusEnum) -> Self {
        match status {
            ContainerStateStatusEnum::CREATED => Self::Created,
            ContainerStateStatusEnum::RUNNING => Self::Running,
            ContainerStateStatusEnum::PAUSED => Self::Paused,
            ContainerStateStatusEnum::RESTARTING => Self::Restarting,
            ContainerStateStatusEnum::REMOVING => Self::Removing,
            ContainerStateStatusEnum::EXITED => Self::Exited,
            ContainerStateStatusEnum::DEAD => Self::Dead,
            ContainerStateStatusEnum::EMPTY => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Starting,
    None,
}

impl AsRef<str> for HealthStatus {
    fn as_ref(&self) -> &str {
        match self {
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
            Self::Starting => "starting",
            Self::None => "none",
        }
    }
}

impl From<HealthStatusEnum> for HealthStatus {
    fn from(status: HealthStatusEnum) -> Self {
        match status {
            HealthStatusEnum::HEALTHY => Self::Healthy,
            HealthStatusEnum::UNHEALTHY => Self::Unhealthy,
            HealthStatusEnum::STARTING => Self::Starting,
            HealthStatusEnum::EMPTY | HealthStatusEnum::NONE => Self::None,
        }
    }
}

/// Point-in-time read of a single container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSnapshot {
    pub id: String,
    pub short_id: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub state: ContainerState,
    pub health: Option<HealthStatus>,
    pub labels: BTreeMap<String, String>,
    pub observed_at: DateTime<Utc>,
}

impl ContainerSnapshot {
    pub fn new(id: impl Into<String>, state: ContainerState) -> Self {
        let id = id.into();
        Self {
            short_id: short_id(&id),
            id,
            name: None,
            image: None,
            state,
            health: None,
            labels: BTreeMap::new(),
            observed_at: Utc::now(),
        }
    }

    /// The health check result when the container defines one, otherwise
    /// the raw lifecycle state. Always upper-cased.
    pub fn health_or_state(&self) -> String {
        match self.health {
            Some(health) if health != HealthStatus::None => health.as_ref().to_uppercase(),
            _ => self.state.as_ref().to_uppercase(),
        }
    }

    pub fn image_or_default(&self) -> &str {
        self.image.as_deref().unwrap_or("N/A")
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

/// Docker reports container names with a leading slash.
pub fn normalize_name(name: &str) -> String {
    name.trim_start_matches('/').to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Container,
    Other,
}

/// What the monitor does with a given container action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionPolicy<'a> {
    pub log_worthy: bool,
    pub notify_worthy: bool,
    pub label: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerAction {
    Create,
    Die,
    HealthStatus,
    Other(String),
}

impl ContainerAction {
    /// Docker suffixes some actions with details, e.g. `health_status: healthy`
    /// or `exec_start: sh`. Classification only looks at the part before `:`.
    pub fn parse(raw: &str) -> Self {
        let base = raw.split(':').next().unwrap_or_default().trim();
        match base {
            "create" => Self::Create,
            "die" => Self::Die,
            "health_status" => Self::HealthStatus,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn policy(&self) -> ActionPolicy<'_> {
        match self {
            Self::Create => ActionPolicy {
                log_worthy: true,
                notify_worthy: true,
                label: "created",
            },
            Self::Die => ActionPolicy {
                log_worthy: true,
                notify_worthy: true,
                label: "terminated",
            },
            Self::HealthStatus => ActionPolicy {
                log_worthy: true,
                notify_worthy: true,
                label: "health status changed",
            },
            Self::Other(raw) => ActionPolicy {
                log_worthy: true,
                notify_worthy: false,
                label: raw,
            },
        }
    }
}

impl AsRef<str> for ContainerAction {
    fn as_ref(&self) -> &str {
        match self {
            Self::Create => "create",
            Self::Die => "die",
            Self::HealthStatus => "health_status",
            Self::Other(raw) => raw,
        }
    }
}

/// A raw signal from the runtime's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEvent {
    pub kind: EventKind,
    pub action: ContainerAction,
    pub target: String,
}

impl RuntimeEvent {
    pub fn container(action: &str, target: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Container,
            action: ContainerAction::parse(action),
            target: target.into(),
        }
    }
}
