//! Inbound event definitions.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use hdfs_id::{FrameworkId, OfferId, TaskId};
use serde::{Deserialize, Serialize};

use crate::Version;

// =============================================================================
// Offers
// =============================================================================

/// Scalar resources carried by an offer or requested by a node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Resources {
    pub cpus: f64,
    /// Memory in megabytes.
    pub mem: u64,
}

impl fmt::Display for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpus:{}, mem:{}", self.cpus, self.mem)
    }
}

/// A grant of resources on one host.
///
/// An offer is consumed exactly once: either a task is launched with it or
/// it is declined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub host: String,
    pub resources: Resources,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl fmt::Display for Offer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.id.short(), self.host, self.resources)?;
        if !self.attributes.is_empty() {
            let attrs: Vec<String> = self
                .attributes
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            write!(f, " {}", attrs.join(","))?;
        }
        Ok(())
    }
}

// =============================================================================
// Task status
// =============================================================================

/// Task state as reported by the cluster manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Staging,
    Starting,
    Running,
    Finished,
    Failed,
    Killed,
    Lost,
    Error,
}

/// The way a terminal status ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalKind {
    Finished,
    Failed,
    Killed,
    Lost,
    Error,
}

impl TerminalKind {
    /// Finished and killed tasks ended on purpose; the rest crashed.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Finished | Self::Killed)
    }
}

/// Behavioral class of a status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    /// Still on its way up; carries no lifecycle information.
    Pending,
    Running,
    Terminal(TerminalKind),
}

impl TaskState {
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::Staging | Self::Starting => StatusKind::Pending,
            Self::Running => StatusKind::Running,
            Self::Finished => StatusKind::Terminal(TerminalKind::Finished),
            Self::Failed => StatusKind::Terminal(TerminalKind::Failed),
            Self::Killed => StatusKind::Terminal(TerminalKind::Killed),
            Self::Lost => StatusKind::Terminal(TerminalKind::Lost),
            Self::Error => StatusKind::Terminal(TerminalKind::Error),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staging => "STAGING",
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
            Self::Killed => "KILLED",
            Self::Lost => "LOST",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single task status update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: TaskId,
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.task_id.short(), self.state)?;
        if let Some(message) = &self.message {
            write!(f, " {message}")?;
        }
        Ok(())
    }
}

// =============================================================================
// Session
// =============================================================================

/// What the cluster manager tells us about itself on subscribe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterInfo {
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
}

/// An inbound event from the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerEvent {
    Subscribed {
        framework_id: FrameworkId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        master: Option<MasterInfo>,
    },
    Offers {
        offers: Vec<Offer>,
    },
    Status {
        status: TaskStatus,
    },
    Disconnected,
}
