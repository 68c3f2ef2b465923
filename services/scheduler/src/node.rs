//! Nodes: the long-running workers this scheduler keeps alive.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use hdfs_events::{Offer, Resources, TaskDescriptor};
use hdfs_id::{NodeId, TaskId};
use hdfs_reconcile::Failover;
use serde::{Deserialize, Serialize};

use crate::constraint::Constraint;

/// Attribute name that refers to the offer's host.
pub const HOSTNAME_ATTRIBUTE: &str = "hostname";

/// Node lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Not wanted; no task.
    Idle,
    /// Wanted. Waiting for an offer, or launched and waiting for RUNNING.
    Starting,
    /// Task confirmed running.
    Running,
    /// Task state unknown since the last subscribe.
    Reconciling,
    /// Kill requested, waiting for the task to end.
    Stopping,
}

impl NodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Reconciling => "reconciling",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binding of a node to one launched task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runtime {
    pub task_id: TaskId,
    pub host: String,
    /// Resources taken from the offer for this task.
    pub reservation: Resources,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Set once a kill has been issued for this task.
    #[serde(default)]
    pub kill_sent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub state: NodeState,
    pub resources: Resources,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub constraints: BTreeMap<String, Constraint>,
    #[serde(default)]
    pub failover: Failover,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<Runtime>,
}

impl Node {
    pub fn new(id: NodeId, resources: Resources) -> Self {
        Self {
            id,
            state: NodeState::Idle,
            resources,
            constraints: BTreeMap::new(),
            failover: Failover::default(),
            runtime: None,
        }
    }

    pub fn with_constraint(mut self, attribute: impl Into<String>, constraint: Constraint) -> Self {
        self.constraints.insert(attribute.into(), constraint);
        self
    }

    pub fn with_failover(mut self, failover: Failover) -> Self {
        self.failover = failover;
        self
    }

    pub fn task_id(&self) -> Option<TaskId> {
        self.runtime.as_ref().map(|r| r.task_id)
    }

    /// Short task id for log lines, `-` when there is no task.
    pub fn task_label(&self) -> String {
        self.runtime
            .as_ref()
            .map(|r| r.task_id.short())
            .unwrap_or_else(|| "-".to_string())
    }

    /// An idle node never has a task.
    pub fn is_consistent(&self) -> bool {
        !(self.state == NodeState::Idle && self.runtime.is_some())
    }

    /// Waiting for an offer and not held back by restart backoff.
    pub fn is_placement_candidate(&self, now: DateTime<Utc>) -> bool {
        self.state == NodeState::Starting
            && self.runtime.is_none()
            && !self.failover.is_waiting_delay(now)
    }

    /// Why `offer` can't host this node, or `None` if it can.
    ///
    /// `others` holds attribute values claimed by nodes with a live task.
    pub fn mismatch(&self, offer: &Offer, others: &BTreeMap<String, Vec<String>>) -> Option<String> {
        if offer.resources.cpus < self.resources.cpus {
            return Some(format!("cpus < {}", self.resources.cpus));
        }

        if offer.resources.mem < self.resources.mem {
            return Some(format!("mem < {}", self.resources.mem));
        }

        for (name, constraint) in &self.constraints {
            let value = if name == HOSTNAME_ATTRIBUTE {
                Some(offer.host.as_str())
            } else {
                offer.attributes.get(name).map(String::as_str)
            };

            let Some(value) = value else {
                return Some(format!("no {name}"));
            };

            let claimed = others.get(name).map(Vec::as_slice).unwrap_or_default();
            if !constraint.matches(value, claimed) {
                return Some(format!("{name} doesn't match {constraint}"));
            }
        }

        None
    }

    /// Binds the node to a new task on `offer` and describes that task.
    pub fn launch(&mut self, offer: &Offer, name_prefix: &str) -> TaskDescriptor {
        let runtime = Runtime {
            task_id: TaskId::new(),
            host: offer.host.clone(),
            reservation: self.resources,
            attributes: offer.attributes.clone(),
            kill_sent: false,
        };

        let task = TaskDescriptor {
            task_id: runtime.task_id,
            node_id: self.id.clone(),
            name: format!("{name_prefix}-{}", self.id),
            host: runtime.host.clone(),
            resources: runtime.reservation,
            data: serde_json::json!({
                "node": self.id,
                "constraints": self.constraints,
            }),
        };

        self.runtime = Some(runtime);
        task
    }

    /// The task is confirmed running: the node counts as successfully started.
    pub fn register_start(&mut self) {
        self.state = NodeState::Running;
        self.failover.reset_failures();
    }

    pub fn register_stop(&mut self, now: DateTime<Utc>, failed: bool) {
        if failed {
            self.failover.register_failure(now);
        }
    }

    /// Drops the task binding and moves to `next`.
    pub fn clear_runtime(&mut self, next: NodeState) {
        self.runtime = None;
        self.state = next;
    }
}
