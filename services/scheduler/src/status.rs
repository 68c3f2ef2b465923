//! Task status handling: the node lifecycle state machine.
//!
//! [`decide`] is a pure function of the node's current state and the class
//! of the status update. [`StatusReactor::on_status`] looks the node up,
//! applies the decision and issues any compensating command.

use chrono::{DateTime, Utc};
use hdfs_events::{Driver, StatusKind, TaskStatus};
use tracing::{info, warn};

use crate::node::{Node, NodeState};
use crate::registry::NodeRegistry;

/// What a status update means for the node it refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Nothing to do.
    Ignore,
    /// RUNNING for a task we don't expect to run: kill it.
    KillOrphan,
    /// The task is confirmed alive.
    MarkRunning { was_reconciling: bool },
    /// The task is gone.
    Stopped {
        /// The node was being stopped on purpose.
        intentional: bool,
        /// Counts towards the node's failure limit.
        failed: bool,
    },
}

/// Maps (current node state, status class) to a decision.
///
/// `state` is `None` when no node owns the task.
pub fn decide(state: Option<NodeState>, kind: StatusKind) -> Decision {
    match kind {
        StatusKind::Pending => Decision::Ignore,
        StatusKind::Running => match state {
            Some(NodeState::Starting | NodeState::Running | NodeState::Reconciling) => {
                Decision::MarkRunning {
                    was_reconciling: state == Some(NodeState::Reconciling),
                }
            }
            _ => Decision::KillOrphan,
        },
        StatusKind::Terminal(terminal) => match state {
            None | Some(NodeState::Idle) => Decision::Ignore,
            Some(state) => {
                let intentional = state == NodeState::Stopping;
                Decision::Stopped {
                    intentional,
                    failed: !intentional && terminal.is_failure(),
                }
            }
        },
    }
}

/// Applies task status updates to the registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusReactor;

impl StatusReactor {
    pub fn on_status<D: Driver>(
        &self,
        registry: &mut NodeRegistry,
        driver: &mut D,
        status: &TaskStatus,
        now: DateTime<Utc>,
    ) -> Decision {
        let node = registry.by_task_id_mut(&status.task_id);
        let decision = decide(node.as_ref().map(|n| n.state), status.state.kind());
        let node_label = node
            .as_ref()
            .map(|n| n.id.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());

        match (decision, node) {
            (Decision::KillOrphan, _) => {
                info!(
                    node_id = %node_label,
                    task_id = %status.task_id.short(),
                    "Got {} for node {}, killing task",
                    status.state,
                    node_label
                );
                driver.kill_task(status.task_id);
            }
            (Decision::Ignore, _) if status.state.kind() == StatusKind::Pending => {}
            (Decision::Ignore, _) => {
                info!(
                    node_id = %node_label,
                    task_id = %status.task_id.short(),
                    "Got {} for node {}, ignoring it",
                    status.state,
                    node_label
                );
            }
            (Decision::MarkRunning { was_reconciling }, Some(node)) => {
                if was_reconciling {
                    info!(
                        node_id = %node.id,
                        task_id = %status.task_id.short(),
                        "Finished reconciling of node {}",
                        node.id
                    );
                }
                let prior = node.state;
                node.register_start();
                info!(
                    node_id = %node.id,
                    task_id = %status.task_id.short(),
                    from = %prior,
                    to = %node.state,
                    "Node is running"
                );
            }
            (Decision::Stopped { intentional, failed }, Some(node)) => {
                on_stopped(node, status, intentional, failed, now);
            }
            (Decision::MarkRunning { .. } | Decision::Stopped { .. }, None) => {}
        }

        decision
    }
}

fn on_stopped(node: &mut Node, status: &TaskStatus, intentional: bool, failed: bool, now: DateTime<Utc>) {
    let prior = node.state;
    let task_label = node.task_label();

    node.register_stop(now, failed);

    let mut stopping = intentional;
    if failed {
        if node.failover.is_max_tries_exceeded() {
            stopping = true;
        }
        log_failure(node, &task_label);
    }

    node.clear_runtime(if stopping {
        NodeState::Idle
    } else {
        NodeState::Starting
    });

    info!(
        node_id = %node.id,
        task_id = %task_label,
        task_state = %status.state,
        from = %prior,
        to = %node.state,
        "Node task stopped"
    );
}

fn log_failure(node: &Node, task_label: &str) {
    let failover = &node.failover;
    let tries = match failover.max_tries {
        Some(max) => format!("{}/{}", failover.failures, max),
        None => failover.failures.to_string(),
    };

    if failover.is_max_tries_exceeded() {
        warn!(
            node_id = %node.id,
            task_id = %task_label,
            failures = failover.failures,
            max_tries = ?failover.max_tries,
            "Node {} failed {}, failure limit exceeded, stopping node",
            node.id,
            tries
        );
        return;
    }

    let next_start = failover
        .delay_expires()
        .map(|at| at.format("%H:%M:%SZ").to_string())
        .unwrap_or_else(|| "now".to_string());

    warn!(
        node_id = %node.id,
        task_id = %task_label,
        failures = failover.failures,
        max_tries = ?failover.max_tries,
        delay_secs = failover.current_delay().as_secs(),
        next_start = %next_start,
        "Node {} failed {}, waiting {}s, next start ~ {}",
        node.id,
        tries,
        failover.current_delay().as_secs(),
        next_start
    );
}
