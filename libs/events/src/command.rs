//! Outbound commands and the driver that carries them.

use std::fmt;

use hdfs_id::{NodeId, OfferId, TaskId};
use serde::{Deserialize, Serialize};

use crate::Resources;

/// Everything the transport needs to launch a node's task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub task_id: TaskId,
    pub node_id: NodeId,
    /// Human readable task name shown by the cluster manager.
    pub name: String,
    pub host: String,
    pub resources: Resources,
    /// Opaque payload handed to the executor.
    #[serde(default)]
    pub data: serde_json::Value,
}

/// A command issued to the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    DeclineOffer {
        offer_id: OfferId,
    },
    LaunchTask {
        offer_id: OfferId,
        task: TaskDescriptor,
    },
    KillTask {
        task_id: TaskId,
    },
    /// An empty list asks for the status of every task.
    ReconcileTasks {
        task_ids: Vec<TaskId>,
    },
    Stop,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeclineOffer { offer_id } => write!(f, "decline {}", offer_id.short()),
            Self::LaunchTask { offer_id, task } => write!(
                f,
                "launch {} for node {} with offer {}",
                task.task_id.short(),
                task.node_id,
                offer_id.short()
            ),
            Self::KillTask { task_id } => write!(f, "kill {}", task_id.short()),
            Self::ReconcileTasks { task_ids } if task_ids.is_empty() => {
                write!(f, "reconcile all")
            }
            Self::ReconcileTasks { task_ids } => {
                let ids: Vec<String> = task_ids.iter().map(TaskId::short).collect();
                write!(f, "reconcile {}", ids.join(","))
            }
            Self::Stop => write!(f, "stop"),
        }
    }
}

/// Outbound command sink.
///
/// Implementations must not block and must not fail towards the caller:
/// delivery problems are the transport's concern.
pub trait Driver {
    fn send(&mut self, command: Command);

    fn decline_offer(&mut self, offer_id: OfferId) {
        self.send(Command::DeclineOffer { offer_id });
    }

    fn launch_task(&mut self, offer_id: OfferId, task: TaskDescriptor) {
        self.send(Command::LaunchTask { offer_id, task });
    }

    fn kill_task(&mut self, task_id: TaskId) {
        self.send(Command::KillTask { task_id });
    }

    fn reconcile_tasks(&mut self, task_ids: Vec<TaskId>) {
        self.send(Command::ReconcileTasks { task_ids });
    }

    fn stop(&mut self) {
        self.send(Command::Stop);
    }
}

impl<D: Driver + ?Sized> Driver for &mut D {
    fn send(&mut self, command: Command) {
        (**self).send(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collect(Vec<Command>);

    impl Driver for Collect {
        fn send(&mut self, command: Command) {
            self.0.push(command);
        }
    }

    #[test]
    fn test_provided_methods_route_through_send() {
        let mut driver = Collect::default();
        let task_id = TaskId::new();

        driver.kill_task(task_id);
        driver.reconcile_tasks(Vec::new());
        driver.stop();

        assert_eq!(
            driver.0,
            vec![
                Command::KillTask { task_id },
                Command::ReconcileTasks { task_ids: vec![] },
                Command::Stop,
            ]
        );
    }

    #[test]
    fn test_command_serialization() {
        let json = serde_json::to_value(Command::DeclineOffer {
            offer_id: OfferId::parse("O1").unwrap(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "decline_offer", "offer_id": "O1"}));
    }

    #[test]
    fn test_command_display() {
        assert_eq!(
            Command::ReconcileTasks { task_ids: vec![] }.to_string(),
            "reconcile all"
        );
        assert_eq!(Command::Stop.to_string(), "stop");
    }
}
