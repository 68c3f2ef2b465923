use std::sync::{Arc, Mutex, MutexGuard};

use hdfs_events::{Command, Driver, TaskDescriptor};
use hdfs_id::{OfferId, TaskId};

/// A driver that records commands instead of sending them.
///
/// Clones share the same log, so a test can keep one handle while the
/// scheduler owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingDriver {
    commands: Arc<Mutex<Vec<Command>>>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, Vec<Command>> {
        self.commands.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn commands(&self) -> Vec<Command> {
        self.log().clone()
    }

    /// Returns and clears the recorded commands.
    pub fn take(&self) -> Vec<Command> {
        std::mem::take(&mut *self.log())
    }

    pub fn launches(&self) -> Vec<(OfferId, TaskDescriptor)> {
        self.log()
            .iter()
            .filter_map(|c| match c {
                Command::LaunchTask { offer_id, task } => Some((offer_id.clone(), task.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn declines(&self) -> Vec<OfferId> {
        self.log()
            .iter()
            .filter_map(|c| match c {
                Command::DeclineOffer { offer_id } => Some(offer_id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn kills(&self) -> Vec<TaskId> {
        self.log()
            .iter()
            .filter_map(|c| match c {
                Command::KillTask { task_id } => Some(*task_id),
                _ => None,
            })
            .collect()
    }

    pub fn reconciles(&self) -> Vec<Vec<TaskId>> {
        self.log()
            .iter()
            .filter_map(|c| match c {
                Command::ReconcileTasks { task_ids } => Some(task_ids.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn stopped(&self) -> bool {
        self.log().iter().any(|c| matches!(c, Command::Stop))
    }
}

impl Driver for RecordingDriver {
    fn send(&mut self, command: Command) {
        self.log().push(command);
    }
}
