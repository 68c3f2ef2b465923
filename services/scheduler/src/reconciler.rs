//! Task state reconciliation after (re)subscribe.
//!
//! On subscribe every node with a live task becomes RECONCILING and the
//! cluster manager is asked to reassert all task states. Status updates
//! resolve nodes one by one. Each offer batch gives the reconciler a chance
//! to retry for the nodes still unresolved; once the attempt budget is
//! spent, their tasks are presumed dead, killed, and the nodes go back to
//! placement.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hdfs_events::Driver;
use hdfs_id::TaskId;
use hdfs_reconcile::{ConfigError, ReconcileSession, ReconcileStep};
use tracing::{debug, info, instrument, warn};

use crate::node::NodeState;
use crate::registry::NodeRegistry;

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    session: ReconcileSession,
}

impl Reconciler {
    pub fn new(delay: Duration, max_tries: u32) -> Result<Self, ConfigError> {
        Ok(Self {
            session: ReconcileSession::new(delay, max_tries)?,
        })
    }

    pub fn session(&self) -> &ReconcileSession {
        &self.session
    }

    /// Any node whose task state is still unknown.
    pub fn is_active(&self, registry: &NodeRegistry) -> bool {
        registry.any_in_state(NodeState::Reconciling)
    }

    /// Begins a round: marks every node with a task as RECONCILING and asks
    /// for the state of all tasks.
    #[instrument(skip_all)]
    pub fn start<D: Driver>(&mut self, registry: &mut NodeRegistry, driver: &mut D, now: DateTime<Utc>) {
        self.session.start(now);

        for node in registry.nodes_mut().filter(|n| n.runtime.is_some()) {
            let prior = node.state;
            node.state = NodeState::Reconciling;
            info!(
                node_id = %node.id,
                task_id = %node.task_label(),
                from = %prior,
                to = %node.state,
                "Reconciling {}/{} state of node {}, task {}",
                self.session.tries(),
                self.session.max_tries(),
                node.id,
                node.task_label()
            );
        }

        driver.reconcile_tasks(Vec::new());
    }

    /// Advances the round; called on every offer batch.
    #[instrument(skip_all)]
    pub fn proceed<D: Driver>(
        &mut self,
        registry: &mut NodeRegistry,
        driver: &mut D,
        now: DateTime<Utc>,
    ) -> ReconcileStep {
        if self.session.is_started() && !self.is_active(registry) {
            info!("Reconciling finished");
            self.session.finish();
            return ReconcileStep::Idle;
        }

        let step = self.session.poll(now);
        match step {
            ReconcileStep::Idle | ReconcileStep::Waiting => {}
            ReconcileStep::Retry { tries } => self.retry(registry, driver, tries),
            ReconcileStep::Exhausted => self.give_up(registry, driver),
        }
        step
    }

    fn retry<D: Driver>(&self, registry: &NodeRegistry, driver: &mut D, tries: u32) {
        let mut task_ids: Vec<TaskId> = Vec::new();

        for node in registry.in_state(NodeState::Reconciling) {
            let Some(task_id) = node.task_id() else {
                continue;
            };
            info!(
                node_id = %node.id,
                task_id = %task_id.short(),
                "Reconciling {}/{} state of node {}, task {}",
                tries,
                self.session.max_tries(),
                node.id,
                task_id.short()
            );
            task_ids.push(task_id);
        }

        if task_ids.is_empty() {
            debug!("No tasks left to reconcile");
            return;
        }

        driver.reconcile_tasks(task_ids);
    }

    fn give_up<D: Driver>(&self, registry: &mut NodeRegistry, driver: &mut D) {
        warn!(
            max_tries = self.session.max_tries(),
            "Reconciling exceeded {} tries, killing unresolved tasks",
            self.session.max_tries()
        );

        for node in registry.in_state_mut(NodeState::Reconciling) {
            let Some(task_id) = node.task_id() else {
                node.state = NodeState::Starting;
                continue;
            };

            info!(
                node_id = %node.id,
                task_id = %task_id.short(),
                from = %NodeState::Reconciling,
                to = %NodeState::Starting,
                "Killing task {} of node {}",
                task_id.short(),
                node.id
            );
            driver.kill_task(task_id);
            node.clear_runtime(NodeState::Starting);
        }
    }
}
