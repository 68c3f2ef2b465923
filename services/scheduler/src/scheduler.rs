//! The scheduler core.
//!
//! [`SchedulerCore`] owns the node registry and drives it from inbound
//! events. Every handler runs to completion, issues its commands through the
//! [`Driver`] and saves the registry before returning. Handlers never fail:
//! problems signalled by an event are answered with compensating commands,
//! and store failures are logged.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hdfs_events::{Driver, MasterInfo, Offer, SchedulerEvent, TaskStatus, Version};
use hdfs_id::{FrameworkId, NodeId};
use hdfs_reconcile::{ConfigError, DEFAULT_RECONCILE_DELAY, DEFAULT_RECONCILE_MAX_TRIES};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::node::{Node, NodeState};
use crate::placement::{OfferPlacer, Placement};
use crate::reconciler::Reconciler;
use crate::registry::NodeRegistry;
use crate::status::{Decision, StatusReactor};
use crate::store::{NodeStore, StoreError};

/// Decline reason for offers after the batch already launched a task.
pub const DECLINE_BATCH_LAUNCHED: &str = "launched on another offer";

/// Errors constructing the core.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to load node state: {0}")]
    Store(#[from] StoreError),

    #[error("invalid reconcile settings: {0}")]
    Config(#[from] ConfigError),
}

/// Errors from administrative node operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdminError {
    #[error("node {0} not found")]
    NotFound(NodeId),

    #[error("node {0} already exists")]
    Duplicate(NodeId),

    #[error("node {id} has an invalid backoff: {source}")]
    InvalidBackoff {
        id: NodeId,
        #[source]
        source: ConfigError,
    },

    #[error("node {id} is {state}, expected {expected}")]
    InvalidState {
        id: NodeId,
        state: NodeState,
        expected: &'static str,
    },
}

/// Tunables of the core.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Oldest cluster manager version we talk to.
    pub min_master_version: Version,
    pub reconcile_delay: Duration,
    pub reconcile_max_tries: u32,
    /// Launched tasks are named `<prefix>-<node id>`.
    pub task_name_prefix: String,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            min_master_version: Version::new([0, 23, 0]),
            reconcile_delay: DEFAULT_RECONCILE_DELAY,
            reconcile_max_tries: DEFAULT_RECONCILE_MAX_TRIES,
            task_name_prefix: "hdfs".to_string(),
        }
    }
}

pub struct SchedulerCore<S: NodeStore, D: Driver> {
    store: S,
    driver: D,
    registry: NodeRegistry,
    placer: OfferPlacer,
    reactor: StatusReactor,
    reconciler: Reconciler,
    min_master_version: Version,
    connected: bool,
}

impl<S: NodeStore, D: Driver> SchedulerCore<S, D> {
    /// Loads the registry from `store` and builds the core around it.
    pub fn new(store: S, driver: D, settings: SchedulerSettings) -> Result<Self, SchedulerError> {
        let reconciler = Reconciler::new(settings.reconcile_delay, settings.reconcile_max_tries)?;
        let mut registry = store.load()?;

        for node in registry.nodes_mut().filter(|n| !n.is_consistent()) {
            warn!(
                node_id = %node.id,
                task_id = %node.task_label(),
                "Idle node has a task, dropping it"
            );
            node.runtime = None;
        }

        info!(
            nodes = registry.len(),
            framework_id = ?registry.framework_id.as_ref().map(FrameworkId::as_str),
            "Node state loaded"
        );

        Ok(Self {
            store,
            driver,
            registry,
            placer: OfferPlacer::new(settings.task_name_prefix),
            reactor: StatusReactor,
            reconciler,
            min_master_version: settings.min_master_version,
            connected: false,
        })
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Dispatches one inbound event.
    pub fn handle(&mut self, event: SchedulerEvent, now: DateTime<Utc>) {
        match event {
            SchedulerEvent::Subscribed {
                framework_id,
                master,
            } => self.on_subscribed(framework_id, master, now),
            SchedulerEvent::Offers { offers } => self.on_offers(&offers, now),
            SchedulerEvent::Status { status } => {
                self.on_status(&status, now);
            }
            SchedulerEvent::Disconnected => self.on_disconnected(),
        }
    }

    #[instrument(skip_all, fields(framework_id = %framework_id))]
    pub fn on_subscribed(&mut self, framework_id: FrameworkId, master: Option<MasterInfo>, now: DateTime<Utc>) {
        info!(
            master = ?master.as_ref().map(|m| m.hostname.as_str()),
            "Subscribed"
        );
        self.registry.framework_id = Some(framework_id);

        if !self.is_supported(master.as_ref()) {
            self.connected = false;
            self.driver.stop();
            self.persist();
            return;
        }

        self.connected = true;
        self.reconciler.start(&mut self.registry, &mut self.driver, now);
        self.persist();
    }

    /// A subscribe without master info is accepted as is.
    fn is_supported(&self, master: Option<&MasterInfo>) -> bool {
        let Some(master) = master else {
            return true;
        };

        match master.version.as_ref() {
            Some(version) if *version >= self.min_master_version => true,
            Some(version) => {
                error!(
                    version = %version,
                    min_version = %self.min_master_version,
                    "Unsupported master version {}, required {}+, stopping",
                    version,
                    self.min_master_version
                );
                false
            }
            None => {
                error!(
                    min_version = %self.min_master_version,
                    "Master did not report its version, required {}+, stopping",
                    self.min_master_version
                );
                false
            }
        }
    }

    #[instrument(skip_all, fields(offers = offers.len()))]
    pub fn on_offers(&mut self, offers: &[Offer], now: DateTime<Utc>) {
        for offer in offers {
            debug!(offer = %offer, "Offer received");
        }

        let mut launched = false;
        for offer in offers {
            let placement = if launched {
                Placement::Decline(DECLINE_BATCH_LAUNCHED.to_string())
            } else {
                self.placer.evaluate(&mut self.registry, offer, now)
            };

            match placement {
                Placement::Launch { node_id, task } => {
                    launched = true;
                    self.persist();
                    info!(
                        node_id = %node_id,
                        task_id = %task.task_id.short(),
                        offer_id = %offer.id.short(),
                        host = %task.host,
                        from = %NodeState::Starting,
                        to = %NodeState::Starting,
                        "Starting node {} on offer {}",
                        node_id,
                        offer.id.short()
                    );
                    self.driver.launch_task(offer.id.clone(), task);
                }
                Placement::Decline(reason) => {
                    info!(
                        offer_id = %offer.id.short(),
                        reason = %reason,
                        "Declined offer {}: {}",
                        offer.id.short(),
                        reason
                    );
                    self.driver.decline_offer(offer.id.clone());
                }
            }
        }

        self.sweep_stopping();
        self.reconciler.proceed(&mut self.registry, &mut self.driver, now);
        self.persist();
    }

    /// Finishes nodes marked STOPPING: parks those without a task, kills the
    /// task of the others once.
    fn sweep_stopping(&mut self) {
        for node in self.registry.in_state_mut(NodeState::Stopping) {
            let Some(runtime) = node.runtime.as_mut() else {
                node.state = NodeState::Idle;
                info!(
                    node_id = %node.id,
                    from = %NodeState::Stopping,
                    to = %NodeState::Idle,
                    "Node stopped"
                );
                continue;
            };

            if runtime.kill_sent {
                continue;
            }

            info!(
                node_id = %node.id,
                task_id = %runtime.task_id.short(),
                "Stopping node {}, killing task {}",
                node.id,
                runtime.task_id.short()
            );
            self.driver.kill_task(runtime.task_id);
            runtime.kill_sent = true;
        }
    }

    #[instrument(skip_all, fields(task_id = %status.task_id.short(), state = %status.state))]
    pub fn on_status(&mut self, status: &TaskStatus, now: DateTime<Utc>) -> Decision {
        let decision = self
            .reactor
            .on_status(&mut self.registry, &mut self.driver, status, now);
        self.persist();
        decision
    }

    pub fn on_disconnected(&mut self) {
        info!("Disconnected");
        self.connected = false;
    }

    /// Registers a new node; it starts out IDLE without a task.
    pub fn add_node(&mut self, mut node: Node) -> Result<(), AdminError> {
        node.failover
            .backoff
            .validate()
            .map_err(|source| AdminError::InvalidBackoff {
                id: node.id.clone(),
                source,
            })?;
        node.state = NodeState::Idle;
        node.runtime = None;

        let id = node.id.clone();
        self.registry
            .insert(node)
            .map_err(|node| AdminError::Duplicate(node.id))?;

        info!(node_id = %id, "Node added");
        self.persist();
        Ok(())
    }

    /// Puts an IDLE node up for placement with a clean failure record.
    pub fn start_node(&mut self, id: &NodeId) -> Result<(), AdminError> {
        let node = self.node_mut(id)?;
        if node.state != NodeState::Idle {
            return Err(AdminError::InvalidState {
                id: id.clone(),
                state: node.state,
                expected: "idle",
            });
        }

        node.failover.reset_failures();
        node.state = NodeState::Starting;
        info!(
            node_id = %id,
            from = %NodeState::Idle,
            to = %NodeState::Starting,
            "Node starting"
        );
        self.persist();
        Ok(())
    }

    /// Requests a node stop. A node without a task goes IDLE right away;
    /// otherwise the next offer batch kills its task.
    pub fn stop_node(&mut self, id: &NodeId) -> Result<(), AdminError> {
        let node = self.node_mut(id)?;
        let prior = node.state;
        if prior == NodeState::Idle {
            return Err(AdminError::InvalidState {
                id: id.clone(),
                state: prior,
                expected: "not idle",
            });
        }

        node.state = if node.runtime.is_some() {
            NodeState::Stopping
        } else {
            NodeState::Idle
        };
        info!(
            node_id = %id,
            task_id = %node.task_label(),
            from = %prior,
            to = %node.state,
            "Node stopping"
        );
        self.persist();
        Ok(())
    }

    /// Removes an IDLE node.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<Node, AdminError> {
        let state = self.node_mut(id)?.state;
        if state != NodeState::Idle {
            return Err(AdminError::InvalidState {
                id: id.clone(),
                state,
                expected: "idle",
            });
        }

        let node = self
            .registry
            .remove(id)
            .ok_or_else(|| AdminError::NotFound(id.clone()))?;
        info!(node_id = %id, "Node removed");
        self.persist();
        Ok(node)
    }

    fn node_mut(&mut self, id: &NodeId) -> Result<&mut Node, AdminError> {
        self.registry
            .get_mut(id)
            .ok_or_else(|| AdminError::NotFound(id.clone()))
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.registry) {
            error!(error = %e, "Failed to save node state");
        }
    }
}
