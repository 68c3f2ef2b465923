//! Offer evaluation: picks at most one node to launch per offer.

use chrono::{DateTime, Utc};
use hdfs_events::{Offer, TaskDescriptor};
use hdfs_id::NodeId;

use crate::node::NodeState;
use crate::registry::NodeRegistry;

pub const DECLINE_RECONCILING: &str = "reconciling";
pub const DECLINE_NOTHING_TO_START: &str = "nothing to start";

/// Outcome of evaluating one offer.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// The node was bound to the offer; the task still has to be sent.
    Launch { node_id: NodeId, task: TaskDescriptor },
    Decline(String),
}

/// Matches offers against nodes waiting for placement.
#[derive(Debug, Clone)]
pub struct OfferPlacer {
    task_name_prefix: String,
}

impl OfferPlacer {
    pub fn new(task_name_prefix: impl Into<String>) -> Self {
        Self {
            task_name_prefix: task_name_prefix.into(),
        }
    }

    /// Evaluates `offer` and, on a match, binds the chosen node to it.
    ///
    /// Nothing is placed while any node is reconciling. Otherwise candidates
    /// are tried in id order and the first that fits takes the whole offer.
    pub fn evaluate(&self, registry: &mut NodeRegistry, offer: &Offer, now: DateTime<Utc>) -> Placement {
        if registry.any_in_state(NodeState::Reconciling) {
            return Placement::Decline(DECLINE_RECONCILING.to_string());
        }

        let candidates: Vec<NodeId> = registry
            .nodes()
            .iter()
            .filter(|n| n.is_placement_candidate(now))
            .map(|n| n.id.clone())
            .collect();

        if candidates.is_empty() {
            return Placement::Decline(DECLINE_NOTHING_TO_START.to_string());
        }

        let others = registry.other_attributes();
        let mut reasons = Vec::with_capacity(candidates.len());

        for id in candidates {
            let Some(node) = registry.get_mut(&id) else {
                continue;
            };

            match node.mismatch(offer, &others) {
                Some(reason) => reasons.push(format!("node {id}: {reason}")),
                None => {
                    let task = node.launch(offer, &self.task_name_prefix);
                    return Placement::Launch { node_id: id, task };
                }
            }
        }

        Placement::Decline(reasons.join(", "))
    }
}
