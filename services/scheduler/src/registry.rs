//! The node collection shared by every scheduler component.
//!
//! Nodes are kept sorted by id, which is the order placement considers them
//! in. The registry is the unit of persistence: it is loaded once at
//! startup and saved after every handled event.

use std::collections::BTreeMap;

use hdfs_id::{FrameworkId, NodeId, TaskId};
use serde::{Deserialize, Serialize};

use crate::node::{Node, NodeState, HOSTNAME_ATTRIBUTE};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RegistryDocument")]
pub struct NodeRegistry {
    /// Framework id from the last subscribe, reused when resubscribing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework_id: Option<FrameworkId>,
    nodes: Vec<Node>,
}

#[derive(Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    framework_id: Option<FrameworkId>,
    #[serde(default)]
    nodes: Vec<Node>,
}

impl From<RegistryDocument> for NodeRegistry {
    fn from(doc: RegistryDocument) -> Self {
        let mut nodes = doc.nodes;
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes.dedup_by(|a, b| a.id == b.id);

        Self {
            framework_id: doc.framework_id,
            nodes,
        }
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.iter_mut()
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.position(id).ok().map(|idx| &self.nodes[idx])
    }

    pub fn get_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.position(id).ok().map(|idx| &mut self.nodes[idx])
    }

    /// Adds a node; returns it back if the id is taken.
    pub fn insert(&mut self, node: Node) -> Result<(), Node> {
        match self.position(&node.id) {
            Ok(_) => Err(node),
            Err(idx) => {
                self.nodes.insert(idx, node);
                Ok(())
            }
        }
    }

    pub fn remove(&mut self, id: &NodeId) -> Option<Node> {
        self.position(id).ok().map(|idx| self.nodes.remove(idx))
    }

    pub fn by_task_id(&self, task_id: &TaskId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.task_id().as_ref() == Some(task_id))
    }

    pub fn by_task_id_mut(&mut self, task_id: &TaskId) -> Option<&mut Node> {
        self.nodes
            .iter_mut()
            .find(|n| n.task_id().as_ref() == Some(task_id))
    }

    pub fn in_state(&self, state: NodeState) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.state == state)
    }

    pub fn in_state_mut(&mut self, state: NodeState) -> impl Iterator<Item = &mut Node> {
        self.nodes.iter_mut().filter(move |n| n.state == state)
    }

    pub fn any_in_state(&self, state: NodeState) -> bool {
        self.nodes.iter().any(|n| n.state == state)
    }

    /// Attribute values claimed by every node with a live task.
    ///
    /// Each such node contributes its host under `hostname` plus every
    /// attribute of the offer it was launched on.
    pub fn other_attributes(&self) -> BTreeMap<String, Vec<String>> {
        self.nodes
            .iter()
            .filter_map(|n| n.runtime.as_ref())
            .fold(BTreeMap::new(), |mut acc, runtime| {
                acc.entry(HOSTNAME_ATTRIBUTE.to_string())
                    .or_insert_with(Vec::new)
                    .push(runtime.host.clone());
                for (name, value) in &runtime.attributes {
                    acc.entry(name.clone())
                        .or_insert_with(Vec::new)
                        .push(value.clone());
                }
                acc
            })
    }

    fn position(&self, id: &NodeId) -> Result<usize, usize> {
        self.nodes.binary_search_by(|n| n.id.cmp(id))
    }
}
