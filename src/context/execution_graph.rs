use crate::context::execution_node::{ExecutionNode, NodeId};
use crate::context::method_state::{MethodState, Register};
use crate::value::Value;
use log::{debug, trace};
use std::collections::{BTreeMap, BTreeSet};

/// The result of executing a method along every reachable path.
///
/// Nodes live in an arena and are addressed by [`NodeId`]. Nodes sharing an instruction address
/// form that address's pile, an address is reached iff its pile is non-empty. Edges may form
/// cycles, traversals must carry their own visited set.
#[derive(Debug, Clone, Default)]
pub struct ExecutionGraph {
    nodes: Vec<Option<ExecutionNode>>,
    piles: BTreeMap<u32, Vec<NodeId>>,
    roots: Vec<NodeId>,
}

impl ExecutionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, address: u32, state: Option<MethodState>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(ExecutionNode::new(address, state)));
        self.piles.entry(address).or_default().push(id);
        id
    }

    /// Adds an entry node of the method.
    pub fn add_root(&mut self, address: u32, state: Option<MethodState>) -> NodeId {
        let id = self.insert(address, state);
        self.roots.push(id);
        id
    }

    pub fn add_child(&mut self, parent: NodeId, address: u32, state: Option<MethodState>) -> NodeId {
        let id = self.insert(address, state);
        self.connect(parent, id);
        id
    }

    /// Adds the edge `parent -> child` unless it already exists.
    pub fn connect(&mut self, parent: NodeId, child: NodeId) {
        if let Some(p) = self.node_mut(parent) {
            if p.children.contains(&child) {
                return;
            }
            p.children.push(child);
        }
        if let Some(c) = self.node_mut(child) {
            c.parents.push(parent);
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&ExecutionNode> {
        self.nodes.get(id.0).and_then(|n| n.as_ref())
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut ExecutionNode> {
        self.nodes.get_mut(id.0).and_then(|n| n.as_mut())
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node_count(&self) -> usize {
        self.piles.values().map(|p| p.len()).sum()
    }

    /// Every node executed at `address`, empty when the address was never reached.
    pub fn pile(&self, address: u32) -> &[NodeId] {
        self.piles.get(&address).map(|p| p.as_slice()).unwrap_or(&[])
    }

    pub fn is_reached(&self, address: u32) -> bool {
        !self.pile(address).is_empty()
    }

    pub fn reached_addresses(&self) -> Vec<u32> {
        self.piles.iter().filter(|(_, p)| !p.is_empty()).map(|(a, _)| *a).collect()
    }

    /// The template node of an address: the first one created there.
    pub fn first_node_at(&self, address: u32) -> Option<&ExecutionNode> {
        self.pile(address).first().and_then(|id| self.node(*id))
    }

    /// Children of every node at `address`, without duplicates.
    pub fn children_at_address(&self, address: u32) -> Vec<NodeId> {
        let mut seen = BTreeSet::new();
        let mut children = vec![];
        for id in self.pile(address) {
            if let Some(node) = self.node(*id) {
                for child in &node.children {
                    if seen.insert(*child) {
                        children.push(*child);
                    }
                }
            }
        }
        children
    }

    /// The value `register` holds after `address` when every path agrees on it.
    pub fn register_consensus(&self, address: u32, register: Register) -> Option<Value> {
        let mut consensus: Option<&Value> = None;
        for id in self.pile(address) {
            let value = self.node(*id)?.state()?.peek_register(register)?;
            match consensus {
                None => consensus = Some(value),
                Some(c) if c != value => return None,
                Some(_) => {}
            }
        }
        consensus.cloned()
    }

    /// Addresses where at least one path ends.
    pub fn terminating_addresses(&self) -> Vec<u32> {
        let mut addresses: BTreeSet<u32> = BTreeSet::new();
        for node in self.nodes.iter().flatten() {
            if node.is_leaf() {
                addresses.insert(node.address);
            }
        }
        addresses.into_iter().collect()
    }

    /// Drops every node located at one of `addresses`, wiring its parents to its children, then
    /// moves the surviving nodes to `relocate(address)`.
    pub(crate) fn remove_nodes_at<F>(&mut self, addresses: &BTreeSet<u32>, relocate: F)
    where
        F: Fn(u32) -> u32,
    {
        let doomed: Vec<NodeId> = addresses
            .iter()
            .flat_map(|a| self.pile(*a).to_vec())
            .collect();

        for id in doomed {
            self.splice_out(id);
        }

        let mut piles: BTreeMap<u32, Vec<NodeId>> = BTreeMap::new();
        for (index, slot) in self.nodes.iter_mut().enumerate() {
            if let Some(node) = slot {
                node.address = relocate(node.address);
                piles.entry(node.address).or_default().push(NodeId(index));
            }
        }
        self.piles = piles;
        debug!("{} nodes left after removal", self.node_count());
    }

    fn splice_out(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id.0).and_then(|n| n.take()) else {
            return;
        };
        trace!("splicing out node {id} at {}", node.address);

        let parents: Vec<NodeId> = node.parents.into_iter().filter(|p| *p != id).collect();
        let children: Vec<NodeId> = node.children.into_iter().filter(|c| *c != id).collect();

        for p in &parents {
            if let Some(parent) = self.node_mut(*p) {
                parent.children.retain(|c| *c != id);
            }
        }
        for c in &children {
            if let Some(child) = self.node_mut(*c) {
                child.parents.retain(|p| *p != id);
            }
        }
        for p in &parents {
            for c in &children {
                self.connect(*p, *c);
            }
        }

        if let Some(pos) = self.roots.iter().position(|r| *r == id) {
            self.roots.remove(pos);
            for c in children {
                if !self.roots.contains(&c) {
                    self.roots.push(c);
                }
            }
        }
    }
}
