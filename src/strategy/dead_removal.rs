use crate::context::{NodeId, Register};
use crate::method_graph::MethodBackedGraph;
use crate::ops::{InvokeKind, OpKind, SideEffect};
use crate::strategy::OptimizationStrategy;
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Removes instructions whose execution cannot matter.
///
/// Four kinds of instruction are candidates:
/// * never reached on any path,
/// * assigning registers that no later path reads before overwriting them,
/// * non-void invokes whose result is never moved out,
/// * `goto`s jumping to the very next instruction.
///
/// Nothing above [`SideEffect::Weak`], nothing inside an exception handler, no `nop` and never the
/// last instruction of a method is removed.
#[derive(Debug, Default)]
pub struct DeadRemovalStrategy {
    addresses: Vec<u32>,
    dead_count: usize,
    dead_assignment_count: usize,
    dead_result_count: usize,
    dead_branch_count: usize,
}

impl DeadRemovalStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidate addresses from the last refresh.
    pub fn valid_addresses(&self) -> &[u32] {
        &self.addresses
    }

    /// Recomputes which addresses may be removed at all.
    pub fn update_valid_addresses(&mut self, mbgraph: &MethodBackedGraph) {
        let method = mbgraph.method();
        let mut valid: BTreeSet<u32> = method.addresses().into_iter().collect();
        valid.pop_last();

        for handler in method.handler_addresses() {
            for address in handler_region(mbgraph, handler) {
                valid.remove(&address);
            }
        }

        valid.retain(|address| match method.op_at(*address) {
            Some(op) => op.side_effect() <= SideEffect::Weak && !op.is_nop(),
            None => false,
        });
        self.addresses = valid.into_iter().collect();
    }

    /// Candidates nobody ever reached.
    pub fn dead_addresses(&self, mbgraph: &MethodBackedGraph) -> Vec<u32> {
        self.addresses
            .iter()
            .copied()
            .filter(|a| !mbgraph.graph().is_reached(*a))
            .collect()
    }

    /// Candidates whose assignments are overwritten or dropped on every path before being read.
    pub fn dead_assignment_addresses(&self, mbgraph: &MethodBackedGraph) -> Vec<u32> {
        let graph = mbgraph.graph();
        let mut dead = vec![];
        for address in self.addresses.iter().copied() {
            let Some(node) = graph.first_node_at(address) else {
                continue;
            };
            let Some(state) = node.state() else {
                warn!("no state for the first node at {address}, skipping");
                continue;
            };

            let assigned: Vec<Register> = state
                .registers_assigned()
                .into_iter()
                .filter(|r| *r != Register::Return)
                .collect();
            if assigned.is_empty() {
                continue;
            }

            let children = graph.children_at_address(address);
            if assigned.iter().all(|r| !is_register_live(mbgraph, &children, *r)) {
                debug!("assignment of {assigned:?} at {address} is dead");
                dead.push(address);
            }
        }
        dead
    }

    /// Non-void invokes whose result is discarded. `invoke-direct` is left alone.
    pub fn dead_result_addresses(&self, mbgraph: &MethodBackedGraph) -> Vec<u32> {
        let mut dead = vec![];
        for address in self.addresses.iter().copied() {
            let Some(op) = mbgraph.op_at(address) else {
                continue;
            };
            let OpKind::Invoke { kind, method, .. } = op.kind() else {
                continue;
            };
            if method.returns_void() || *kind == InvokeKind::Direct {
                continue;
            }
            match mbgraph.op_at(op.next_address()) {
                Some(next) if next.name().starts_with("move-result") => {}
                _ => dead.push(address),
            }
        }
        dead
    }

    /// Gotos whose target is the following instruction.
    pub fn useless_branch_addresses(&self, mbgraph: &MethodBackedGraph) -> Vec<u32> {
        self.addresses
            .iter()
            .copied()
            .filter(|a| match mbgraph.op_at(*a) {
                Some(op) => op.is_goto() && op.branch_offset() == Some(op.code_units() as i64),
                None => false,
            })
            .collect()
    }
}

// The handler entry and every instruction after it while execution can fall through, the first
// one that cannot included.
fn handler_region(mbgraph: &MethodBackedGraph, handler: u32) -> Vec<u32> {
    let ops = mbgraph.method().ops();
    let Some(start) = ops.iter().position(|op| op.address() == handler) else {
        return vec![];
    };
    let mut region = vec![];
    for op in &ops[start..] {
        region.push(op.address());
        if !op.can_continue() {
            break;
        }
    }
    region
}

// A register is live when some path from `start` reads it before assigning it. Nodes without a
// state count as reads. An instruction that throws into a handler never made its assignment, so
// the handler paths behind it are still searched.
fn is_register_live(mbgraph: &MethodBackedGraph, start: &[NodeId], register: Register) -> bool {
    let graph = mbgraph.graph();
    let mut stack: Vec<NodeId> = start.to_vec();
    let mut visited: HashSet<NodeId> = HashSet::new();

    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        let Some(node) = graph.node(id) else {
            continue;
        };
        let Some(state) = node.state() else {
            warn!("no state for node {id} at {}, assuming {register} is read", node.address());
            return true;
        };
        if state.was_register_read(register) {
            return true;
        }
        if state.was_register_assigned(register) {
            let handlers = throw_targets(mbgraph, node.address());
            stack.extend(
                node.children()
                    .iter()
                    .copied()
                    .filter(|c| graph.node(*c).is_some_and(|n| handlers.contains(&n.address()))),
            );
            continue;
        }
        stack.extend(node.children().iter().copied());
    }
    false
}

fn throw_targets(mbgraph: &MethodBackedGraph, address: u32) -> Vec<u32> {
    let method = mbgraph.method();
    match method.op_at(address) {
        Some(op) if op.can_throw() => method.handlers_for(address).iter().map(|h| h.handler).collect(),
        _ => vec![],
    }
}

impl OptimizationStrategy for DeadRemovalStrategy {
    fn name(&self) -> &'static str {
        "dead code removal"
    }

    fn perform(&mut self, mbgraph: &mut MethodBackedGraph) -> bool {
        self.update_valid_addresses(mbgraph);

        let dead = self.dead_addresses(mbgraph);
        let dead_assignments = self.dead_assignment_addresses(mbgraph);
        let dead_results = self.dead_result_addresses(mbgraph);
        let dead_branches = self.useless_branch_addresses(mbgraph);

        self.dead_count += dead.len();
        self.dead_assignment_count += dead_assignments.len();
        self.dead_result_count += dead_results.len();
        self.dead_branch_count += dead_branches.len();

        let removable: BTreeSet<u32> = dead
            .into_iter()
            .chain(dead_assignments)
            .chain(dead_results)
            .chain(dead_branches)
            .collect();
        if removable.is_empty() {
            return false;
        }

        info!("removing {} dead instructions from {}", removable.len(), mbgraph.method().descriptor());
        let removable: Vec<u32> = removable.into_iter().collect();
        mbgraph.remove_instructions(&removable);
        // Everything after a removed instruction moved.
        self.update_valid_addresses(mbgraph);
        true
    }

    fn optimization_counts(&self) -> BTreeMap<&'static str, usize> {
        BTreeMap::from([
            ("dead", self.dead_count),
            ("dead_assignment", self.dead_assignment_count),
            ("dead_result", self.dead_result_count),
            ("dead_branch", self.dead_branch_count),
        ])
    }
}
