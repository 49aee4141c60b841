use crate::class_manager::ClassManager;
use crate::context::{ExecutionGraph, MethodState, NodeId};
use crate::error::VmError;
use crate::method::MethodImplementation;
use crate::ops::Flow;
use crate::value::Value;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Limits on how much work one method execution may do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Distinct paths explored through one address before the registers that differ between
    /// them are widened to unknown values.
    pub max_address_visits: usize,
    /// Most nodes in one graph, exceeding it fails the execution.
    pub max_nodes: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            max_address_visits: 500,
            max_nodes: 100_000,
        }
    }
}

/// Executes methods symbolically along every feasible path.
pub struct VirtualMachine {
    classes: ClassManager,
    config: VmConfig,
}

struct PendingVisit {
    parent: Option<NodeId>,
    address: u32,
    entry: MethodState,
}

impl VirtualMachine {
    pub fn new(classes: ClassManager) -> Self {
        Self::with_config(classes, VmConfig::default())
    }

    pub fn with_config(classes: ClassManager, config: VmConfig) -> Self {
        VirtualMachine { classes, config }
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn class_manager(&self) -> &ClassManager {
        &self.classes
    }

    pub fn class_manager_mut(&mut self) -> &mut ClassManager {
        &mut self.classes
    }

    /// Registers on method entry: `this` and every parameter hold an unknown value of their
    /// declared type, locals are unbound.
    pub fn initial_state(&self, method: &MethodImplementation) -> Result<MethodState, VmError> {
        let ins = method.ins_size();
        if ins > method.registers {
            fail!(
                ("{} registers cannot hold {} parameter words", method.registers, ins),
                ("{}", method.descriptor())
            );
        }

        let mut state = MethodState::new(method.registers);
        let mut reg = method.registers - ins;
        if !method.is_static {
            state.assign_register(reg, Value::Unknown(method.class_name.clone()));
            reg += 1;
        }
        for arg in &method.signature.args {
            state.assign_register(reg, Value::Unknown(arg.to_jni()));
            reg += if arg.is_wide() { 2 } else { 1 };
        }
        Ok(state)
    }

    pub fn execute(&mut self, method: &MethodImplementation) -> Result<ExecutionGraph, VmError> {
        let initial = self.initial_state(method)?;
        self.execute_with_state(method, initial)
    }

    /// Explores the method from its first instruction with `initial` as the register state.
    pub fn execute_with_state(
        &mut self,
        method: &MethodImplementation,
        initial: MethodState,
    ) -> Result<ExecutionGraph, VmError> {
        debug!("executing {}", method.descriptor());
        let mut graph = ExecutionGraph::new();
        let Some(first) = method.ops().first() else {
            return Ok(graph);
        };

        let mut entries: HashMap<NodeId, MethodState> = HashMap::new();
        let mut work = VecDeque::from([PendingVisit {
            parent: None,
            address: first.address(),
            entry: initial.spawn_child(),
        }]);
        let mut widened = 0usize;

        while let Some(PendingVisit { parent, address, mut entry }) = work.pop_front() {
            let Some(op) = method.op_at(address) else {
                warn!("no instruction at {} in {}", address, method.descriptor());
                continue;
            };

            // An identical path already ran from here, join it.
            if let Some(existing) = joinable(&graph, &entries, address, &entry) {
                if let Some(parent) = parent {
                    graph.connect(parent, existing);
                }
                continue;
            }

            // Too many distinct paths through here: forget whatever keeps changing so later
            // paths converge on one node.
            if graph.pile(address).len() >= self.config.max_address_visits {
                widened += 1;
                debug!("{} visits to {} in {}, widening", graph.pile(address).len(), address, method.descriptor());
                let wide = entry.widened(graph.pile(address).iter().filter_map(|id| entries.get(id)));
                if let Some(existing) = joinable(&graph, &entries, address, &wide) {
                    if let Some(parent) = parent {
                        graph.connect(parent, existing);
                    }
                    continue;
                }
                entry = wide;
            }
            if graph.node_count() >= self.config.max_nodes {
                fail!(
                    ("execution exceeded {} nodes", self.config.max_nodes),
                    ("{}", method.descriptor())
                );
            }

            // Exceptional exits leave before the instruction's own effects.
            let mut state = entry.clone();
            let mut exits: Vec<(u32, MethodState)> = vec![];
            match op.execute(&mut state, &mut self.classes) {
                Flow::Next(successors) => {
                    exits.extend(successors.into_iter().map(|a| (a, state.spawn_child())));
                    if op.can_throw() && !method.handlers_for(address).is_empty() {
                        for handler in self.exception_targets(method, address, None) {
                            exits.push((handler, entry.spawn_child()));
                        }
                    }
                }
                Flow::Throw(exception) => {
                    for handler in self.exception_targets(method, address, exception.as_deref()) {
                        exits.push((handler, entry.spawn_child()));
                    }
                }
            }

            let id = match parent {
                Some(parent) => graph.add_child(parent, address, Some(state)),
                None => graph.add_root(address, Some(state)),
            };
            entries.insert(id, entry);
            work.extend(exits.into_iter().map(|(address, entry)| PendingVisit {
                parent: Some(id),
                address,
                entry,
            }));
        }

        if widened > 0 {
            warn!(
                "{} paths in {} were widened after {} visits to an address",
                widened,
                method.descriptor(),
                self.config.max_address_visits
            );
        }
        info!("executed {} into {} nodes", method.descriptor(), graph.node_count());
        Ok(graph)
    }

    // Handlers that may catch an exception thrown at `address`. An unknown exception type may be
    // caught by any of them.
    fn exception_targets(
        &mut self,
        method: &MethodImplementation,
        address: u32,
        exception: Option<&str>,
    ) -> Vec<u32> {
        let mut targets = vec![];
        for handler in method.handlers_for(address) {
            let caught = match (&handler.exception_type, exception) {
                (None, _) => Some(true),
                (Some(_), None) => None,
                (Some(catch_type), Some(thrown)) => match self.classes.is_instance(thrown, catch_type) {
                    Ok(caught) => Some(caught),
                    Err(_) => None,
                },
            };
            match caught {
                Some(true) => {
                    if !targets.contains(&handler.handler) {
                        targets.push(handler.handler);
                    }
                    break;
                }
                Some(false) => {}
                None => {
                    if !targets.contains(&handler.handler) {
                        targets.push(handler.handler);
                    }
                }
            }
        }
        if targets.is_empty() {
            debug!("exception at {} leaves {}", address, method.descriptor());
        }
        targets
    }
}

// A node at `address` whose entry bindings match `entry`.
fn joinable(
    graph: &ExecutionGraph,
    entries: &HashMap<NodeId, MethodState>,
    address: u32,
    entry: &MethodState,
) -> Option<NodeId> {
    graph
        .pile(address)
        .iter()
        .copied()
        .find(|id| entries.get(id).is_some_and(|e| e.same_bindings(entry)))
}
