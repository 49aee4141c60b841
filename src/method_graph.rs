use crate::context::ExecutionGraph;
use crate::method::MethodImplementation;
use crate::ops::Op;
use log::{debug, info};
use rangemap::RangeMap;
use std::collections::BTreeSet;

/// Piecewise map from an old address to the number of code units removed before it.
#[derive(Debug, Default)]
struct AddressShift {
    removed_before: RangeMap<u32, u32>,
}

impl AddressShift {
    // `removed` must be ascending.
    fn new(removed: &[&Op]) -> Self {
        let mut removed_before = RangeMap::new();
        let mut total = 0;
        for op in removed {
            total += op.code_units();
            removed_before.insert(op.address() + 1..u32::MAX, total);
        }
        AddressShift { removed_before }
    }

    /// A removed address maps to wherever the next surviving instruction lands.
    fn relocate(&self, address: u32) -> u32 {
        address - self.removed_before.get(&address).copied().unwrap_or(0)
    }
}

/// A method together with the execution graph computed for it.
///
/// This is the only place instructions get removed, so the instruction list, the try/catch
/// table and the graph always agree on addresses.
#[derive(Debug, Clone)]
pub struct MethodBackedGraph {
    method: MethodImplementation,
    graph: ExecutionGraph,
}

impl MethodBackedGraph {
    pub fn new(method: MethodImplementation, graph: ExecutionGraph) -> Self {
        MethodBackedGraph { method, graph }
    }

    pub fn method(&self) -> &MethodImplementation {
        &self.method
    }

    pub fn graph(&self) -> &ExecutionGraph {
        &self.graph
    }

    pub fn addresses(&self) -> Vec<u32> {
        self.method.addresses()
    }

    pub fn op_at(&self, address: u32) -> Option<&Op> {
        self.method.op_at(address)
    }

    /// Removes the instructions at `addresses` and shifts every later address, branch target and
    /// try/catch bound down by the removed width. Nodes at removed addresses are spliced out of
    /// the graph. Addresses without an instruction are ignored.
    pub fn remove_instructions(&mut self, addresses: &[u32]) {
        let doomed: BTreeSet<u32> = addresses
            .iter()
            .copied()
            .filter(|a| self.method.op_at(*a).is_some())
            .collect();
        if doomed.is_empty() {
            return;
        }

        let removed: Vec<&Op> = doomed.iter().filter_map(|a| self.method.op_at(*a)).collect();
        for op in &removed {
            debug!("removing {} @{}", op, op.address());
        }
        let shift = AddressShift::new(&removed);

        self.method.remove_ops(&doomed, |a| shift.relocate(a));
        self.graph.remove_nodes_at(&doomed, |a| shift.relocate(a));
        info!("removed {} instructions from {}", doomed.len(), self.method.descriptor());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::find_opcode;
    use crate::ops::OpKind;

    #[test]
    fn shift_is_piecewise() {
        let nop = find_opcode("nop").unwrap();
        let wide = find_opcode("const-wide").unwrap();
        let a = Op::new(2, nop, OpKind::Nop);
        let b = Op::new(6, wide, OpKind::Nop);
        let shift = AddressShift::new(&[&a, &b]);

        assert_eq!(shift.relocate(0), 0);
        assert_eq!(shift.relocate(2), 2);
        assert_eq!(shift.relocate(3), 2);
        assert_eq!(shift.relocate(6), 5);
        assert_eq!(shift.relocate(11), 5);
        assert_eq!(shift.relocate(20), 14);
    }
}
