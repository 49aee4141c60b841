//! Per-path register state and the execution graph built from it.

mod execution_graph;
mod execution_node;
mod method_state;

pub use execution_graph::ExecutionGraph;
pub use execution_node::{ExecutionNode, NodeId};
pub use method_state::{MethodState, Register};
