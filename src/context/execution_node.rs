use crate::context::method_state::MethodState;
use std::fmt;

/// Index of a node inside its [`ExecutionGraph`](crate::context::ExecutionGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One visit of one instruction on one execution path.
///
/// `state` holds the registers after the instruction ran. A node without a state stands for a
/// path whose context was lost, every consumer must treat it conservatively.
#[derive(Debug, Clone)]
pub struct ExecutionNode {
    pub(crate) address: u32,
    pub(crate) state: Option<MethodState>,
    pub(crate) parents: Vec<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl ExecutionNode {
    pub(crate) fn new(address: u32, state: Option<MethodState>) -> Self {
        ExecutionNode {
            address,
            state,
            parents: vec![],
            children: vec![],
        }
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn state(&self) -> Option<&MethodState> {
        self.state.as_ref()
    }

    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}
