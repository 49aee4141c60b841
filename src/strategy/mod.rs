//! Optimizations applied to an executed method.

mod dead_removal;

pub use dead_removal::DeadRemovalStrategy;

use crate::method_graph::MethodBackedGraph;
use std::collections::BTreeMap;

/// One kind of rewrite over a [`MethodBackedGraph`].
pub trait OptimizationStrategy {
    fn name(&self) -> &'static str;

    /// Runs a single pass, returning whether anything changed.
    fn perform(&mut self, mbgraph: &mut MethodBackedGraph) -> bool;

    /// Cumulative counters of everything this strategy changed so far.
    fn optimization_counts(&self) -> BTreeMap<&'static str, usize>;
}
