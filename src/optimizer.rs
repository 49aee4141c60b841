use crate::method_graph::MethodBackedGraph;
use crate::strategy::{DeadRemovalStrategy, OptimizationStrategy};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Upper bound on sweeps over all strategies for one method.
    pub max_sweeps: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig { max_sweeps: 100 }
    }
}

/// Runs its strategies over a method until none of them changes anything.
pub struct Optimizer {
    strategies: Vec<Box<dyn OptimizationStrategy>>,
    config: OptimizerConfig,
    sweeps: usize,
}

impl Default for Optimizer {
    fn default() -> Self {
        Optimizer::new(OptimizerConfig::default())
    }
}

impl Optimizer {
    /// An optimizer running dead code removal.
    pub fn new(config: OptimizerConfig) -> Self {
        Self::with_strategies(config, vec![Box::new(DeadRemovalStrategy::new())])
    }

    pub fn with_strategies(config: OptimizerConfig, strategies: Vec<Box<dyn OptimizationStrategy>>) -> Self {
        Optimizer {
            strategies,
            config,
            sweeps: 0,
        }
    }

    /// Total sweeps run so far.
    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    /// Returns whether the method changed at all.
    pub fn simplify(&mut self, mbgraph: &mut MethodBackedGraph) -> bool {
        let mut changed_any = false;
        for sweep in 0..self.config.max_sweeps {
            let mut changed = false;
            for strategy in self.strategies.iter_mut() {
                if strategy.perform(mbgraph) {
                    debug!("sweep {}: {} changed {}", sweep, strategy.name(), mbgraph.method().descriptor());
                    changed = true;
                }
            }
            self.sweeps += 1;
            if !changed {
                info!("simplified {} after {} sweeps", mbgraph.method().descriptor(), sweep + 1);
                return changed_any;
            }
            changed_any = true;
        }
        warn!(
            "{} still changing after {} sweeps",
            mbgraph.method().descriptor(),
            self.config.max_sweeps
        );
        changed_any
    }

    /// Counters of every strategy, summed by name.
    pub fn optimization_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for strategy in &self.strategies {
            for (name, count) in strategy.optimization_counts() {
                *counts.entry(name).or_insert(0) += count;
            }
        }
        counts
    }
}
