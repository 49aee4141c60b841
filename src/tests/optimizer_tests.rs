#[cfg(test)]
mod tests {
    use crate::class_manager::ClassManager;
    use crate::method_graph::MethodBackedGraph;
    use crate::ops::OpKind;
    use crate::optimizer::{Optimizer, OptimizerConfig};
    use crate::smali_parse::parse_class;
    use crate::strategy::OptimizationStrategy;
    use crate::tests::support::method_graph;
    use crate::value::Value;
    use crate::vm::VirtualMachine;
    use std::collections::BTreeMap;

    const JUMPS: &str = r#"
.method public static jumps()V
    .registers 1
    goto :end
    const/4 v0, 0x1
    :end
    return-void
.end method
"#;

    #[test]
    fn simplify_runs_to_a_fixed_point() {
        let mut mbgraph = method_graph(JUMPS);
        let mut optimizer = Optimizer::default();

        assert!(optimizer.simplify(&mut mbgraph));
        assert_eq!(mbgraph.addresses(), vec![0]);
        assert_eq!(optimizer.sweeps(), 3);

        let counts = optimizer.optimization_counts();
        assert_eq!(counts["dead"], 1);
        assert_eq!(counts["dead_branch"], 1);

        // Nothing left to do on a second run.
        assert!(!optimizer.simplify(&mut mbgraph));
        assert_eq!(optimizer.sweeps(), 4);
        assert_eq!(optimizer.optimization_counts(), counts);
    }

    #[test]
    fn sweep_limit_stops_early() {
        let mut mbgraph = method_graph(JUMPS);
        let mut optimizer = Optimizer::new(OptimizerConfig { max_sweeps: 1 });

        assert!(optimizer.simplify(&mut mbgraph));
        assert_eq!(optimizer.sweeps(), 1);
        // The now useless goto is still there.
        assert_eq!(mbgraph.addresses(), vec![0, 1]);
    }

    #[test]
    fn clean_method_is_untouched() {
        let mut mbgraph = method_graph(
            r#"
.method public static print(Ljava/lang/String;)V
    .registers 2
    sget-object v0, Ljava/lang/System;->out:Ljava/io/PrintStream;
    invoke-virtual {v0, p0}, Ljava/io/PrintStream;->println(Ljava/lang/String;)V
    return-void
.end method
"#,
        );
        let mut optimizer = Optimizer::default();
        assert!(!optimizer.simplify(&mut mbgraph));
        assert_eq!(mbgraph.addresses(), vec![0, 2, 5]);
        assert!(optimizer.optimization_counts().values().all(|c| *c == 0));
    }

    #[test]
    fn chained_dead_code_disappears() {
        // Dropping the discarded call leaves its receiver unused in turn.
        let mut mbgraph = method_graph(
            r#"
.method public static answer()I
    .registers 3
    const-string v1, "unused"
    invoke-virtual {v1}, Ljava/lang/String;->length()I
    const/16 v0, 0x2a
    return v0
.end method
"#,
        );
        let mut optimizer = Optimizer::default();
        assert!(optimizer.simplify(&mut mbgraph));
        assert_eq!(mbgraph.addresses(), vec![0, 2]);
        assert_eq!(mbgraph.op_at(2).unwrap().name(), "return");

        let counts = optimizer.optimization_counts();
        assert_eq!(counts["dead_result"], 1);
        assert!(counts["dead_assignment"] >= 1);
    }

    #[test]
    fn code_after_a_long_loop_is_kept() {
        let mut mbgraph = method_graph(
            r#"
.method public static settle()I
    .registers 3
    const/4 v0, 0x0
    const/16 v1, 0x3e8
    :loop
    if-ge v0, v1, :end
    add-int/lit8 v0, v0, 0x1
    goto :loop
    :end
    const/4 v2, 0x7
    return v2
.end method
"#,
        );
        let mut optimizer = Optimizer::default();
        assert!(!optimizer.simplify(&mut mbgraph));
        assert_eq!(mbgraph.addresses(), vec![0, 1, 3, 5, 7, 8, 9]);
        assert_eq!(
            mbgraph.op_at(8).unwrap().kind(),
            &OpKind::Const { dest: 2, value: Value::Int(7) }
        );
    }

    #[test]
    fn branches_inside_a_handler_are_kept() {
        let mut mbgraph = method_graph(
            r#"
.method public static recover(I)I
    .registers 4
    :try_start_0
    invoke-static {}, Lcom/example/Test;->risky()V
    :try_end_0
    .catchall {:try_start_0 .. :try_end_0} :handler
    const/4 v1, 0x1
    return v1
    :handler
    move-exception v0
    if-eqz p0, :a
    const/4 v1, 0x2
    goto :ret
    :a
    const/4 v1, 0x3
    goto :ret
    :ret
    return v1
.end method
"#,
        );
        let mut optimizer = Optimizer::default();
        assert!(optimizer.simplify(&mut mbgraph));

        // Only the goto falling through to the return goes.
        assert_eq!(mbgraph.addresses(), vec![0, 3, 4, 5, 6, 8, 9, 10, 11]);
        assert_eq!(
            mbgraph.op_at(10).unwrap().kind(),
            &OpKind::Const { dest: 1, value: Value::Int(3) }
        );
        assert_eq!(mbgraph.op_at(9).unwrap().kind(), &OpKind::Goto { target: 11 });
        let counts = optimizer.optimization_counts();
        assert_eq!(counts["dead"], 0);
        assert_eq!(counts["dead_branch"], 1);
    }

    struct Counting {
        runs: usize,
    }

    impl OptimizationStrategy for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn perform(&mut self, _mbgraph: &mut MethodBackedGraph) -> bool {
            self.runs += 1;
            false
        }

        fn optimization_counts(&self) -> BTreeMap<&'static str, usize> {
            BTreeMap::from([("dead", 2), ("runs", self.runs)])
        }
    }

    #[test]
    fn counts_are_summed_across_strategies() {
        let mut mbgraph = method_graph(JUMPS);
        let mut optimizer = Optimizer::with_strategies(
            OptimizerConfig::default(),
            vec![
                Box::new(crate::strategy::DeadRemovalStrategy::new()),
                Box::new(Counting { runs: 0 }),
            ],
        );
        optimizer.simplify(&mut mbgraph);

        let counts = optimizer.optimization_counts();
        assert_eq!(counts["dead"], 3);
        assert_eq!(counts["runs"], 3);
        assert_eq!(counts["dead_branch"], 1);
    }

    #[test]
    fn whole_class_pipeline() {
        let class = parse_class(
            r#"
.class public Lcom/example/Flags;
.super Ljava/lang/Object;

.method public static isDebug()Z
    .registers 2
    const/4 v1, 0x0
    const/4 v0, 0x0
    if-eqz v0, :off
    const/4 v0, 0x1
    :off
    return v0
.end method

.method public static log(Ljava/lang/String;)V
    .registers 2
    sget-object v0, Ljava/lang/System;->out:Ljava/io/PrintStream;
    invoke-virtual {v0, p0}, Ljava/io/PrintStream;->println(Ljava/lang/String;)V
    return-void
.end method
"#,
        )
        .unwrap();

        let mut classes = ClassManager::new();
        classes.add_local_class(class.class.clone());
        let mut vm = VirtualMachine::new(classes);
        let mut optimizer = Optimizer::default();

        let mut changed = vec![];
        for method in class.methods {
            let graph = vm.execute(&method).unwrap();
            let mut mbgraph = MethodBackedGraph::new(method, graph);
            if optimizer.simplify(&mut mbgraph) {
                changed.push(mbgraph.method().name.clone());
                assert_eq!(mbgraph.addresses(), vec![0, 1, 3]);
            }
        }

        assert_eq!(changed, vec!["isDebug".to_string()]);
        let counts = optimizer.optimization_counts();
        assert_eq!(counts["dead"], 1);
        assert_eq!(counts["dead_assignment"], 1);
    }
}
