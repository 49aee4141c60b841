#[cfg(test)]
mod tests {
    use crate::class_manager::{ClassManager, LocalClass};
    use crate::context::Register;
    use crate::tests::support::{execute, method};
    use crate::value::Value;
    use crate::vm::{VirtualMachine, VmConfig};

    #[test]
    fn parameters_start_unknown() {
        let m = method(
            r#"
.method public sum(IJ)J
    .registers 5
    return-wide v3
.end method
"#,
        );
        let vm = VirtualMachine::new(ClassManager::new());
        let state = vm.initial_state(&m).unwrap();
        assert_eq!(state.peek_register(Register::Local(0)), None);
        assert_eq!(state.peek_register(Register::Local(1)), Some(&Value::unknown("Lcom/example/Test;")));
        assert_eq!(state.peek_register(Register::Local(2)), Some(&Value::unknown("I")));
        assert_eq!(state.peek_register(Register::Local(3)), Some(&Value::unknown("J")));
        assert_eq!(state.peek_register(Register::Local(4)), None);
    }

    #[test]
    fn too_few_registers_is_an_error() {
        let mut m = method(
            r#"
.method public static tight(JJ)V
    .registers 4
    return-void
.end method
"#,
        );
        m.registers = 3;
        let vm = VirtualMachine::new(ClassManager::new());
        assert!(vm.initial_state(&m).is_err());
    }

    #[test]
    fn unknown_condition_forks() {
        let graph = execute(
            r#"
.method public static choose(I)I
    .registers 2
    if-eqz p0, :zero
    const/4 v0, 0x1
    return v0
    :zero
    const/4 v0, 0x0
    return v0
.end method
"#,
        );
        assert_eq!(graph.reached_addresses(), vec![0, 2, 3, 4, 5]);
        assert_eq!(graph.terminating_addresses(), vec![3, 5]);
    }

    #[test]
    fn known_condition_does_not_fork() {
        let graph = execute(
            r#"
.method public static fixed()I
    .registers 2
    const/4 v0, 0x0
    if-eqz v0, :zero
    const/4 v1, 0x1
    return v1
    :zero
    return v0
.end method
"#,
        );
        assert!(graph.is_reached(1));
        assert!(!graph.is_reached(3));
        assert!(!graph.is_reached(4));
        assert!(graph.is_reached(5));
    }

    #[test]
    fn register_comparison_with_known_values() {
        let graph = execute(
            r#"
.method public static compare()V
    .registers 2
    const/4 v0, 0x3
    const/4 v1, 0x5
    if-lt v0, v1, :less
    const/4 v0, 0x0
    :less
    return-void
.end method
"#,
        );
        assert!(!graph.is_reached(4));
        assert!(graph.is_reached(5));
    }

    #[test]
    fn arithmetic_is_folded() {
        let graph = execute(
            r#"
.method public static math()I
    .registers 3
    const/4 v0, 0x3
    mul-int/lit8 v1, v0, 0x5
    add-int v2, v1, v0
    rsub-int v2, v2, 0x64
    return v2
.end method
"#,
        );
        assert_eq!(graph.register_consensus(1, Register::Local(1)), Some(Value::Int(15)));
        assert_eq!(graph.register_consensus(3, Register::Local(2)), Some(Value::Int(18)));
        assert_eq!(graph.register_consensus(5, Register::Local(2)), Some(Value::Int(82)));
        assert_eq!(graph.register_consensus(7, Register::Return), Some(Value::Int(82)));
    }

    #[test]
    fn unchanged_loop_closes_into_a_cycle() {
        let graph = execute(
            r#"
.method public static spin(I)V
    .registers 2
    :loop
    if-eqz p0, :done
    goto :loop
    :done
    return-void
.end method
"#,
        );
        assert_eq!(graph.pile(0).len(), 1);
        assert_eq!(graph.pile(2).len(), 1);
        let head = graph.pile(0)[0];
        let back = graph.node(graph.pile(2)[0]).unwrap();
        assert_eq!(back.children(), &[head]);
        assert!(graph.node(head).unwrap().parents().len() == 1);
        assert!(graph.is_reached(3));
    }

    const COUNTER: &str = r#"
.method public static count(I)V
    .registers 2
    const/4 v0, 0x0
    :loop
    add-int/lit8 v0, v0, 0x1
    if-nez p0, :loop
    return-void
.end method
"#;

    #[test]
    fn growing_loop_is_widened_at_the_visit_limit() {
        let m = method(COUNTER);
        let config = VmConfig {
            max_address_visits: 10,
            max_nodes: 1000,
        };
        let mut vm = VirtualMachine::with_config(ClassManager::new(), config);
        let graph = vm.execute(&m).unwrap();

        // Ten concrete counts, then one node where the count is any int.
        assert_eq!(graph.pile(1).len(), 11);
        assert!(graph.is_reached(5));
        let last = graph.node(*graph.pile(1).last().unwrap()).unwrap();
        assert_eq!(last.state().unwrap().peek_register(Register::Local(0)), Some(&Value::unknown("I")));
        // Later laps loop back into it.
        assert_eq!(last.parents().len(), 2);
    }

    #[test]
    fn exit_of_a_long_concrete_loop_is_reached() {
        let graph = execute(
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
        assert!(graph.is_reached(8));
        assert!(graph.is_reached(9));
        assert_eq!(graph.pile(3).len(), 501);
        assert_eq!(graph.register_consensus(9, Register::Local(2)), Some(Value::Int(7)));
    }

    #[test]
    fn node_budget_is_enforced() {
        let m = method(COUNTER);
        let config = VmConfig {
            max_address_visits: 500,
            max_nodes: 5,
        };
        let mut vm = VirtualMachine::with_config(ClassManager::new(), config);
        let e = vm.execute(&m).unwrap_err();
        assert!(e.to_string().contains("exceeded 5 nodes"));
        assert!(e.to_string().contains("Lcom/example/Test;->count(I)V"));
    }

    #[test]
    fn instance_of_uses_class_hierarchy() {
        let text = r#"
.method public static check()V
    .registers 3
    new-instance v0, Ljava/util/ArrayList;
    instance-of v1, v0, Ljava/util/List;
    instance-of v2, v0, Ljava/util/Map;
    new-instance v0, Lcom/example/Widget;
    instance-of v1, v0, Ljava/util/List;
    return-void
.end method
"#;
        let graph = execute(text);
        assert_eq!(graph.register_consensus(2, Register::Local(1)), Some(Value::Int(1)));
        assert_eq!(graph.register_consensus(4, Register::Local(2)), Some(Value::Int(0)));
        // Unresolvable ancestry is neither true nor false.
        assert_eq!(graph.register_consensus(8, Register::Local(1)), Some(Value::unknown("Z")));

        let mut vm = VirtualMachine::new(ClassManager::new());
        vm.class_manager_mut()
            .add_local_class(LocalClass::new("Lcom/example/Widget;", Some("Ljava/util/ArrayList;"), &[]));
        assert!(vm.class_manager().is_local("Lcom/example/Widget;"));
        let graph = vm.execute(&method(text)).unwrap();
        assert_eq!(graph.register_consensus(8, Register::Local(1)), Some(Value::Int(1)));
    }

    #[test]
    fn invoke_results_are_unknown() {
        let graph = execute(
            r#"
.method public static box(I)Ljava/lang/Integer;
    .registers 2
    invoke-static {p0}, Ljava/lang/Integer;->valueOf(I)Ljava/lang/Integer;
    move-result-object v0
    return-object v0
.end method
"#,
        );
        assert_eq!(
            graph.register_consensus(3, Register::Local(0)),
            Some(Value::unknown("Ljava/lang/Integer;"))
        );
        let node = graph.first_node_at(3).unwrap();
        assert!(node.state().unwrap().was_register_read(Register::Result));
    }

    #[test]
    fn thrown_exception_reaches_matching_handler() {
        let graph = execute(
            r#"
.method public static fail()V
    .registers 1
    new-instance v0, Ljava/lang/IllegalStateException;
    :try_start_0
    throw v0
    :try_end_0
    .catch Ljava/io/IOException; {:try_start_0 .. :try_end_0} :io
    .catch Ljava/lang/RuntimeException; {:try_start_0 .. :try_end_0} :runtime
    :io
    return-void
    :runtime
    move-exception v0
    return-void
.end method
"#,
        );
        assert!(!graph.is_reached(3));
        assert!(graph.is_reached(4));
        assert!(graph.is_reached(5));
    }

    #[test]
    fn throwing_instructions_may_reach_their_handlers() {
        let graph = execute(
            r#"
.method public static guarded(I)I
    .registers 3
    const/4 v0, 0x1
    :try_start_0
    invoke-static {}, Lcom/example/Test;->risky()V
    const/4 v0, 0x2
    :try_end_0
    .catch Ljava/io/IOException; {:try_start_0 .. :try_end_0} :io
    .catchall {:try_start_0 .. :try_end_0} :any
    return v0
    :io
    move-exception v1
    return v0
    :any
    return v0
.end method
"#,
        );
        // The call may throw anything, the const never throws.
        assert!(graph.is_reached(6));
        assert!(graph.is_reached(8));
        assert_eq!(graph.pile(6).len(), 1);
        assert_eq!(graph.pile(8).len(), 1);
        assert_eq!(graph.register_consensus(8, Register::Local(0)), Some(Value::Int(1)));
        assert_eq!(graph.register_consensus(5, Register::Local(0)), Some(Value::Int(2)));
    }

    #[test]
    fn unknown_exception_may_reach_every_handler() {
        let graph = execute(
            r#"
.method public static rethrow(Ljava/lang/Throwable;)V
    .registers 2
    :try_start_0
    throw p0
    :try_end_0
    .catch Ljava/io/IOException; {:try_start_0 .. :try_end_0} :io
    .catchall {:try_start_0 .. :try_end_0} :any
    :io
    return-void
    :any
    return-void
.end method
"#,
        );
        assert!(graph.is_reached(1));
        assert!(graph.is_reached(2));
    }

    #[test]
    fn failed_cast_throws() {
        let graph = execute(
            r#"
.method public static cast()V
    .registers 1
    :try_start_0
    const-string v0, "text"
    check-cast v0, Ljava/lang/Integer;
    :try_end_0
    .catchall {:try_start_0 .. :try_end_0} :handler
    return-void
    :handler
    return-void
.end method
"#,
        );
        assert!(!graph.is_reached(4));
        assert!(graph.is_reached(5));
    }
}
