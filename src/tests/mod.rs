mod class_manager_tests;
mod optimizer_tests;
mod vm_tests;

#[cfg(test)]
pub(crate) mod support {
    use crate::class_manager::ClassManager;
    use crate::context::ExecutionGraph;
    use crate::method::MethodImplementation;
    use crate::method_graph::MethodBackedGraph;
    use crate::smali_parse::parse_method;
    use crate::vm::VirtualMachine;

    pub const TEST_CLASS: &str = "Lcom/example/Test;";

    pub fn method(text: &str) -> MethodImplementation {
        parse_method(TEST_CLASS, text).unwrap()
    }

    pub fn execute(text: &str) -> ExecutionGraph {
        let m = method(text);
        VirtualMachine::new(ClassManager::new()).execute(&m).unwrap()
    }

    pub fn method_graph(text: &str) -> MethodBackedGraph {
        let m = method(text);
        let graph = VirtualMachine::new(ClassManager::new()).execute(&m).unwrap();
        MethodBackedGraph::new(m, graph)
    }
}
