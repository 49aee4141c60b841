//! # Smalivm
//!
//! A symbolic virtual machine for Android smali methods and a dead code optimizer driven by it.
//!
//! A method is executed along every path whose branch conditions cannot be decided, producing an
//! [`ExecutionGraph`](context::ExecutionGraph) of per-path register states. Optimization
//! strategies read that graph to decide which instructions can go.
//!
//! # Examples
//!
//! ```
//!  use smalivm::class_manager::ClassManager;
//!  use smalivm::method_graph::MethodBackedGraph;
//!  use smalivm::optimizer::Optimizer;
//!  use smalivm::smali_parse::parse_method;
//!  use smalivm::vm::VirtualMachine;
//!
//!  let method = parse_method("Lcom/example/Foo;", r#"
//!  .method public static answer()I
//!      .registers 2
//!      const/4 v1, 0x7
//!      const/16 v0, 0x2a
//!      return v0
//!  .end method
//!  "#).unwrap();
//!
//!  let mut vm = VirtualMachine::new(ClassManager::new());
//!  let graph = vm.execute(&method).unwrap();
//!  let mut mbgraph = MethodBackedGraph::new(method, graph);
//!
//!  let mut optimizer = Optimizer::default();
//!  assert!(optimizer.simplify(&mut mbgraph));
//!  assert_eq!(mbgraph.addresses(), vec![0, 2]);
//!  assert_eq!(optimizer.optimization_counts()["dead_assignment"], 1);
//! ```

#[macro_use]
pub mod error;

pub mod class_manager;
pub mod context;
mod framework;
pub mod method;
pub mod method_graph;
pub mod opcodes;
pub mod ops;
pub mod optimizer;
pub mod smali_parse;
pub mod strategy;
mod tests;
pub mod types;
pub mod value;
pub mod vm;
