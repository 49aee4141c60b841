use smalivm::class_manager::ClassManager;
use smalivm::method_graph::MethodBackedGraph;
use smalivm::optimizer::Optimizer;
use smalivm::smali_parse::parse_class;
use smalivm::vm::VirtualMachine;
use std::env;
use std::error::Error;
use std::fs;

// Executes every method of a smali class and strips the code that cannot matter.

//Usage: simplify <smali-file>
fn main() {
    let args: Vec<String> = env::args().collect();

    // Do everything else with the error trap
    match process_smali(&args[1]) {
        Ok(_) => {
            println!("All done");
        }
        Err(e) => {
            println!("Aborted due to error: {:?}", e);
        }
    }
}

fn process_smali(smali_file: &str) -> Result<(), Box<dyn Error>> {
    let text = fs::read_to_string(smali_file)?;
    let class = parse_class(&text)?;
    println!("{}: {} methods with code", class.class.name, class.methods.len());

    let mut vm = VirtualMachine::new(ClassManager::new());
    vm.class_manager_mut().add_local_class(class.class.clone());
    let mut optimizer = Optimizer::default();

    for method in class.methods {
        let before = method.ops().len();
        let graph = vm.execute(&method)?;
        let mut mbgraph = MethodBackedGraph::new(method, graph);
        if !optimizer.simplify(&mut mbgraph) {
            continue;
        }

        let method = mbgraph.method();
        println!("\n{} ({} -> {} instructions)", method.descriptor(), before, method.ops().len());
        for op in method.ops() {
            println!("  {:>4}: {}", op.address(), op);
        }
    }

    println!();
    for (name, count) in optimizer.optimization_counts() {
        println!("{:>16}: {}", name, count);
    }
    Ok(())
}
