use crate::ops::Op;
use crate::types::MethodSignature;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One `.catch` or `.catchall` entry of a try block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionHandler {
    /// `None` catches everything.
    pub exception_type: Option<String>,
    pub handler: u32,
}

/// A protected address range, `end` exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TryBlock {
    pub start: u32,
    pub end: u32,
    pub handlers: Vec<ExceptionHandler>,
}

impl TryBlock {
    pub fn covers(&self, address: u32) -> bool {
        self.start <= address && address < self.end
    }
}

/// The code of one method: instructions ordered by address plus its try/catch table.
#[derive(Debug, Clone)]
pub struct MethodImplementation {
    pub class_name: String,
    pub name: String,
    pub signature: MethodSignature,
    pub is_static: bool,
    /// Total register count, parameters included.
    pub registers: u16,
    ops: Vec<Op>,
    try_blocks: Vec<TryBlock>,
}

impl MethodImplementation {
    pub fn new(
        class_name: &str,
        name: &str,
        signature: MethodSignature,
        is_static: bool,
        registers: u16,
        mut ops: Vec<Op>,
        try_blocks: Vec<TryBlock>,
    ) -> Self {
        ops.sort_by_key(|op| op.address());
        MethodImplementation {
            class_name: class_name.to_string(),
            name: name.to_string(),
            signature,
            is_static,
            registers,
            ops,
            try_blocks,
        }
    }

    /// e.g. `Lcom/example/Foo;->bar(I)V`
    pub fn descriptor(&self) -> String {
        format!("{}->{}{}", self.class_name, self.name, self.signature.to_jni())
    }

    /// Registers holding the incoming arguments, `this` included.
    pub fn ins_size(&self) -> u16 {
        self.signature.parameter_words() + if self.is_static { 0 } else { 1 }
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn op_at(&self, address: u32) -> Option<&Op> {
        self.ops
            .binary_search_by_key(&address, |op| op.address())
            .ok()
            .map(|i| &self.ops[i])
    }

    pub fn addresses(&self) -> Vec<u32> {
        self.ops.iter().map(|op| op.address()).collect()
    }

    /// Length of the code in 16-bit units.
    pub fn code_units(&self) -> u32 {
        self.ops.last().map(|op| op.next_address()).unwrap_or(0)
    }

    pub fn try_blocks(&self) -> &[TryBlock] {
        &self.try_blocks
    }

    /// Entry addresses of every exception handler, ascending.
    pub fn handler_addresses(&self) -> Vec<u32> {
        let set: BTreeSet<u32> = self
            .try_blocks
            .iter()
            .flat_map(|t| t.handlers.iter().map(|h| h.handler))
            .collect();
        set.into_iter().collect()
    }

    /// Handlers protecting `address`, innermost try block first.
    pub fn handlers_for(&self, address: u32) -> Vec<&ExceptionHandler> {
        self.try_blocks
            .iter()
            .filter(|t| t.covers(address))
            .flat_map(|t| t.handlers.iter())
            .collect()
    }

    /// Drops the instructions at `addresses` and moves everything else through `relocate`.
    /// Try blocks left without instructions are dropped.
    pub(crate) fn remove_ops<F>(&mut self, addresses: &BTreeSet<u32>, relocate: F)
    where
        F: Fn(u32) -> u32,
    {
        self.ops.retain(|op| !addresses.contains(&op.address()));
        for op in self.ops.iter_mut() {
            op.relocate(&relocate);
        }
        for block in self.try_blocks.iter_mut() {
            block.start = relocate(block.start);
            block.end = relocate(block.end);
            for handler in block.handlers.iter_mut() {
                handler.handler = relocate(handler.handler);
            }
        }
        self.try_blocks.retain(|t| t.start < t.end);
    }
}
