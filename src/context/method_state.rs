use crate::value::Value;
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A register slot of one execution path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Register {
    Local(u16),
    /// The hidden register filled by invokes and read by `move-result`.
    Result,
    Return,
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::Local(n) => write!(f, "r{n}"),
            Register::Result => write!(f, "result"),
            Register::Return => write!(f, "return"),
        }
    }
}

/// Register bindings of one execution node plus the accesses made by its instruction.
///
/// Bindings are inherited from the parent node when a child state is spawned, the read and
/// assignment history is not. History only ever grows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodState {
    registers: BTreeMap<Register, Value>,
    reads: BTreeSet<Register>,
    assigns: BTreeSet<Register>,
    register_count: u16,
}

impl MethodState {
    pub fn new(register_count: u16) -> Self {
        MethodState {
            register_count,
            ..Default::default()
        }
    }

    /// New state for a successor node: same bindings, empty history.
    pub fn spawn_child(&self) -> MethodState {
        MethodState {
            registers: self.registers.clone(),
            reads: BTreeSet::new(),
            assigns: BTreeSet::new(),
            register_count: self.register_count,
        }
    }

    pub fn register_count(&self) -> u16 {
        self.register_count
    }

    pub fn assign_register(&mut self, register: u16, value: Value) {
        self.assign(Register::Local(register), value);
    }

    pub fn assign_result_register(&mut self, value: Value) {
        self.assign(Register::Result, value);
    }

    pub fn assign_return_register(&mut self, value: Value) {
        self.assign(Register::Return, value);
    }

    fn assign(&mut self, register: Register, value: Value) {
        trace!("assign {register} = {value}");
        self.assigns.insert(register);
        self.registers.insert(register, value);
    }

    /// Reads a local register. An unbound register reads as an unknown value of unknown type.
    pub fn read_register(&mut self, register: u16) -> Value {
        self.read(Register::Local(register))
    }

    pub fn read_result_register(&mut self) -> Value {
        self.read(Register::Result)
    }

    fn read(&mut self, register: Register) -> Value {
        self.reads.insert(register);
        self.registers
            .get(&register)
            .cloned()
            .unwrap_or_else(|| Value::unknown("?"))
    }

    /// Looks at a binding without recording a read.
    pub fn peek_register(&self, register: Register) -> Option<&Value> {
        self.registers.get(&register)
    }

    pub fn was_register_read(&self, register: Register) -> bool {
        self.reads.contains(&register)
    }

    pub fn was_register_assigned(&self, register: Register) -> bool {
        self.assigns.contains(&register)
    }

    pub fn registers_read(&self) -> Vec<Register> {
        self.reads.iter().copied().collect()
    }

    pub fn registers_assigned(&self) -> Vec<Register> {
        self.assigns.iter().copied().collect()
    }

    pub fn bindings(&self) -> &BTreeMap<Register, Value> {
        &self.registers
    }

    pub(crate) fn same_bindings(&self, other: &MethodState) -> bool {
        self.registers == other.registers
    }

    /// Child of this state where every binding that differs in any of `others` becomes unknown.
    /// The type is kept when all the differing values agree on it.
    pub(crate) fn widened<'a, I>(&self, others: I) -> MethodState
    where
        I: IntoIterator<Item = &'a MethodState>,
    {
        let mut widened = self.spawn_child();
        for other in others {
            for (register, value) in widened.registers.iter_mut() {
                let type_name = match other.registers.get(register) {
                    Some(seen) if *seen == *value => continue,
                    Some(seen) if seen.type_name() != value.type_name() => "?".to_string(),
                    _ => value.type_name(),
                };
                *value = Value::Unknown(type_name);
            }
        }
        widened
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_and_assign_history() {
        let mut state = MethodState::new(2);
        state.assign_register(0, Value::Int(42));
        assert_eq!(state.read_register(0), Value::Int(42));
        assert!(state.was_register_assigned(Register::Local(0)));
        assert!(state.was_register_read(Register::Local(0)));
        assert!(!state.was_register_read(Register::Local(1)));
    }

    #[test]
    fn unbound_register_is_unknown() {
        let mut state = MethodState::new(1);
        assert!(state.read_register(0).is_unknown());
        assert!(state.was_register_read(Register::Local(0)));
    }

    #[test]
    fn child_inherits_bindings_not_history() {
        let mut state = MethodState::new(2);
        state.assign_register(1, Value::Str("hi".to_string()));
        state.assign_result_register(Value::Int(7));

        let mut child = state.spawn_child();
        assert!(child.registers_assigned().is_empty());
        assert!(child.same_bindings(&state));
        assert_eq!(child.read_result_register(), Value::Int(7));
        assert_eq!(child.registers_read(), vec![Register::Result]);
        assert_eq!(child.peek_register(Register::Local(1)), Some(&Value::Str("hi".to_string())));
    }

    #[test]
    fn widening_forgets_changing_registers() {
        let mut first = MethodState::new(3);
        first.assign_register(0, Value::Int(1));
        first.assign_register(1, Value::Int(7));
        first.assign_register(2, Value::Str("a".to_string()));
        let mut second = first.spawn_child();
        second.assign_register(0, Value::Int(2));
        second.assign_register(2, Value::Int(0));

        let mut incoming = second.spawn_child();
        incoming.assign_register(0, Value::Int(3));

        let widened = incoming.widened([&first, &second]);
        assert!(widened.registers_assigned().is_empty());
        assert_eq!(widened.peek_register(Register::Local(0)), Some(&Value::unknown("I")));
        assert_eq!(widened.peek_register(Register::Local(1)), Some(&Value::Int(7)));
        assert_eq!(widened.peek_register(Register::Local(2)), Some(&Value::unknown("?")));

        // Widening again against the result changes nothing.
        let again = widened.widened([&first, &second, &widened]);
        assert!(again.same_bindings(&widened));
    }
}
