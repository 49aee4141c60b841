//! The instruction model: one [`Op`] per bytecode instruction of a method.

mod execute;

pub(crate) use execute::Flow;

use crate::framework::{is_immutable_class, is_safe_class};
use crate::opcodes::Opcode;
use crate::types::{FieldRef, MethodRef};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How much an instruction can be observed from outside the method.
///
/// Only instructions at or below [`SideEffect::Weak`] may ever be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SideEffect {
    None,
    Weak,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfComparison {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl IfComparison {
    pub(crate) fn from_suffix(s: &str) -> Option<IfComparison> {
        match s {
            "eq" => Some(IfComparison::Eq),
            "ne" => Some(IfComparison::Ne),
            "lt" => Some(IfComparison::Lt),
            "ge" => Some(IfComparison::Ge),
            "gt" => Some(IfComparison::Gt),
            "le" => Some(IfComparison::Le),
            _ => None,
        }
    }

    pub fn holds(&self, a: i64, b: i64) -> bool {
        match self {
            IfComparison::Eq => a == b,
            IfComparison::Ne => a != b,
            IfComparison::Lt => a < b,
            IfComparison::Ge => a >= b,
            IfComparison::Gt => a > b,
            IfComparison::Le => a <= b,
        }
    }
}

impl fmt::Display for IfComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IfComparison::Eq => "eq",
            IfComparison::Ne => "ne",
            IfComparison::Lt => "lt",
            IfComparison::Ge => "ge",
            IfComparison::Gt => "gt",
            IfComparison::Le => "le",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithType {
    Int,
    Long,
    Float,
    Double,
}

impl ArithType {
    pub(crate) fn from_name(s: &str) -> Option<ArithType> {
        match s {
            "int" => Some(ArithType::Int),
            "long" => Some(ArithType::Long),
            "float" => Some(ArithType::Float),
            "double" => Some(ArithType::Double),
            _ => None,
        }
    }

    pub fn jni(&self) -> &'static str {
        match self {
            ArithType::Int => "I",
            ArithType::Long => "J",
            ArithType::Float => "F",
            ArithType::Double => "D",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperation {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Ushr,
    /// `rsub-int`: literal minus register.
    Rsub,
}

impl BinaryOperation {
    pub(crate) fn from_name(s: &str) -> Option<BinaryOperation> {
        match s {
            "add" => Some(BinaryOperation::Add),
            "sub" => Some(BinaryOperation::Sub),
            "mul" => Some(BinaryOperation::Mul),
            "div" => Some(BinaryOperation::Div),
            "rem" => Some(BinaryOperation::Rem),
            "and" => Some(BinaryOperation::And),
            "or" => Some(BinaryOperation::Or),
            "xor" => Some(BinaryOperation::Xor),
            "shl" => Some(BinaryOperation::Shl),
            "shr" => Some(BinaryOperation::Shr),
            "ushr" => Some(BinaryOperation::Ushr),
            "rsub" => Some(BinaryOperation::Rsub),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperand {
    Register(u16),
    Literal(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    Virtual,
    Super,
    Direct,
    Static,
    Interface,
}

impl InvokeKind {
    pub(crate) fn from_name(s: &str) -> Option<InvokeKind> {
        match s {
            "virtual" => Some(InvokeKind::Virtual),
            "super" => Some(InvokeKind::Super),
            "direct" => Some(InvokeKind::Direct),
            "static" => Some(InvokeKind::Static),
            "interface" => Some(InvokeKind::Interface),
            _ => None,
        }
    }
}

/// What an instruction does. Registers are raw register numbers, branch targets absolute
/// addresses in code units.
#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    Nop,
    Move { dest: u16, src: u16 },
    MoveResult { dest: u16 },
    MoveException { dest: u16 },
    Const { dest: u16, value: Value },
    /// `None` for `return-void`.
    Return { src: Option<u16> },
    Goto { target: u32 },
    /// `b` is `None` for the zero tests (`if-eqz` and friends).
    If { cmp: IfComparison, a: u16, b: Option<u16>, target: u32 },
    Binary { op: BinaryOperation, ty: ArithType, dest: u16, a: u16, b: BinaryOperand },
    ArrayLength { dest: u16, array: u16 },
    ArrayGet { dest: u16, array: u16, index: u16, element_type: String },
    ArrayPut { src: u16, array: u16, index: u16 },
    InstanceGet { dest: u16, object: u16, field: FieldRef },
    InstancePut { src: u16, object: u16, field: FieldRef },
    StaticGet { dest: u16, field: FieldRef },
    StaticPut { src: u16, field: FieldRef },
    NewInstance { dest: u16, class: String },
    NewArray { dest: u16, size: u16, array_type: String },
    CheckCast { reg: u16, class: String },
    InstanceOf { dest: u16, src: u16, class: String },
    Invoke { kind: InvokeKind, registers: Vec<u16>, method: MethodRef },
    Monitor { reg: u16, enter: bool },
    Throw { reg: u16 },
    /// Any other opcode, executed from the opcode flags alone.
    Unimplemented { registers: Vec<u16> },
}

/// One instruction of a method.
#[derive(Debug, Clone)]
pub struct Op {
    address: u32,
    opcode: &'static Opcode,
    kind: OpKind,
}

impl Op {
    pub fn new(address: u32, opcode: &'static Opcode, kind: OpKind) -> Self {
        Op { address, opcode, kind }
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn name(&self) -> &'static str {
        self.opcode.name
    }

    pub fn opcode(&self) -> &'static Opcode {
        self.opcode
    }

    pub fn kind(&self) -> &OpKind {
        &self.kind
    }

    /// Width in 16-bit code units.
    pub fn code_units(&self) -> u32 {
        self.opcode.code_units()
    }

    /// Address of the instruction directly after this one.
    pub fn next_address(&self) -> u32 {
        self.address + self.code_units()
    }

    pub fn can_continue(&self) -> bool {
        self.opcode.can_continue()
    }

    pub fn can_throw(&self) -> bool {
        self.opcode.can_throw()
    }

    pub fn is_goto(&self) -> bool {
        matches!(self.kind, OpKind::Goto { .. })
    }

    pub fn is_nop(&self) -> bool {
        matches!(self.kind, OpKind::Nop)
    }

    /// Distance to the branch target of a `goto` or `if-*`, in code units.
    pub fn branch_offset(&self) -> Option<i64> {
        match self.kind {
            OpKind::Goto { target } | OpKind::If { target, .. } => {
                Some(target as i64 - self.address as i64)
            }
            _ => None,
        }
    }

    pub fn side_effect(&self) -> SideEffect {
        match &self.kind {
            OpKind::Nop
            | OpKind::Move { .. }
            | OpKind::MoveResult { .. }
            | OpKind::MoveException { .. }
            | OpKind::Const { .. }
            | OpKind::Return { .. }
            | OpKind::Goto { .. }
            | OpKind::If { .. }
            | OpKind::Binary { .. }
            | OpKind::ArrayLength { .. }
            | OpKind::ArrayGet { .. }
            | OpKind::InstanceGet { .. }
            | OpKind::NewArray { .. }
            | OpKind::CheckCast { .. }
            | OpKind::InstanceOf { .. } => SideEffect::None,

            OpKind::NewInstance { class, .. } => weak_unless_safe(class),
            OpKind::StaticGet { field, .. } => weak_unless_safe(&field.class),

            OpKind::Invoke { method, .. } => {
                if is_immutable_class(&method.class) {
                    SideEffect::None
                } else {
                    SideEffect::Strong
                }
            }

            OpKind::ArrayPut { .. }
            | OpKind::InstancePut { .. }
            | OpKind::StaticPut { .. }
            | OpKind::Monitor { .. }
            | OpKind::Throw { .. }
            | OpKind::Unimplemented { .. } => SideEffect::Strong,
        }
    }

    /// Statically possible successor addresses.
    pub fn successors(&self) -> Vec<u32> {
        let next = self.next_address();
        match &self.kind {
            OpKind::Return { .. } | OpKind::Throw { .. } => vec![],
            OpKind::Goto { target } => vec![*target],
            OpKind::If { target, .. } => {
                if *target == next {
                    vec![next]
                } else {
                    vec![next, *target]
                }
            }
            _ if self.can_continue() => vec![next],
            _ => vec![],
        }
    }

    /// Moves the instruction and its branch target through `relocate`.
    pub(crate) fn relocate<F>(&mut self, relocate: &F)
    where
        F: Fn(u32) -> u32,
    {
        self.address = relocate(self.address);
        match &mut self.kind {
            OpKind::Goto { target } | OpKind::If { target, .. } => *target = relocate(*target),
            _ => {}
        }
    }
}

fn weak_unless_safe(class: &str) -> SideEffect {
    if is_safe_class(class) {
        SideEffect::None
    } else {
        SideEffect::Weak
    }
}

fn register_list(registers: &[u16]) -> String {
    registers.iter().map(|r| format!("v{r}")).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        match &self.kind {
            OpKind::Nop => write!(f, "{name}"),
            OpKind::Move { dest, src } => write!(f, "{name} v{dest}, v{src}"),
            OpKind::MoveResult { dest } | OpKind::MoveException { dest } => write!(f, "{name} v{dest}"),
            OpKind::Const { dest, value } => write!(f, "{name} v{dest}, {value}"),
            OpKind::Return { src: Some(src) } => write!(f, "{name} v{src}"),
            OpKind::Return { src: None } => write!(f, "{name}"),
            OpKind::Goto { target } => write!(f, "{name} :addr_{target:x}"),
            OpKind::If { a, b: Some(b), target, .. } => write!(f, "{name} v{a}, v{b}, :addr_{target:x}"),
            OpKind::If { a, b: None, target, .. } => write!(f, "{name} v{a}, :addr_{target:x}"),
            OpKind::Binary { dest, a, b: BinaryOperand::Register(b), .. } => {
                write!(f, "{name} v{dest}, v{a}, v{b}")
            }
            OpKind::Binary { dest, a, b: BinaryOperand::Literal(lit), .. } => {
                write!(f, "{name} v{dest}, v{a}, {lit}")
            }
            OpKind::ArrayLength { dest, array } => write!(f, "{name} v{dest}, v{array}"),
            OpKind::ArrayGet { dest, array, index, .. } => write!(f, "{name} v{dest}, v{array}, v{index}"),
            OpKind::ArrayPut { src, array, index } => write!(f, "{name} v{src}, v{array}, v{index}"),
            OpKind::InstanceGet { dest, object, field } => write!(f, "{name} v{dest}, v{object}, {field}"),
            OpKind::InstancePut { src, object, field } => write!(f, "{name} v{src}, v{object}, {field}"),
            OpKind::StaticGet { dest, field } => write!(f, "{name} v{dest}, {field}"),
            OpKind::StaticPut { src, field } => write!(f, "{name} v{src}, {field}"),
            OpKind::NewInstance { dest, class } => write!(f, "{name} v{dest}, {class}"),
            OpKind::NewArray { dest, size, array_type } => write!(f, "{name} v{dest}, v{size}, {array_type}"),
            OpKind::CheckCast { reg, class } => write!(f, "{name} v{reg}, {class}"),
            OpKind::InstanceOf { dest, src, class } => write!(f, "{name} v{dest}, v{src}, {class}"),
            OpKind::Invoke { registers, method, .. } => {
                write!(f, "{name} {{{}}}, {method}", register_list(registers))
            }
            OpKind::Monitor { reg, .. } | OpKind::Throw { reg } => write!(f, "{name} v{reg}"),
            OpKind::Unimplemented { registers } => write!(f, "{name} {}", register_list(registers)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::find_opcode;
    use crate::types::parse_method_ref;

    fn op(address: u32, name: &str, kind: OpKind) -> Op {
        Op::new(address, find_opcode(name).unwrap(), kind)
    }

    #[test]
    fn invoke_side_effects() {
        let (_, pure) = parse_method_ref("Ljava/lang/String;->length()I").unwrap();
        let (_, impure) = parse_method_ref("Ljava/io/PrintStream;->println(I)V").unwrap();
        let a = op(0, "invoke-virtual", OpKind::Invoke { kind: InvokeKind::Virtual, registers: vec![0], method: pure });
        let b = op(0, "invoke-virtual", OpKind::Invoke { kind: InvokeKind::Virtual, registers: vec![0, 1], method: impure });
        assert_eq!(a.side_effect(), SideEffect::None);
        assert_eq!(b.side_effect(), SideEffect::Strong);
    }

    #[test]
    fn allocation_side_effects() {
        let safe = op(0, "new-instance", OpKind::NewInstance { dest: 0, class: "Ljava/lang/StringBuilder;".to_string() });
        let local = op(0, "new-instance", OpKind::NewInstance { dest: 0, class: "Lcom/example/Foo;".to_string() });
        assert_eq!(safe.side_effect(), SideEffect::None);
        assert_eq!(local.side_effect(), SideEffect::Weak);
        assert!(SideEffect::Weak < SideEffect::Strong);
    }

    #[test]
    fn successors_and_relocation() {
        let mut branch = op(4, "if-eqz", OpKind::If { cmp: IfComparison::Eq, a: 0, b: None, target: 10 });
        assert_eq!(branch.successors(), vec![6, 10]);
        assert_eq!(branch.branch_offset(), Some(6));

        branch.relocate(&|addr| addr - 2);
        assert_eq!(branch.address(), 2);
        assert_eq!(branch.successors(), vec![4, 8]);

        let ret = op(8, "return-void", OpKind::Return { src: None });
        assert!(ret.successors().is_empty());
        let throw = op(8, "throw", OpKind::Throw { reg: 0 });
        assert!(throw.successors().is_empty());
        assert_eq!(throw.side_effect(), SideEffect::Strong);
    }
}
