use crate::class_manager::ClassManager;
use crate::context::MethodState;
use crate::ops::{ArithType, BinaryOperand, BinaryOperation, IfComparison, Op, OpKind};
use crate::value::Value;
use log::trace;
use num_traits::ops::wrapping::{WrappingAdd, WrappingMul, WrappingSub};
use num_traits::{PrimInt, Signed};

/// Where execution goes after an instruction.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Flow {
    Next(Vec<u32>),
    /// The instruction certainly throws. `None` when the exact exception type is unknown.
    Throw(Option<String>),
}

impl Op {
    /// Runs the instruction against `state`, recording every register it reads or assigns.
    pub(crate) fn execute(&self, state: &mut MethodState, classes: &mut ClassManager) -> Flow {
        let next = self.next_address();
        match self.kind() {
            OpKind::Nop => {}
            OpKind::Move { dest, src } => {
                let value = state.read_register(*src);
                state.assign_register(*dest, value);
            }
            OpKind::MoveResult { dest } => {
                let value = state.read_result_register();
                state.assign_register(*dest, value);
            }
            OpKind::MoveException { dest } => {
                state.assign_register(*dest, Value::unknown("Ljava/lang/Throwable;"));
            }
            OpKind::Const { dest, value } => state.assign_register(*dest, value.clone()),
            OpKind::Return { src } => {
                if let Some(src) = src {
                    let value = state.read_register(*src);
                    state.assign_return_register(value);
                }
                return Flow::Next(vec![]);
            }
            OpKind::Goto { target } => return Flow::Next(vec![*target]),
            OpKind::If { cmp, a, b, target } => {
                return Flow::Next(self.branch(state, *cmp, *a, *b, *target));
            }
            OpKind::Binary { op, ty, dest, a, b } => {
                let lhs = state.read_register(*a);
                let rhs = match b {
                    BinaryOperand::Register(r) => state.read_register(*r),
                    BinaryOperand::Literal(lit) => Value::Int(*lit),
                };
                let result = evaluate_binary(*op, *ty, &lhs, &rhs)
                    .unwrap_or_else(|| Value::unknown(ty.jni()));
                state.assign_register(*dest, result);
            }
            OpKind::ArrayLength { dest, array } => {
                state.read_register(*array);
                state.assign_register(*dest, Value::unknown("I"));
            }
            OpKind::ArrayGet { dest, array, index, element_type } => {
                let array = state.read_register(*array);
                state.read_register(*index);
                let element = match array.type_name().strip_prefix('[') {
                    Some(component) if !array.is_unknown() => component.to_string(),
                    _ => element_type.clone(),
                };
                state.assign_register(*dest, Value::Unknown(element));
            }
            OpKind::ArrayPut { src, array, index } => {
                state.read_register(*src);
                state.read_register(*array);
                state.read_register(*index);
            }
            OpKind::InstanceGet { dest, object, field } => {
                state.read_register(*object);
                state.assign_register(*dest, Value::Unknown(field.field_type.to_jni()));
            }
            OpKind::InstancePut { src, object, .. } => {
                state.read_register(*src);
                state.read_register(*object);
            }
            OpKind::StaticGet { dest, field } => {
                state.assign_register(*dest, Value::Unknown(field.field_type.to_jni()));
            }
            OpKind::StaticPut { src, .. } => {
                state.read_register(*src);
            }
            OpKind::NewInstance { dest, class } => {
                state.assign_register(*dest, Value::Object { type_name: class.clone() });
            }
            OpKind::NewArray { dest, size, array_type } => {
                state.read_register(*size);
                state.assign_register(*dest, Value::Object { type_name: array_type.clone() });
            }
            OpKind::CheckCast { reg, class } => {
                let value = state.read_register(*reg);
                if value.is_unknown() {
                    state.assign_register(*reg, Value::Unknown(class.clone()));
                } else if value != Value::Null {
                    if let Ok(false) = classes.is_instance(&value.type_name(), class) {
                        return Flow::Throw(Some("Ljava/lang/ClassCastException;".to_string()));
                    }
                    state.assign_register(*reg, value);
                } else {
                    state.assign_register(*reg, value);
                }
            }
            OpKind::InstanceOf { dest, src, class } => {
                let value = state.read_register(*src);
                let result = match value {
                    Value::Null => Value::Int(0),
                    Value::Unknown(_) => Value::unknown("Z"),
                    known => match classes.is_instance(&known.type_name(), class) {
                        Ok(true) => Value::Int(1),
                        Ok(false) => Value::Int(0),
                        Err(_) => Value::unknown("Z"),
                    },
                };
                state.assign_register(*dest, result);
            }
            OpKind::Invoke { registers, method, .. } => {
                for r in registers {
                    state.read_register(*r);
                }
                if !method.returns_void() {
                    state.assign_result_register(Value::Unknown(method.return_type().to_jni()));
                }
            }
            OpKind::Monitor { reg, .. } => {
                state.read_register(*reg);
            }
            OpKind::Throw { reg } => {
                let exception = match state.read_register(*reg) {
                    Value::Unknown(_) => None,
                    Value::Null => Some("Ljava/lang/NullPointerException;".to_string()),
                    known => Some(known.type_name()),
                };
                return Flow::Throw(exception);
            }
            OpKind::Unimplemented { registers } => self.execute_generic(state, registers),
        }

        if self.can_continue() {
            Flow::Next(vec![next])
        } else {
            Flow::Next(vec![])
        }
    }

    fn branch(&self, state: &mut MethodState, cmp: IfComparison, a: u16, b: Option<u16>, target: u32) -> Vec<u32> {
        let next = self.next_address();
        let lhs = state.read_register(a);
        let decided = match b {
            None => lhs.zero_test_operand().map(|x| cmp.holds(x, 0)),
            Some(b) => {
                let rhs = state.read_register(b);
                match (&lhs, &rhs) {
                    (Value::Int(_) | Value::Long(_), Value::Int(_) | Value::Long(_)) => lhs
                        .as_long()
                        .zip(rhs.as_long())
                        .map(|(x, y)| cmp.holds(x, y)),
                    _ => None,
                }
            }
        };
        trace!("{} at {} decided {:?}", self, self.address(), decided);
        match decided {
            Some(true) => vec![target],
            Some(false) => vec![next],
            None if target == next => vec![next],
            None => vec![next, target],
        }
    }

    // Follows the opcode flags: the first register is the destination when the opcode sets a
    // register, every other register is read.
    fn execute_generic(&self, state: &mut MethodState, registers: &[u16]) {
        let opcode = self.opcode();
        let mut sources = registers;
        if opcode.sets_register() {
            if let Some((dest, rest)) = registers.split_first() {
                let ty = if opcode.sets_wide_register() { "J" } else { "?" };
                state.assign_register(*dest, Value::unknown(ty));
                sources = rest;
            }
        }
        for r in sources {
            state.read_register(*r);
        }
        if opcode.sets_result() {
            state.assign_result_register(Value::unknown("?"));
        }
    }
}

fn evaluate_binary(op: BinaryOperation, ty: ArithType, lhs: &Value, rhs: &Value) -> Option<Value> {
    match ty {
        ArithType::Int => {
            let (a, b) = (lhs.as_int()?, rhs.as_int()?);
            integer_op(op, a, b).map(Value::Int)
        }
        ArithType::Long => {
            let (a, b) = (lhs.as_long()?, rhs.as_long()?);
            integer_op(op, a, b).map(Value::Long)
        }
        ArithType::Float => match (lhs, rhs) {
            (Value::Float(a), Value::Float(b)) => float_op(op, *a as f64, *b as f64).map(|v| Value::Float(v as f32)),
            _ => None,
        },
        ArithType::Double => match (lhs, rhs) {
            (Value::Double(a), Value::Double(b)) => float_op(op, *a, *b).map(Value::Double),
            _ => None,
        },
    }
}

// Java integer semantics: wrapping arithmetic, shift distances masked to the type width,
// division by zero left undecided since it throws.
fn integer_op<T>(op: BinaryOperation, a: T, b: T) -> Option<T>
where
    T: PrimInt + Signed + WrappingAdd + WrappingSub + WrappingMul,
{
    let bits = T::zero().count_zeros() as i64;
    let shift = || (b.to_i64().unwrap_or(0) & (bits - 1)) as u32;
    let overflowing_division = a == T::min_value() && b == -T::one();
    let value = match op {
        BinaryOperation::Add => a.wrapping_add(&b),
        BinaryOperation::Sub => a.wrapping_sub(&b),
        BinaryOperation::Rsub => b.wrapping_sub(&a),
        BinaryOperation::Mul => a.wrapping_mul(&b),
        BinaryOperation::Div | BinaryOperation::Rem if b.is_zero() => return None,
        BinaryOperation::Div if overflowing_division => a,
        BinaryOperation::Rem if overflowing_division => T::zero(),
        BinaryOperation::Div => a / b,
        BinaryOperation::Rem => a % b,
        BinaryOperation::And => a & b,
        BinaryOperation::Or => a | b,
        BinaryOperation::Xor => a ^ b,
        BinaryOperation::Shl => a.signed_shl(shift()),
        BinaryOperation::Shr => a.signed_shr(shift()),
        BinaryOperation::Ushr => a.unsigned_shr(shift()),
    };
    Some(value)
}

fn float_op(op: BinaryOperation, a: f64, b: f64) -> Option<f64> {
    match op {
        BinaryOperation::Add => Some(a + b),
        BinaryOperation::Sub => Some(a - b),
        BinaryOperation::Mul => Some(a * b),
        BinaryOperation::Div => Some(a / b),
        BinaryOperation::Rem => Some(a % b),
        _ => None,
    }
}
