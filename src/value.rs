use serde::{Deserialize, Serialize};
use std::fmt;

/// A value held by a register on one execution path.
///
/// `Unknown` carries the declared type of a value whose contents were never determined,
/// e.g. a method parameter or the result of an invocation the VM does not emulate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    /// A `java.lang.Class` reference produced by `const-class`.
    Class(String),
    Null,
    /// A freshly allocated instance of the given type.
    Object { type_name: String },
    Unknown(String),
}

impl Value {
    pub fn unknown(type_name: &str) -> Value {
        Value::Unknown(type_name.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown(_))
    }

    /// Smali descriptor of the value's type.
    pub fn type_name(&self) -> String {
        match self {
            Value::Int(_) => "I".to_string(),
            Value::Long(_) => "J".to_string(),
            Value::Float(_) => "F".to_string(),
            Value::Double(_) => "D".to_string(),
            Value::Str(_) => "Ljava/lang/String;".to_string(),
            Value::Class(_) => "Ljava/lang/Class;".to_string(),
            Value::Null => "Ljava/lang/Object;".to_string(),
            Value::Object { type_name } | Value::Unknown(type_name) => type_name.clone(),
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(l) => Some(*l),
            Value::Int(i) => Some(*i as i64),
            _ => None,
        }
    }

    /// What a zero test (`if-eqz` and friends) sees, `None` when it cannot be decided.
    ///
    /// Null compares as zero, any concrete reference as non-zero.
    pub fn zero_test_operand(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i as i64),
            Value::Long(l) => Some(*l),
            Value::Null => Some(0),
            Value::Str(_) | Value::Class(_) | Value::Object { .. } => Some(1),
            Value::Float(_) | Value::Double(_) | Value::Unknown(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Long(l) => write!(f, "{l}L"),
            Value::Float(v) => write!(f, "{v}f"),
            Value::Double(d) => write!(f, "{d}d"),
            Value::Str(s) => write!(f, "\"{s}\""),
            Value::Class(c) => write!(f, "{c}.class"),
            Value::Null => write!(f, "null"),
            Value::Object { type_name } => write!(f, "new {type_name}"),
            Value::Unknown(t) => write!(f, "Unknown({t})"),
        }
    }
}
