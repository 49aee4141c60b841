/* Java types as seen by the VM. They are kept in the smali native (also JNI) format e.g. Ljava/lang/Object; */

use crate::error::VmError;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_until, take_while1};
use nom::character::complete::char;
use nom::error::ErrorKind;
use nom::multi::many0;
use nom::{IResult, Parser};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Represents a Java type: array, object or primitive type
///
/// # Examples
///
/// ```
///  use smalivm::types::TypeSignature;
///
///  let t = TypeSignature::from_jni("[I").unwrap();
///  assert_eq!(t.base_type(), &TypeSignature::Int);
///  assert_eq!(t.to_jni(), "[I");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeSignature {
    Array(Box<TypeSignature>),
    Object(String),
    Int,
    Bool,
    Byte,
    Char,
    Short,
    Long,
    Float,
    Double,
    Void,
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_jni())
    }
}

// Fixed primitive to wrapper class table, used when comparing primitive types as objects.
static PRIMITIVE_WRAPPERS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("Z", "Ljava/lang/Boolean;"),
        ("B", "Ljava/lang/Byte;"),
        ("C", "Ljava/lang/Character;"),
        ("S", "Ljava/lang/Short;"),
        ("I", "Ljava/lang/Integer;"),
        ("J", "Ljava/lang/Long;"),
        ("F", "Ljava/lang/Float;"),
        ("D", "Ljava/lang/Double;"),
        ("V", "Ljava/lang/Void;"),
    ])
});

impl TypeSignature {
    pub fn from_jni(s: &str) -> Result<TypeSignature, VmError> {
        match parse_typesignature(s) {
            Ok(("", ts)) => Ok(ts),
            _ => fail!("Could not parse type signature: {}", s),
        }
    }

    pub fn to_jni(&self) -> String {
        match self {
            TypeSignature::Array(a) => "[".to_string() + &a.to_jni(),
            TypeSignature::Bool => "Z".to_string(),
            TypeSignature::Byte => "B".to_string(),
            TypeSignature::Char => "C".to_string(),
            TypeSignature::Short => "S".to_string(),
            TypeSignature::Int => "I".to_string(),
            TypeSignature::Long => "J".to_string(),
            TypeSignature::Float => "F".to_string(),
            TypeSignature::Double => "D".to_string(),
            TypeSignature::Object(o) => format!("L{o};"),
            TypeSignature::Void => "V".to_string(),
        }
    }

    pub fn to_java(&self) -> String {
        match self {
            TypeSignature::Array(a) => format!("{}[]", a.to_java()),
            TypeSignature::Bool => "boolean".to_string(),
            TypeSignature::Byte => "byte".to_string(),
            TypeSignature::Char => "char".to_string(),
            TypeSignature::Short => "short".to_string(),
            TypeSignature::Int => "int".to_string(),
            TypeSignature::Long => "long".to_string(),
            TypeSignature::Float => "float".to_string(),
            TypeSignature::Double => "double".to_string(),
            TypeSignature::Object(o) => o.replace('/', "."),
            TypeSignature::Void => "void".to_string(),
        }
    }

    /// Strips every array dimension, `[[Ljava/lang/String;` becomes `Ljava/lang/String;`.
    pub fn base_type(&self) -> &TypeSignature {
        match self {
            TypeSignature::Array(a) => a.base_type(),
            t => t,
        }
    }

    /// Long and double values take two registers.
    pub fn is_wide(&self) -> bool {
        matches!(self, TypeSignature::Long | TypeSignature::Double)
    }

    /// Wrapper class descriptor for primitives, the descriptor itself for everything else.
    pub fn boxed_jni(&self) -> String {
        let jni = self.to_jni();
        match PRIMITIVE_WRAPPERS.get(jni.as_str()) {
            Some(wrapper) => wrapper.to_string(),
            None => jni,
        }
    }
}

/// Represents a Java method signature consisting of arguments and a return type
///
/// # Examples
///
/// ```
///  use smalivm::types::{MethodSignature, TypeSignature};
///
///  let m = MethodSignature::from_jni("([IJ)V").unwrap();
///  assert_eq!(m.result, TypeSignature::Void);
///  assert_eq!(m.parameter_words(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSignature {
    pub args: Vec<TypeSignature>,
    pub result: TypeSignature,
}

impl MethodSignature {
    pub fn from_jni(s: &str) -> Result<MethodSignature, VmError> {
        match parse_methodsignature(s) {
            Ok(("", m)) => Ok(m),
            _ => fail!("Could not parse method signature: {}", s),
        }
    }

    pub fn to_jni(&self) -> String {
        let mut s = String::from("(");
        for t in &self.args {
            s.push_str(&t.to_jni());
        }
        s.push(')');
        s.push_str(&self.result.to_jni());
        s
    }

    /// Number of registers the arguments occupy, not counting `this`.
    pub fn parameter_words(&self) -> u16 {
        self.args.iter().map(|a| if a.is_wide() { 2 } else { 1 }).sum()
    }
}

pub(crate) fn parse_typesignature(smali: &str) -> IResult<&str, TypeSignature> {
    // Object
    let l: IResult<&str, &str> = tag("L")(smali);
    if let Ok((o, _)) = l {
        let (o, t) = take_while1(|x| x != ';')(o)?;
        let (o, _) = char(';')(o)?;
        return Ok((o, TypeSignature::Object(t.to_string())));
    }

    // Array
    let b: IResult<&str, &str> = tag("[")(smali);
    if let Ok((o, _)) = b {
        let (o, t) = parse_typesignature(o)?;
        return Ok((o, TypeSignature::Array(Box::new(t))));
    }

    //Primitive Type
    let p: IResult<&str, &str> = alt((
        tag("Z"),
        tag("B"),
        tag("C"),
        tag("S"),
        tag("I"),
        tag("J"),
        tag("F"),
        tag("D"),
        tag("V"),
    ))
    .parse(smali);
    if let Ok((o, t)) = p {
        let ts = match t {
            "Z" => TypeSignature::Bool,
            "B" => TypeSignature::Byte,
            "C" => TypeSignature::Char,
            "S" => TypeSignature::Short,
            "I" => TypeSignature::Int,
            "J" => TypeSignature::Long,
            "F" => TypeSignature::Float,
            "D" => TypeSignature::Double,
            _ => TypeSignature::Void,
        };
        return Ok((o, ts));
    }

    Err(nom::Err::Error(nom::error::Error {
        input: smali,
        code: ErrorKind::Complete,
    }))
}

pub(crate) fn parse_methodsignature(smali: &str) -> IResult<&str, MethodSignature> {
    let (o, _) = tag("(")(smali)?;
    let (o, args) = many0(parse_typesignature).parse(o)?;
    let (o, _) = tag(")")(o)?;
    let (o, result) = parse_typesignature(o)?;
    Ok((o, MethodSignature { args, result }))
}

/// A symbolic reference to a method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRef {
    /// The fully qualified class name, e.g. "Lcom/example/MyClass;".
    pub class: String,
    /// The method name.
    pub name: String,
    /// The method signature, e.g. "(I)V".
    pub signature: MethodSignature,
}

impl MethodRef {
    pub fn return_type(&self) -> &TypeSignature {
        &self.signature.result
    }

    pub fn returns_void(&self) -> bool {
        self.signature.result == TypeSignature::Void
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Example: Lkotlin/jvm/internal/Intrinsics;->checkNotNullParameter(Ljava/lang/Object;Ljava/lang/String;)V
        write!(f, "{}->{}{}", self.class, self.name, self.signature.to_jni())
    }
}

/// A symbolic reference to a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    /// The fully qualified class name, e.g. "Lcom/example/MyClass;".
    pub class: String,
    /// The field name.
    pub name: String,
    /// The field type, e.g. "I" for int.
    pub field_type: TypeSignature,
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Example: Lcom/example/MyClass;->myField:I
        write!(f, "{}->{}:{}", self.class, self.name, self.field_type)
    }
}

/// Parse a method reference of the form:
///    L<class>;-><method>(<args>)<ret>
pub(crate) fn parse_method_ref(input: &str) -> IResult<&str, MethodRef> {
    let (input, class) = take_until("->")(input)?;
    let (input, _) = tag("->")(input)?;
    let (input, name) = take_until("(")(input)?;
    let (input, signature) = parse_methodsignature(input)?;

    Ok((
        input,
        MethodRef {
            class: class.trim().to_owned(),
            name: name.trim().to_owned(),
            signature,
        },
    ))
}

pub(crate) fn parse_field_ref(input: &str) -> IResult<&str, FieldRef> {
    let (input, class) = take_until("->")(input)?;
    let (input, _) = tag("->")(input)?;
    let (input, name) = take_until(":")(input)?;
    let (input, _) = tag(":")(input)?;
    let (input, field_type) = parse_typesignature(input)?;

    Ok((
        input,
        FieldRef {
            class: class.trim().to_owned(),
            name: name.trim().to_owned(),
            field_type,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_base_type() {
        let t = TypeSignature::from_jni("[[Ljava/lang/String;").unwrap();
        assert_eq!(t.base_type(), &TypeSignature::Object("java/lang/String".to_string()));
        assert_eq!(t.to_java(), "java.lang.String[][]");
    }

    #[test]
    fn test_boxing() {
        assert_eq!(TypeSignature::Int.boxed_jni(), "Ljava/lang/Integer;");
        assert_eq!(TypeSignature::Bool.boxed_jni(), "Ljava/lang/Boolean;");
        let s = TypeSignature::from_jni("Ljava/lang/String;").unwrap();
        assert_eq!(s.boxed_jni(), "Ljava/lang/String;");
    }

    #[test]
    fn test_bad_signature() {
        assert!(TypeSignature::from_jni("Q").is_err());
        assert!(TypeSignature::from_jni("II").is_err());
        assert!(MethodSignature::from_jni("(I").is_err());
    }

    #[test]
    fn test_method_ref() {
        let (rest, m) =
            parse_method_ref("Ljava/lang/Integer;->valueOf(I)Ljava/lang/Integer;").unwrap();
        assert_eq!(rest, "");
        assert_eq!(m.class, "Ljava/lang/Integer;");
        assert_eq!(m.name, "valueOf");
        assert!(!m.returns_void());
        assert_eq!(m.to_string(), "Ljava/lang/Integer;->valueOf(I)Ljava/lang/Integer;");
    }

    #[test]
    fn test_field_ref() {
        let (_, f) = parse_field_ref("Lcom/example/Config;->DEBUG:Z").unwrap();
        assert_eq!(f.name, "DEBUG");
        assert_eq!(f.field_type, TypeSignature::Bool);
    }
}
