//! Reads smali text into [`MethodImplementation`]s and [`LocalClass`] headers.

use crate::class_manager::LocalClass;
use crate::error::VmError;
use crate::method::{ExceptionHandler, MethodImplementation, TryBlock};
use crate::opcodes::{find_opcode, Opcode};
use crate::ops::{ArithType, BinaryOperand, BinaryOperation, IfComparison, InvokeKind, Op, OpKind};
use crate::types::{parse_field_ref, parse_method_ref, FieldRef, MethodRef, MethodSignature, TypeSignature};
use crate::value::Value;
use log::{debug, trace};
use nom::branch::alt;
use nom::bytes::complete::{escaped, tag, take_till1, take_while1};
use nom::character::complete::{char, digit1, hex_digit1, none_of, one_of, space0, space1};
use nom::combinator::{map, opt};
use nom::error::{Error, ErrorKind};
use nom::multi::separated_list0;
use nom::sequence::{delimited, pair, preceded};
use nom::{IResult, Parser};
use num_traits::PrimInt;
use std::collections::HashMap;
use std::fmt;

/// A register as written in smali, before mapping onto the method's register frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmaliRegister {
    Parameter(u16),
    Local(u16),
}

impl fmt::Display for SmaliRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmaliRegister::Parameter(n) => write!(f, "p{n}"),
            SmaliRegister::Local(n) => write!(f, "v{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Register(SmaliRegister),
    RegisterList(Vec<SmaliRegister>),
    RegisterRange(SmaliRegister, SmaliRegister),
    Label(String),
    Literal(i64),
    Str(String),
    Method(MethodRef),
    Field(FieldRef),
    Type(String),
}

/// A class read from smali: its header and every method carrying code.
#[derive(Debug, Clone)]
pub struct SmaliClassFile {
    pub class: LocalClass,
    pub methods: Vec<MethodImplementation>,
}

fn nom_failure(input: &str, kind: ErrorKind) -> nom::Err<Error<&str>> {
    nom::Err::Failure(Error::new(input, kind))
}

/// Parse a register reference like "v0" or "p1".
fn parse_register(input: &str) -> IResult<&str, SmaliRegister> {
    let (o, t) = alt((char('v'), char('p'))).parse(input)?;
    let (o, num_str) = digit1(o)?;
    let num = num_str
        .parse::<u16>()
        .map_err(|_| nom_failure(input, ErrorKind::Digit))?;
    let reg = match t {
        'v' => SmaliRegister::Local(num),
        _ => SmaliRegister::Parameter(num),
    };
    Ok((o, reg))
}

fn comma(input: &str) -> IResult<&str, char> {
    delimited(space0, char(','), space0).parse(input)
}

/// `{v0, v1}` or `{}`
fn parse_register_list(input: &str) -> IResult<&str, Vec<SmaliRegister>> {
    delimited(
        pair(char('{'), space0),
        separated_list0(comma, parse_register),
        pair(space0, char('}')),
    )
    .parse(input)
}

/// `{v0 .. v5}`
fn parse_register_range(input: &str) -> IResult<&str, (SmaliRegister, SmaliRegister)> {
    let (o, _) = pair(char('{'), space0).parse(input)?;
    let (o, start) = parse_register(o)?;
    let (o, _) = delimited(space0, tag(".."), space0).parse(o)?;
    let (o, end) = parse_register(o)?;
    let (o, _) = pair(space0, char('}')).parse(o)?;
    Ok((o, (start, end)))
}

fn is_label_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Parse a label in smali syntax, e.g. ":cond_0"
fn parse_label(input: &str) -> IResult<&str, String> {
    let (o, _) = char(':')(input)?;
    let (o, body) = take_while1(is_label_char)(o)?;
    Ok((o, body.to_string()))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => out.push_str(&hex),
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Parses a string literal that may be empty, e.g. `""` or `"builder"`.
fn parse_string_literal(input: &str) -> IResult<&str, String> {
    let esc = escaped(none_of("\\\""), '\\', one_of("'\"tbnrfu\\"));
    let esc_or_empty = alt((esc, tag("")));
    let (o, s) = delimited(char('"'), esc_or_empty, char('"')).parse(input)?;
    Ok((o, unescape(s)))
}

/// Parses a decimal or hex integer literal. Unsigned hex is read as two's complement of `T`'s
/// width, so `0xffffffff` is `-1` as an `i32`.
pub(crate) fn parse_literal_int<T>(input: &str) -> IResult<&str, T>
where
    T: PrimInt + TryFrom<i64>,
{
    let (o, negative) = opt(char('-')).parse(input)?;
    let (o, hex) = opt(alt((tag("0x"), tag("0X")))).parse(o)?;
    let (o, digits) = if hex.is_some() { hex_digit1(o)? } else { digit1(o)? };
    let (o, _) = opt(one_of("Lts")).parse(o)?;

    let radix = if hex.is_some() { 16 } else { 10 };
    let magnitude = u64::from_str_radix(digits, radix).map_err(|_| nom_failure(input, ErrorKind::Digit))?;
    let bits = T::zero().count_zeros();

    let value: i64 = if negative.is_some() {
        if magnitude > 1u64 << 63 {
            return Err(nom_failure(input, ErrorKind::Digit));
        }
        (magnitude as i64).wrapping_neg()
    } else if hex.is_some() {
        if bits < 64 && magnitude >= 1u64 << bits {
            return Err(nom_failure(input, ErrorKind::Digit));
        }
        if magnitude & (1u64 << (bits - 1)) != 0 {
            ((magnitude as i128) - (1i128 << bits)) as i64
        } else {
            magnitude as i64
        }
    } else {
        i64::try_from(magnitude).map_err(|_| nom_failure(input, ErrorKind::Digit))?
    };

    let out = T::try_from(value).map_err(|_| nom_failure(input, ErrorKind::Digit))?;
    Ok((o, out))
}

// Method refs, field refs and type descriptors all run to the next comma.
fn parse_reference(input: &str) -> IResult<&str, Operand> {
    let (o, token) = take_till1(|c| c == ',')(input)?;
    let token = token.trim_end();
    if token.contains("->") {
        if token.contains('(') {
            if let Ok(("", m)) = parse_method_ref(token) {
                return Ok((o, Operand::Method(m)));
            }
        } else if let Ok(("", f)) = parse_field_ref(token) {
            return Ok((o, Operand::Field(f)));
        }
    } else if TypeSignature::from_jni(token).is_ok() {
        return Ok((o, Operand::Type(token.to_string())));
    }
    Err(nom_failure(input, ErrorKind::Verify))
}

fn parse_operand(input: &str) -> IResult<&str, Operand> {
    alt((
        map(parse_register_range, |(s, e)| Operand::RegisterRange(s, e)),
        map(parse_register_list, Operand::RegisterList),
        map(parse_label, Operand::Label),
        map(parse_string_literal, Operand::Str),
        map(parse_literal_int::<i64>, Operand::Literal),
        map(parse_register, Operand::Register),
        parse_reference,
    ))
    .parse(input)
}

fn is_mnemonic_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '/'
}

/// `const/4 v0, 0x1` into its mnemonic and operands.
fn parse_instruction_line(line: &str) -> IResult<&str, (&str, Vec<Operand>)> {
    let (o, name) = take_while1(is_mnemonic_char)(line)?;
    let (o, operands) = opt(preceded(space1, separated_list0(comma, parse_operand))).parse(o)?;
    let (o, _) = space0(o)?;
    Ok((o, (name, operands.unwrap_or_default())))
}

#[derive(Debug, Clone, PartialEq)]
struct CatchDirective {
    exception_type: Option<String>,
    start: String,
    end: String,
    handler: String,
}

/// `.catch Ljava/lang/Exception; {:try_start_0 .. :try_end_0} :catch_0` or the `.catchall` form.
fn parse_catch_line(line: &str) -> IResult<&str, CatchDirective> {
    let (o, exception_type) = alt((
        map(tag(".catchall"), |_| None),
        map(
            preceded(pair(tag(".catch"), space1), take_while1(|c: char| !c.is_whitespace())),
            |t: &str| Some(t.to_string()),
        ),
    ))
    .parse(line)?;
    let (o, _) = pair(space0, char('{')).parse(o)?;
    let (o, start) = preceded(space0, parse_label).parse(o)?;
    let (o, _) = delimited(space0, tag(".."), space0).parse(o)?;
    let (o, end) = parse_label(o)?;
    let (o, _) = pair(space0, char('}')).parse(o)?;
    let (o, handler) = preceded(space0, parse_label).parse(o)?;
    Ok((
        o,
        CatchDirective {
            exception_type,
            start,
            end,
            handler,
        },
    ))
}

// Drops a trailing `# comment`, leaving string literals alone.
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '#' if !in_string => return line[..i].trim_end(),
            _ => {}
        }
    }
    line.trim_end()
}

fn parse_count(value: &str, line_no: usize) -> Result<u16, VmError> {
    match parse_literal_int::<i32>(value.trim()) {
        Ok(("", n)) if (0..=u16::MAX as i32).contains(&n) => Ok(n as u16),
        _ => Err(err!(VmError::new(&format!("bad register count {value}")), "line {}", line_no)),
    }
}

struct PendingOp<'a> {
    line_no: usize,
    address: u32,
    opcode: &'static Opcode,
    operands: Vec<Operand>,
    text: &'a str,
}

// Resolves operands against the method's register frame and labels.
struct OperandReader<'a> {
    operands: &'a [Operand],
    labels: &'a HashMap<String, u32>,
    params_base: u16,
    registers: u16,
}

impl OperandReader<'_> {
    fn get(&self, index: usize) -> Result<&Operand, VmError> {
        match self.operands.get(index) {
            Some(o) => Ok(o),
            None => fail!("missing operand {}", index + 1),
        }
    }

    fn raw(&self, reg: SmaliRegister) -> Result<u16, VmError> {
        match reg {
            SmaliRegister::Local(n) => Ok(n),
            SmaliRegister::Parameter(n) => match self.params_base.checked_add(n) {
                Some(r) if r < self.registers => Ok(r),
                _ => fail!("parameter register p{} is outside the frame", n),
            },
        }
    }

    fn register(&self, index: usize) -> Result<u16, VmError> {
        match self.get(index)? {
            Operand::Register(r) => self.raw(*r),
            other => fail!("expected a register, found {:?}", other),
        }
    }

    fn register_list(&self, index: usize) -> Result<Vec<u16>, VmError> {
        match self.get(index)? {
            Operand::RegisterList(regs) => regs.iter().map(|r| self.raw(*r)).collect(),
            Operand::RegisterRange(start, end) => Ok((self.raw(*start)?..=self.raw(*end)?).collect()),
            other => fail!("expected a register list, found {:?}", other),
        }
    }

    fn label(&self, index: usize) -> Result<u32, VmError> {
        match self.get(index)? {
            Operand::Label(name) => match self.labels.get(name) {
                Some(address) => Ok(*address),
                None => fail!("undefined label :{}", name),
            },
            other => fail!("expected a label, found {:?}", other),
        }
    }

    fn literal(&self, index: usize) -> Result<i64, VmError> {
        match self.get(index)? {
            Operand::Literal(l) => Ok(*l),
            other => fail!("expected a literal, found {:?}", other),
        }
    }

    fn string(&self, index: usize) -> Result<String, VmError> {
        match self.get(index)? {
            Operand::Str(s) => Ok(s.clone()),
            other => fail!("expected a string, found {:?}", other),
        }
    }

    fn type_name(&self, index: usize) -> Result<String, VmError> {
        match self.get(index)? {
            Operand::Type(t) => Ok(t.clone()),
            other => fail!("expected a type, found {:?}", other),
        }
    }

    fn method(&self, index: usize) -> Result<MethodRef, VmError> {
        match self.get(index)? {
            Operand::Method(m) => Ok(m.clone()),
            other => fail!("expected a method reference, found {:?}", other),
        }
    }

    fn field(&self, index: usize) -> Result<FieldRef, VmError> {
        match self.get(index)? {
            Operand::Field(f) => Ok(f.clone()),
            other => fail!("expected a field reference, found {:?}", other),
        }
    }

    // Every register mentioned, lists and ranges expanded.
    fn all_registers(&self) -> Result<Vec<u16>, VmError> {
        let mut regs = vec![];
        for operand in self.operands {
            match operand {
                Operand::Register(r) => regs.push(self.raw(*r)?),
                Operand::RegisterList(list) => {
                    for r in list {
                        regs.push(self.raw(*r)?);
                    }
                }
                Operand::RegisterRange(s, e) => regs.extend(self.raw(*s)?..=self.raw(*e)?),
                _ => {}
            }
        }
        Ok(regs)
    }
}

fn array_element_type(name: &str) -> String {
    match name.split_once('-').map(|(_, suffix)| suffix) {
        Some("wide") => "J",
        Some("object") => "Ljava/lang/Object;",
        Some("boolean") => "Z",
        Some("byte") => "B",
        Some("char") => "C",
        Some("short") => "S",
        _ => "I",
    }
    .to_string()
}

fn binary_kind(name: &str, r: &OperandReader) -> Result<Option<OpKind>, VmError> {
    let (base, variant) = match name.split_once('/') {
        Some((base, variant)) => (base, Some(variant)),
        None => (name, None),
    };
    let Some((op_name, type_name)) = base.split_once('-') else {
        return Ok(None);
    };
    let (Some(op), Some(ty)) = (BinaryOperation::from_name(op_name), ArithType::from_name(type_name)) else {
        return Ok(None);
    };

    let kind = match (variant, r.operands.len()) {
        (Some("2addr"), _) => {
            let dest = r.register(0)?;
            OpKind::Binary { op, ty, dest, a: dest, b: BinaryOperand::Register(r.register(1)?) }
        }
        (_, 3) if matches!(r.operands[2], Operand::Literal(_)) => OpKind::Binary {
            op,
            ty,
            dest: r.register(0)?,
            a: r.register(1)?,
            b: BinaryOperand::Literal(r.literal(2)? as i32),
        },
        _ => OpKind::Binary {
            op,
            ty,
            dest: r.register(0)?,
            a: r.register(1)?,
            b: BinaryOperand::Register(r.register(2)?),
        },
    };
    Ok(Some(kind))
}

fn build_kind(opcode: &'static Opcode, r: &OperandReader) -> Result<OpKind, VmError> {
    let name = opcode.name;
    let kind = match name {
        "nop" => OpKind::Nop,
        "packed-switch" | "sparse-switch" | "fill-array-data" => {
            fail!("payload instruction {} is not supported", name)
        }
        "move-exception" => OpKind::MoveException { dest: r.register(0)? },
        _ if name.starts_with("move-result") => OpKind::MoveResult { dest: r.register(0)? },
        _ if name.starts_with("move") => OpKind::Move {
            dest: r.register(0)?,
            src: r.register(1)?,
        },
        "return-void" => OpKind::Return { src: None },
        _ if name.starts_with("return") => OpKind::Return { src: Some(r.register(0)?) },
        "const-string" | "const-string/jumbo" => OpKind::Const {
            dest: r.register(0)?,
            value: Value::Str(r.string(1)?),
        },
        "const-class" => OpKind::Const {
            dest: r.register(0)?,
            value: Value::Class(r.type_name(1)?),
        },
        _ if name.starts_with("const-wide") => OpKind::Const {
            dest: r.register(0)?,
            value: Value::Long(r.literal(1)?),
        },
        _ if name.starts_with("const") => OpKind::Const {
            dest: r.register(0)?,
            value: Value::Int(r.literal(1)? as i32),
        },
        _ if name.starts_with("goto") => OpKind::Goto { target: r.label(0)? },
        _ if name.starts_with("if-") => {
            let test = &name[3..];
            match test.strip_suffix('z') {
                Some(cmp) if test.len() == 3 => OpKind::If {
                    cmp: IfComparison::from_suffix(cmp).ok_or_else(|| VmError::new(name))?,
                    a: r.register(0)?,
                    b: None,
                    target: r.label(1)?,
                },
                _ => OpKind::If {
                    cmp: IfComparison::from_suffix(test).ok_or_else(|| VmError::new(name))?,
                    a: r.register(0)?,
                    b: Some(r.register(1)?),
                    target: r.label(2)?,
                },
            }
        }
        "array-length" => OpKind::ArrayLength {
            dest: r.register(0)?,
            array: r.register(1)?,
        },
        _ if name.starts_with("aget") => OpKind::ArrayGet {
            dest: r.register(0)?,
            array: r.register(1)?,
            index: r.register(2)?,
            element_type: array_element_type(name),
        },
        _ if name.starts_with("aput") => OpKind::ArrayPut {
            src: r.register(0)?,
            array: r.register(1)?,
            index: r.register(2)?,
        },
        _ if name.starts_with("iget") => OpKind::InstanceGet {
            dest: r.register(0)?,
            object: r.register(1)?,
            field: r.field(2)?,
        },
        _ if name.starts_with("iput") => OpKind::InstancePut {
            src: r.register(0)?,
            object: r.register(1)?,
            field: r.field(2)?,
        },
        _ if name.starts_with("sget") => OpKind::StaticGet {
            dest: r.register(0)?,
            field: r.field(1)?,
        },
        _ if name.starts_with("sput") => OpKind::StaticPut {
            src: r.register(0)?,
            field: r.field(1)?,
        },
        "new-instance" => OpKind::NewInstance {
            dest: r.register(0)?,
            class: r.type_name(1)?,
        },
        "new-array" => OpKind::NewArray {
            dest: r.register(0)?,
            size: r.register(1)?,
            array_type: r.type_name(2)?,
        },
        "check-cast" => OpKind::CheckCast {
            reg: r.register(0)?,
            class: r.type_name(1)?,
        },
        "instance-of" => OpKind::InstanceOf {
            dest: r.register(0)?,
            src: r.register(1)?,
            class: r.type_name(2)?,
        },
        _ if name.starts_with("invoke-") => {
            let dispatch = name[7..].split('/').next().unwrap_or_default();
            let Some(kind) = InvokeKind::from_name(dispatch) else {
                fail!("unsupported invoke {}", name);
            };
            OpKind::Invoke {
                kind,
                registers: r.register_list(0)?,
                method: r.method(1)?,
            }
        }
        "monitor-enter" | "monitor-exit" => OpKind::Monitor {
            reg: r.register(0)?,
            enter: name == "monitor-enter",
        },
        "throw" => OpKind::Throw { reg: r.register(0)? },
        _ => match binary_kind(name, r)? {
            Some(kind) => kind,
            None => OpKind::Unimplemented { registers: r.all_registers()? },
        },
    };
    Ok(kind)
}

struct MethodHeader {
    name: String,
    signature: MethodSignature,
    is_static: bool,
}

fn parse_method_header(line: &str) -> Result<MethodHeader, VmError> {
    let Some(rest) = line.strip_prefix(".method") else {
        fail!("expected .method, found {}", line);
    };
    let mut words: Vec<&str> = rest.split_whitespace().collect();
    let Some(declaration) = words.pop() else {
        fail!("missing method name in {}", line);
    };
    let Some(paren) = declaration.find('(') else {
        fail!("missing method signature in {}", line);
    };
    let (name, sig) = declaration.split_at(paren);
    Ok(MethodHeader {
        name: name.to_string(),
        signature: MethodSignature::from_jni(sig)?,
        is_static: words.contains(&"static"),
    })
}

/// Parses one `.method ... .end method` block of class `class_name`.
///
/// # Examples
///
/// ```
///  use smalivm::smali_parse::parse_method;
///
///  let m = parse_method("Lcom/example/Foo;", r#"
///  .method public static answer()I
///      .registers 1
///      const/16 v0, 0x2a
///      return v0
///  .end method
///  "#).unwrap();
///  assert_eq!(m.addresses(), vec![0, 2]);
/// ```
pub fn parse_method(class_name: &str, text: &str) -> Result<MethodImplementation, VmError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, strip_comment(l).trim()))
        .filter(|(_, l)| !l.is_empty());

    let Some((header_line, header)) = lines.next() else {
        fail!("empty method text");
    };
    let header = parse_method_header(header).map_err(|e| err!(e, "line {}", header_line))?;
    let descriptor = format!("{}->{}{}", class_name, header.name, header.signature.to_jni());
    let ins = header.signature.parameter_words() + if header.is_static { 0 } else { 1 };

    let mut registers: Option<u16> = None;
    let mut labels: HashMap<String, u32> = HashMap::new();
    let mut catches: Vec<(usize, CatchDirective)> = vec![];
    let mut pending: Vec<PendingOp> = vec![];
    let mut address = 0u32;
    let mut skipping: Option<&str> = None;
    let mut ended = false;

    for (line_no, line) in lines {
        let in_context = |e: VmError| err!(err!(e, "line {}", line_no), "{}", descriptor);

        if let Some(end) = skipping {
            if line.starts_with(end) {
                skipping = None;
            }
            continue;
        }
        if line.starts_with(".end method") {
            ended = true;
            break;
        }

        if let Some(count) = line.strip_prefix(".registers") {
            registers = Some(parse_count(count, line_no).map_err(|e| err!(e, "{}", descriptor))?);
        } else if let Some(count) = line.strip_prefix(".locals") {
            let locals = parse_count(count, line_no).map_err(|e| err!(e, "{}", descriptor))?;
            registers = Some(locals.saturating_add(ins));
        } else if line.starts_with(".annotation") {
            skipping = Some(".end annotation");
        } else if line.starts_with(".packed-switch")
            || line.starts_with(".sparse-switch")
            || line.starts_with(".array-data")
        {
            return Err(in_context(VmError::new("payload directives are not supported")));
        } else if line.starts_with(".catch") {
            match parse_catch_line(line) {
                Ok(("", c)) => catches.push((line_no, c)),
                _ => return Err(in_context(VmError::new(&format!("bad catch directive {line}")))),
            }
        } else if line.starts_with('.') {
            trace!("ignoring directive {line}");
        } else if let Some(label) = line.strip_prefix(':') {
            labels.insert(label.to_string(), address);
        } else {
            let (name, operands) = match parse_instruction_line(line) {
                Ok(("", parsed)) => parsed,
                _ => return Err(in_context(VmError::new(&format!("cannot parse {line}")))),
            };
            let Some(opcode) = find_opcode(name) else {
                return Err(in_context(VmError::new(&format!("unknown opcode {name}"))));
            };
            pending.push(PendingOp {
                line_no,
                address,
                opcode,
                operands,
                text: line,
            });
            address += opcode.code_units();
        }
    }

    if !ended {
        return Err(err!(VmError::new("missing .end method"), "{}", descriptor));
    }
    let registers = registers.unwrap_or(ins);
    if registers < ins {
        fail!(("{} registers cannot hold {} parameter words", registers, ins), ("{}", descriptor));
    }
    let params_base = registers - ins;

    let mut ops = Vec::with_capacity(pending.len());
    for p in &pending {
        let reader = OperandReader {
            operands: &p.operands,
            labels: &labels,
            params_base,
            registers,
        };
        let kind = build_kind(p.opcode, &reader)
            .map_err(|e| err!(err!(e, "line {}", p.line_no), "{}", descriptor))?;
        trace!("{:>4}: {}", p.address, p.text);
        ops.push(Op::new(p.address, p.opcode, kind));
    }

    let try_blocks = build_try_blocks(&catches, &labels).map_err(|e| err!(e, "{}", descriptor))?;

    debug!("parsed {} with {} instructions", descriptor, ops.len());
    Ok(MethodImplementation::new(
        class_name,
        &header.name,
        header.signature,
        header.is_static,
        registers,
        ops,
        try_blocks,
    ))
}

// Catch directives sharing a range become one try block, in declaration order.
fn build_try_blocks(
    catches: &[(usize, CatchDirective)],
    labels: &HashMap<String, u32>,
) -> Result<Vec<TryBlock>, VmError> {
    let resolve = |name: &str, line_no: usize| -> Result<u32, VmError> {
        match labels.get(name) {
            Some(a) => Ok(*a),
            None => fail!(("undefined label :{}", name), ("line {}", line_no)),
        }
    };

    let mut blocks: Vec<TryBlock> = vec![];
    for (line_no, c) in catches {
        let start = resolve(&c.start, *line_no)?;
        let end = resolve(&c.end, *line_no)?;
        let handler = ExceptionHandler {
            exception_type: c.exception_type.clone(),
            handler: resolve(&c.handler, *line_no)?,
        };
        match blocks.iter_mut().find(|b| b.start == start && b.end == end) {
            Some(block) => block.handlers.push(handler),
            None => blocks.push(TryBlock {
                start,
                end,
                handlers: vec![handler],
            }),
        }
    }
    Ok(blocks)
}

fn last_word(line: &str) -> Option<&str> {
    line.split_whitespace().last()
}

/// Parses a whole smali class: header plus every method that has code.
pub fn parse_class(text: &str) -> Result<SmaliClassFile, VmError> {
    let mut name: Option<String> = None;
    let mut super_class: Option<String> = None;
    let mut interfaces = vec![];
    let mut method_texts: Vec<String> = vec![];
    let mut current: Option<Vec<&str>> = None;

    for raw in text.lines() {
        let line = strip_comment(raw).trim();
        if let Some(body) = current.as_mut() {
            body.push(raw);
            if line.starts_with(".end method") {
                method_texts.push(body.join("\n"));
                current = None;
            }
            continue;
        }

        if line.starts_with(".class") {
            name = last_word(line).map(|s| s.to_string());
        } else if line.starts_with(".super") {
            super_class = last_word(line).map(|s| s.to_string());
        } else if line.starts_with(".implements") {
            if let Some(i) = last_word(line) {
                interfaces.push(i.to_string());
            }
        } else if line.starts_with(".method") {
            current = Some(vec![raw]);
        }
    }

    if current.is_some() {
        fail!("unterminated method in class text");
    }
    let Some(name) = name else {
        fail!("missing .class directive");
    };

    let mut methods = vec![];
    for text in &method_texts {
        let method = parse_method(&name, text).map_err(|e| err!(e, "{}", name))?;
        if !method.ops().is_empty() {
            methods.push(method);
        }
    }

    Ok(SmaliClassFile {
        class: LocalClass {
            name,
            super_class,
            interfaces,
        },
        methods,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals() {
        assert_eq!(parse_literal_int::<i32>("0x10"), Ok(("", 16)));
        assert_eq!(parse_literal_int::<i32>("-0x1"), Ok(("", -1)));
        assert_eq!(parse_literal_int::<i32>("0xffffffff"), Ok(("", -1)));
        assert_eq!(parse_literal_int::<i64>("0x7fffffffffffffffL"), Ok(("", i64::MAX)));
        assert_eq!(parse_literal_int::<i64>("-0x8000000000000000L"), Ok(("", i64::MIN)));
        assert_eq!(parse_literal_int::<i32>("12t"), Ok(("", 12)));
        assert!(parse_literal_int::<i32>("0x100000000").is_err());
    }

    #[test]
    fn test_operands() {
        let (rest, (name, ops)) =
            parse_instruction_line("invoke-static {v0, p1}, Ljava/lang/Integer;->valueOf(I)Ljava/lang/Integer;").unwrap();
        assert_eq!(rest, "");
        assert_eq!(name, "invoke-static");
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[1], Operand::Method(_)));

        let (_, (_, ops)) = parse_instruction_line("invoke-virtual/range {v0 .. v3}, Lcom/Foo;->bar(III)V").unwrap();
        assert_eq!(ops[0], Operand::RegisterRange(SmaliRegister::Local(0), SmaliRegister::Local(3)));

        let (_, (_, ops)) = parse_instruction_line("const-string v1, \"a, \\\"b\\\"\"").unwrap();
        assert_eq!(ops[1], Operand::Str("a, \"b\"".to_string()));

        let (_, (_, ops)) = parse_instruction_line("sget-object v0, Ljava/lang/System;->out:Ljava/io/PrintStream;").unwrap();
        assert!(matches!(ops[1], Operand::Field(_)));

        let (_, (name, ops)) = parse_instruction_line("return-void").unwrap();
        assert_eq!(name, "return-void");
        assert!(ops.is_empty());
    }

    #[test]
    fn test_catch_line() {
        let (_, c) = parse_catch_line(".catch Ljava/io/IOException; {:try_start_0 .. :try_end_0} :catch_0").unwrap();
        assert_eq!(c.exception_type.as_deref(), Some("Ljava/io/IOException;"));
        assert_eq!(c.handler, "catch_0");
        let (_, c) = parse_catch_line(".catchall {:a .. :b} :c").unwrap();
        assert_eq!(c.exception_type, None);
        assert_eq!(c.start, "a");
    }

    #[test]
    fn test_strip_comment() {
        assert_eq!(strip_comment("const/4 v0, 0x1    # one"), "const/4 v0, 0x1");
        assert_eq!(strip_comment("const-string v0, \"#x\""), "const-string v0, \"#x\"");
    }
}
