use bitflags::bitflags;
use once_cell::sync::Lazy;
use std::collections::HashMap;

// Defines various flags that can be associated with an opcode.
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpcodeFlags: u32 {
        const CAN_THROW = 0x1;
        const CAN_CONTINUE = 0x4;
        const SETS_RESULT = 0x8;
        const SETS_REGISTER = 0x10;
        const SETS_WIDE_REGISTER = 0x20;
        const STATIC_FIELD_ACCESSOR = 0x100;
    }
}

/// Instruction encoding formats, named as in the Dalvik bytecode documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Format10t,
    Format10x,
    Format11n,
    Format11x,
    Format12x,
    Format20t,
    Format21c,
    Format21ih,
    Format21lh,
    Format21s,
    Format21t,
    Format22b,
    Format22c,
    Format22s,
    Format22t,
    Format22x,
    Format23x,
    Format30t,
    Format31c,
    Format31i,
    Format31t,
    Format32x,
    Format35c,
    Format3rc,
    Format51l,
}

impl Format {
    /// Width of an instruction in this format, in 16-bit code units.
    pub const fn code_units(&self) -> u32 {
        match self {
            Format::Format10t
            | Format::Format10x
            | Format::Format11n
            | Format::Format11x
            | Format::Format12x => 1,

            Format::Format20t
            | Format::Format21c
            | Format::Format21ih
            | Format::Format21lh
            | Format::Format21s
            | Format::Format21t
            | Format::Format22b
            | Format::Format22c
            | Format::Format22s
            | Format::Format22t
            | Format::Format22x
            | Format::Format23x => 2,

            Format::Format30t
            | Format::Format31c
            | Format::Format31i
            | Format::Format31t
            | Format::Format32x
            | Format::Format35c
            | Format::Format3rc => 3,

            Format::Format51l => 5,
        }
    }
}

/// Static description of one Dalvik opcode.
#[derive(Debug)]
pub struct Opcode {
    pub value: u8,
    pub name: &'static str,
    pub format: Format,
    pub flags: OpcodeFlags,
}

impl Opcode {
    const fn new(value: u8, name: &'static str, format: Format, flags: OpcodeFlags) -> Self {
        Opcode { value, name, format, flags }
    }

    /// Determines if the opcode can throw an exception.
    pub fn can_throw(&self) -> bool {
        self.flags.contains(OpcodeFlags::CAN_THROW)
    }

    /// Determines if execution can continue to the next instruction.
    pub fn can_continue(&self) -> bool {
        self.flags.contains(OpcodeFlags::CAN_CONTINUE)
    }

    /// Determines if the opcode sets the "hidden" result register.
    pub fn sets_result(&self) -> bool {
        self.flags.contains(OpcodeFlags::SETS_RESULT)
    }

    /// Determines if the opcode sets the value of its first register.
    pub fn sets_register(&self) -> bool {
        self.flags.contains(OpcodeFlags::SETS_REGISTER)
    }

    /// Determines if the opcode sets the value of its first register to a wide type.
    pub fn sets_wide_register(&self) -> bool {
        self.flags.contains(OpcodeFlags::SETS_WIDE_REGISTER)
    }

    /// Determines if the opcode is a static field accessor.
    pub fn is_static_field_accessor(&self) -> bool {
        self.flags.contains(OpcodeFlags::STATIC_FIELD_ACCESSOR)
    }

    pub fn code_units(&self) -> u32 {
        self.format.code_units()
    }
}

static OPCODES: Lazy<Vec<Opcode>> = Lazy::new(|| {
    use Format::*;

    let cont = OpcodeFlags::CAN_CONTINUE;
    let throw = OpcodeFlags::CAN_THROW;
    let reg = OpcodeFlags::SETS_REGISTER;
    let wide = OpcodeFlags::SETS_WIDE_REGISTER;
    let result = OpcodeFlags::SETS_RESULT;
    let stat = OpcodeFlags::STATIC_FIELD_ACCESSOR;
    let none = OpcodeFlags::empty();

    vec![
        Opcode::new(0x00, "nop", Format10x, cont),
        Opcode::new(0x01, "move", Format12x, cont | reg),
        Opcode::new(0x02, "move/from16", Format22x, cont | reg),
        Opcode::new(0x03, "move/16", Format32x, cont | reg),
        Opcode::new(0x04, "move-wide", Format12x, cont | reg | wide),
        Opcode::new(0x05, "move-wide/from16", Format22x, cont | reg | wide),
        Opcode::new(0x06, "move-wide/16", Format32x, cont | reg | wide),
        Opcode::new(0x07, "move-object", Format12x, cont | reg),
        Opcode::new(0x08, "move-object/from16", Format22x, cont | reg),
        Opcode::new(0x09, "move-object/16", Format32x, cont | reg),
        Opcode::new(0x0a, "move-result", Format11x, cont | reg),
        Opcode::new(0x0b, "move-result-wide", Format11x, cont | reg | wide),
        Opcode::new(0x0c, "move-result-object", Format11x, cont | reg),
        Opcode::new(0x0d, "move-exception", Format11x, cont | reg),
        Opcode::new(0x0e, "return-void", Format10x, none),
        Opcode::new(0x0f, "return", Format11x, none),
        Opcode::new(0x10, "return-wide", Format11x, none),
        Opcode::new(0x11, "return-object", Format11x, none),
        Opcode::new(0x12, "const/4", Format11n, cont | reg),
        Opcode::new(0x13, "const/16", Format21s, cont | reg),
        Opcode::new(0x14, "const", Format31i, cont | reg),
        Opcode::new(0x15, "const/high16", Format21ih, cont | reg),
        Opcode::new(0x16, "const-wide/16", Format21s, cont | reg | wide),
        Opcode::new(0x17, "const-wide/32", Format31i, cont | reg | wide),
        Opcode::new(0x18, "const-wide", Format51l, cont | reg | wide),
        Opcode::new(0x19, "const-wide/high16", Format21lh, cont | reg | wide),
        Opcode::new(0x1a, "const-string", Format21c, throw | cont | reg),
        Opcode::new(0x1b, "const-string/jumbo", Format31c, throw | cont | reg),
        Opcode::new(0x1c, "const-class", Format21c, throw | cont | reg),
        Opcode::new(0x1d, "monitor-enter", Format11x, throw | cont),
        Opcode::new(0x1e, "monitor-exit", Format11x, throw | cont),
        Opcode::new(0x1f, "check-cast", Format21c, throw | cont | reg),
        Opcode::new(0x20, "instance-of", Format22c, throw | cont | reg),
        Opcode::new(0x21, "array-length", Format12x, throw | cont | reg),
        Opcode::new(0x22, "new-instance", Format21c, throw | cont | reg),
        Opcode::new(0x23, "new-array", Format22c, throw | cont | reg),
        Opcode::new(0x24, "filled-new-array", Format35c, throw | cont | result),
        Opcode::new(0x25, "filled-new-array/range", Format3rc, throw | cont | result),
        Opcode::new(0x26, "fill-array-data", Format31t, cont),
        Opcode::new(0x27, "throw", Format11x, throw),
        Opcode::new(0x28, "goto", Format10t, none),
        Opcode::new(0x29, "goto/16", Format20t, none),
        Opcode::new(0x2a, "goto/32", Format30t, none),
        Opcode::new(0x2b, "packed-switch", Format31t, cont),
        Opcode::new(0x2c, "sparse-switch", Format31t, cont),
        Opcode::new(0x2d, "cmpl-float", Format23x, cont | reg),
        Opcode::new(0x2e, "cmpg-float", Format23x, cont | reg),
        Opcode::new(0x2f, "cmpl-double", Format23x, cont | reg),
        Opcode::new(0x30, "cmpg-double", Format23x, cont | reg),
        Opcode::new(0x31, "cmp-long", Format23x, cont | reg),
        Opcode::new(0x32, "if-eq", Format22t, cont),
        Opcode::new(0x33, "if-ne", Format22t, cont),
        Opcode::new(0x34, "if-lt", Format22t, cont),
        Opcode::new(0x35, "if-ge", Format22t, cont),
        Opcode::new(0x36, "if-gt", Format22t, cont),
        Opcode::new(0x37, "if-le", Format22t, cont),
        Opcode::new(0x38, "if-eqz", Format21t, cont),
        Opcode::new(0x39, "if-nez", Format21t, cont),
        Opcode::new(0x3a, "if-ltz", Format21t, cont),
        Opcode::new(0x3b, "if-gez", Format21t, cont),
        Opcode::new(0x3c, "if-gtz", Format21t, cont),
        Opcode::new(0x3d, "if-lez", Format21t, cont),
        Opcode::new(0x44, "aget", Format23x, throw | cont | reg),
        Opcode::new(0x45, "aget-wide", Format23x, throw | cont | reg | wide),
        Opcode::new(0x46, "aget-object", Format23x, throw | cont | reg),
        Opcode::new(0x47, "aget-boolean", Format23x, throw | cont | reg),
        Opcode::new(0x48, "aget-byte", Format23x, throw | cont | reg),
        Opcode::new(0x49, "aget-char", Format23x, throw | cont | reg),
        Opcode::new(0x4a, "aget-short", Format23x, throw | cont | reg),
        Opcode::new(0x4b, "aput", Format23x, throw | cont),
        Opcode::new(0x4c, "aput-wide", Format23x, throw | cont),
        Opcode::new(0x4d, "aput-object", Format23x, throw | cont),
        Opcode::new(0x4e, "aput-boolean", Format23x, throw | cont),
        Opcode::new(0x4f, "aput-byte", Format23x, throw | cont),
        Opcode::new(0x50, "aput-char", Format23x, throw | cont),
        Opcode::new(0x51, "aput-short", Format23x, throw | cont),
        Opcode::new(0x52, "iget", Format22c, throw | cont | reg),
        Opcode::new(0x53, "iget-wide", Format22c, throw | cont | reg | wide),
        Opcode::new(0x54, "iget-object", Format22c, throw | cont | reg),
        Opcode::new(0x55, "iget-boolean", Format22c, throw | cont | reg),
        Opcode::new(0x56, "iget-byte", Format22c, throw | cont | reg),
        Opcode::new(0x57, "iget-char", Format22c, throw | cont | reg),
        Opcode::new(0x58, "iget-short", Format22c, throw | cont | reg),
        Opcode::new(0x59, "iput", Format22c, throw | cont),
        Opcode::new(0x5a, "iput-wide", Format22c, throw | cont),
        Opcode::new(0x5b, "iput-object", Format22c, throw | cont),
        Opcode::new(0x5c, "iput-boolean", Format22c, throw | cont),
        Opcode::new(0x5d, "iput-byte", Format22c, throw | cont),
        Opcode::new(0x5e, "iput-char", Format22c, throw | cont),
        Opcode::new(0x5f, "iput-short", Format22c, throw | cont),
        Opcode::new(0x60, "sget", Format21c, throw | cont | reg | stat),
        Opcode::new(0x61, "sget-wide", Format21c, throw | cont | reg | wide | stat),
        Opcode::new(0x62, "sget-object", Format21c, throw | cont | reg | stat),
        Opcode::new(0x63, "sget-boolean", Format21c, throw | cont | reg | stat),
        Opcode::new(0x64, "sget-byte", Format21c, throw | cont | reg | stat),
        Opcode::new(0x65, "sget-char", Format21c, throw | cont | reg | stat),
        Opcode::new(0x66, "sget-short", Format21c, throw | cont | reg | stat),
        Opcode::new(0x67, "sput", Format21c, throw | cont | stat),
        Opcode::new(0x68, "sput-wide", Format21c, throw | cont | stat),
        Opcode::new(0x69, "sput-object", Format21c, throw | cont | stat),
        Opcode::new(0x6a, "sput-boolean", Format21c, throw | cont | stat),
        Opcode::new(0x6b, "sput-byte", Format21c, throw | cont | stat),
        Opcode::new(0x6c, "sput-char", Format21c, throw | cont | stat),
        Opcode::new(0x6d, "sput-short", Format21c, throw | cont | stat),
        Opcode::new(0x6e, "invoke-virtual", Format35c, throw | cont | result),
        Opcode::new(0x6f, "invoke-super", Format35c, throw | cont | result),
        Opcode::new(0x70, "invoke-direct", Format35c, throw | cont | result),
        Opcode::new(0x71, "invoke-static", Format35c, throw | cont | result),
        Opcode::new(0x72, "invoke-interface", Format35c, throw | cont | result),
        Opcode::new(0x74, "invoke-virtual/range", Format3rc, throw | cont | result),
        Opcode::new(0x75, "invoke-super/range", Format3rc, throw | cont | result),
        Opcode::new(0x76, "invoke-direct/range", Format3rc, throw | cont | result),
        Opcode::new(0x77, "invoke-static/range", Format3rc, throw | cont | result),
        Opcode::new(0x78, "invoke-interface/range", Format3rc, throw | cont | result),
        Opcode::new(0x7b, "neg-int", Format12x, cont | reg),
        Opcode::new(0x7c, "not-int", Format12x, cont | reg),
        Opcode::new(0x7d, "neg-long", Format12x, cont | reg | wide),
        Opcode::new(0x7e, "not-long", Format12x, cont | reg | wide),
        Opcode::new(0x7f, "neg-float", Format12x, cont | reg),
        Opcode::new(0x80, "neg-double", Format12x, cont | reg | wide),
        Opcode::new(0x81, "int-to-long", Format12x, cont | reg | wide),
        Opcode::new(0x82, "int-to-float", Format12x, cont | reg),
        Opcode::new(0x83, "int-to-double", Format12x, cont | reg | wide),
        Opcode::new(0x84, "long-to-int", Format12x, cont | reg),
        Opcode::new(0x85, "long-to-float", Format12x, cont | reg),
        Opcode::new(0x86, "long-to-double", Format12x, cont | reg | wide),
        Opcode::new(0x87, "float-to-int", Format12x, cont | reg),
        Opcode::new(0x88, "float-to-long", Format12x, cont | reg | wide),
        Opcode::new(0x89, "float-to-double", Format12x, cont | reg | wide),
        Opcode::new(0x8a, "double-to-int", Format12x, cont | reg),
        Opcode::new(0x8b, "double-to-long", Format12x, cont | reg | wide),
        Opcode::new(0x8c, "double-to-float", Format12x, cont | reg),
        Opcode::new(0x8d, "int-to-byte", Format12x, cont | reg),
        Opcode::new(0x8e, "int-to-char", Format12x, cont | reg),
        Opcode::new(0x8f, "int-to-short", Format12x, cont | reg),
        Opcode::new(0x90, "add-int", Format23x, cont | reg),
        Opcode::new(0x91, "sub-int", Format23x, cont | reg),
        Opcode::new(0x92, "mul-int", Format23x, cont | reg),
        Opcode::new(0x93, "div-int", Format23x, throw | cont | reg),
        Opcode::new(0x94, "rem-int", Format23x, throw | cont | reg),
        Opcode::new(0x95, "and-int", Format23x, cont | reg),
        Opcode::new(0x96, "or-int", Format23x, cont | reg),
        Opcode::new(0x97, "xor-int", Format23x, cont | reg),
        Opcode::new(0x98, "shl-int", Format23x, cont | reg),
        Opcode::new(0x99, "shr-int", Format23x, cont | reg),
        Opcode::new(0x9a, "ushr-int", Format23x, cont | reg),
        Opcode::new(0x9b, "add-long", Format23x, cont | reg | wide),
        Opcode::new(0x9c, "sub-long", Format23x, cont | reg | wide),
        Opcode::new(0x9d, "mul-long", Format23x, cont | reg | wide),
        Opcode::new(0x9e, "div-long", Format23x, throw | cont | reg | wide),
        Opcode::new(0x9f, "rem-long", Format23x, throw | cont | reg | wide),
        Opcode::new(0xa0, "and-long", Format23x, cont | reg | wide),
        Opcode::new(0xa1, "or-long", Format23x, cont | reg | wide),
        Opcode::new(0xa2, "xor-long", Format23x, cont | reg | wide),
        Opcode::new(0xa3, "shl-long", Format23x, cont | reg | wide),
        Opcode::new(0xa4, "shr-long", Format23x, cont | reg | wide),
        Opcode::new(0xa5, "ushr-long", Format23x, cont | reg | wide),
        Opcode::new(0xa6, "add-float", Format23x, cont | reg),
        Opcode::new(0xa7, "sub-float", Format23x, cont | reg),
        Opcode::new(0xa8, "mul-float", Format23x, cont | reg),
        Opcode::new(0xa9, "div-float", Format23x, cont | reg),
        Opcode::new(0xaa, "rem-float", Format23x, cont | reg),
        Opcode::new(0xab, "add-double", Format23x, cont | reg | wide),
        Opcode::new(0xac, "sub-double", Format23x, cont | reg | wide),
        Opcode::new(0xad, "mul-double", Format23x, cont | reg | wide),
        Opcode::new(0xae, "div-double", Format23x, cont | reg | wide),
        Opcode::new(0xaf, "rem-double", Format23x, cont | reg | wide),
        Opcode::new(0xb0, "add-int/2addr", Format12x, cont | reg),
        Opcode::new(0xb1, "sub-int/2addr", Format12x, cont | reg),
        Opcode::new(0xb2, "mul-int/2addr", Format12x, cont | reg),
        Opcode::new(0xb3, "div-int/2addr", Format12x, throw | cont | reg),
        Opcode::new(0xb4, "rem-int/2addr", Format12x, throw | cont | reg),
        Opcode::new(0xb5, "and-int/2addr", Format12x, cont | reg),
        Opcode::new(0xb6, "or-int/2addr", Format12x, cont | reg),
        Opcode::new(0xb7, "xor-int/2addr", Format12x, cont | reg),
        Opcode::new(0xb8, "shl-int/2addr", Format12x, cont | reg),
        Opcode::new(0xb9, "shr-int/2addr", Format12x, cont | reg),
        Opcode::new(0xba, "ushr-int/2addr", Format12x, cont | reg),
        Opcode::new(0xbb, "add-long/2addr", Format12x, cont | reg | wide),
        Opcode::new(0xbc, "sub-long/2addr", Format12x, cont | reg | wide),
        Opcode::new(0xbd, "mul-long/2addr", Format12x, cont | reg | wide),
        Opcode::new(0xbe, "div-long/2addr", Format12x, throw | cont | reg | wide),
        Opcode::new(0xbf, "rem-long/2addr", Format12x, throw | cont | reg | wide),
        Opcode::new(0xc0, "and-long/2addr", Format12x, cont | reg | wide),
        Opcode::new(0xc1, "or-long/2addr", Format12x, cont | reg | wide),
        Opcode::new(0xc2, "xor-long/2addr", Format12x, cont | reg | wide),
        Opcode::new(0xc3, "shl-long/2addr", Format12x, cont | reg | wide),
        Opcode::new(0xc4, "shr-long/2addr", Format12x, cont | reg | wide),
        Opcode::new(0xc5, "ushr-long/2addr", Format12x, cont | reg | wide),
        Opcode::new(0xc6, "add-float/2addr", Format12x, cont | reg),
        Opcode::new(0xc7, "sub-float/2addr", Format12x, cont | reg),
        Opcode::new(0xc8, "mul-float/2addr", Format12x, cont | reg),
        Opcode::new(0xc9, "div-float/2addr", Format12x, cont | reg),
        Opcode::new(0xca, "rem-float/2addr", Format12x, cont | reg),
        Opcode::new(0xcb, "add-double/2addr", Format12x, cont | reg | wide),
        Opcode::new(0xcc, "sub-double/2addr", Format12x, cont | reg | wide),
        Opcode::new(0xcd, "mul-double/2addr", Format12x, cont | reg | wide),
        Opcode::new(0xce, "div-double/2addr", Format12x, cont | reg | wide),
        Opcode::new(0xcf, "rem-double/2addr", Format12x, cont | reg | wide),
        Opcode::new(0xd0, "add-int/lit16", Format22s, cont | reg),
        Opcode::new(0xd1, "rsub-int", Format22s, cont | reg),
        Opcode::new(0xd2, "mul-int/lit16", Format22s, cont | reg),
        Opcode::new(0xd3, "div-int/lit16", Format22s, throw | cont | reg),
        Opcode::new(0xd4, "rem-int/lit16", Format22s, throw | cont | reg),
        Opcode::new(0xd5, "and-int/lit16", Format22s, cont | reg),
        Opcode::new(0xd6, "or-int/lit16", Format22s, cont | reg),
        Opcode::new(0xd7, "xor-int/lit16", Format22s, cont | reg),
        Opcode::new(0xd8, "add-int/lit8", Format22b, cont | reg),
        Opcode::new(0xd9, "rsub-int/lit8", Format22b, cont | reg),
        Opcode::new(0xda, "mul-int/lit8", Format22b, cont | reg),
        Opcode::new(0xdb, "div-int/lit8", Format22b, throw | cont | reg),
        Opcode::new(0xdc, "rem-int/lit8", Format22b, throw | cont | reg),
        Opcode::new(0xdd, "and-int/lit8", Format22b, cont | reg),
        Opcode::new(0xde, "or-int/lit8", Format22b, cont | reg),
        Opcode::new(0xdf, "xor-int/lit8", Format22b, cont | reg),
        Opcode::new(0xe0, "shl-int/lit8", Format22b, cont | reg),
        Opcode::new(0xe1, "shr-int/lit8", Format22b, cont | reg),
        Opcode::new(0xe2, "ushr-int/lit8", Format22b, cont | reg),
    ]
});

static OPCODES_BY_NAME: Lazy<HashMap<&'static str, &'static Opcode>> =
    Lazy::new(|| OPCODES.iter().map(|o| (o.name, o)).collect());

/// Looks up an opcode by its smali mnemonic, e.g. `"const/4"`.
pub fn find_opcode(name: &str) -> Option<&'static Opcode> {
    OPCODES_BY_NAME.get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name() {
        let goto = find_opcode("goto").unwrap();
        assert_eq!(goto.value, 0x28);
        assert_eq!(goto.code_units(), 1);
        assert!(!goto.can_continue());

        let invoke = find_opcode("invoke-static/range").unwrap();
        assert_eq!(invoke.code_units(), 3);
        assert!(invoke.sets_result());
        assert!(invoke.can_throw());

        assert!(find_opcode("not-an-opcode").is_none());
    }

    #[test]
    fn widths_follow_format() {
        assert_eq!(find_opcode("const-wide").unwrap().code_units(), 5);
        assert_eq!(find_opcode("const/16").unwrap().code_units(), 2);
        assert_eq!(find_opcode("goto/32").unwrap().code_units(), 3);
        assert!(find_opcode("sget-object").unwrap().is_static_field_accessor());
        assert!(find_opcode("move-wide").unwrap().sets_wide_register());
    }
}
