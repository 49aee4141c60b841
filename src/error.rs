use std::error::Error;
use std::fmt;

macro_rules! err {
    ($base:expr, $msg:literal) => {
        $crate::error::VmError::with_context($base, $msg.to_string())
    };
    ($base:expr, $fmtstr:literal, $($args:tt)*) => {
        $crate::error::VmError::with_context($base, format!($fmtstr, $($args)*))
    };
}

macro_rules! fail {
    ($msg:literal) => {
        return Err($crate::error::VmError::new($msg))
    };
    (($msg:literal), ($context:literal)) => {
        return Err($crate::error::VmError::with_context($crate::error::VmError::new($msg), $context.to_string()))
    };
    ($fmtstr:literal, $($args:tt)*) => {
        return Err($crate::error::VmError::new(&format!($fmtstr, $($args)*)))
    };
    (($fmtstr:literal, $($args:tt)*), ($contextfmt:literal, $($contextargs:tt)*)) => {
        return Err($crate::error::VmError::with_context($crate::error::VmError::new(&format!($fmtstr, $($args)*)), format!($contextfmt, $($contextargs)*)))
    };
}

/// Error raised while loading or executing a method.
///
/// Contexts are pushed innermost first, so the rendered message reads
/// `"unknown opcode foo for line 3 of Lcom/Example;->run()V"`.
#[derive(Debug, PartialEq, Eq)]
pub struct VmError
{
    msg: String,
    contexts: Vec<String>,
}

impl VmError
{
    pub(crate) fn new(msg: &str) -> Self
    {
        VmError {
            msg: msg.to_string(),
            contexts: Vec::new(),
        }
    }

    pub(crate) fn with_context(base: VmError, context: String) -> Self
    {
        let mut contexts = base.contexts;
        contexts.push(context);
        VmError { msg: base.msg, contexts }
    }

    pub fn message(&self) -> &str
    {
        &self.msg
    }
}

impl fmt::Display for VmError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.msg)?;
        let mut connector = " for ";
        for context in &self.contexts
        {
            write!(f, "{}{}", connector, context)?;
            connector = " of ";
        }
        Ok(())
    }
}

impl Error for VmError {}

/// The ancestry of a non-local type could not be resolved at all.
///
/// This means "cannot determine", which callers must keep apart from a plain `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAncestors
{
    pub class_name: String,
}

impl UnknownAncestors
{
    pub fn new(class_name: &str) -> Self
    {
        UnknownAncestors { class_name: class_name.to_string() }
    }
}

impl fmt::Display for UnknownAncestors
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "unable to resolve ancestors of {}", self.class_name)
    }
}

impl Error for UnknownAncestors {}

impl From<UnknownAncestors> for VmError
{
    fn from(e: UnknownAncestors) -> Self
    {
        VmError::new(&e.to_string())
    }
}
