//! Runtime value types

use futures::future::{FutureExt, LocalBoxFuture, Shared};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::executor::errors::{ErrorInfo, Failure};
use crate::executor::stdlib::StdlibFunc;
use crate::modules::Module;

/// Runtime value type
#[derive(Clone)]
pub enum Val {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Val>),
    Obj(BTreeMap<String, Val>),
    Module(Rc<Module>),
    NativeFunc(StdlibFunc),
    Promise(Promise),
    /// Error value with code and message
    Error(ErrorInfo),
}

impl Val {
    /// Check if value is truthy (for conditionals)
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Bool(b) => *b,
            Val::Null => false,
            Val::Num(n) => *n != 0.0 && !n.is_nan(),
            Val::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Null => "null",
            Val::Bool(_) => "boolean",
            Val::Num(_) => "number",
            Val::Str(_) => "string",
            Val::List(_) => "list",
            Val::Obj(_) => "object",
            Val::Module(_) => "module",
            Val::NativeFunc(_) => "function",
            Val::Promise(_) => "promise",
            Val::Error(_) => "error",
        }
    }

    /// Representation echoed by the console (strings quoted)
    pub fn repr(&self) -> String {
        match self {
            Val::Str(s) => format!("{:?}", s),
            other => other.to_string(),
        }
    }
}

pub(crate) fn format_num(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Display is the `print`/`str` form: strings unquoted at the top level
impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Null => write!(f, "null"),
            Val::Bool(b) => write!(f, "{}", b),
            Val::Num(n) => write!(f, "{}", format_num(*n)),
            Val::Str(s) => write!(f, "{}", s),
            Val::List(items) => {
                let parts: Vec<String> = items.iter().map(Val::repr).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Val::Obj(map) => {
                let parts: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.repr()))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Val::Module(module) => write!(f, "<module '{}'>", module.name()),
            Val::NativeFunc(func) => write!(f, "<builtin {}>", func.name()),
            Val::Promise(_) => write!(f, "<promise>"),
            Val::Error(err) => write!(f, "{}", err),
        }
    }
}

impl fmt::Debug for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Null => write!(f, "Null"),
            Val::Bool(b) => write!(f, "Bool({})", b),
            Val::Num(n) => write!(f, "Num({})", n),
            Val::Str(s) => write!(f, "Str({:?})", s),
            Val::List(items) => f.debug_tuple("List").field(items).finish(),
            Val::Obj(map) => f.debug_tuple("Obj").field(map).finish(),
            Val::Module(module) => write!(f, "Module({})", module.name()),
            Val::NativeFunc(func) => write!(f, "NativeFunc({:?})", func),
            Val::Promise(_) => write!(f, "Promise"),
            Val::Error(err) => f.debug_tuple("Error").field(err).finish(),
        }
    }
}

impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Val::Null, Val::Null) => true,
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Num(a), Val::Num(b)) => a == b,
            (Val::Str(a), Val::Str(b)) => a == b,
            (Val::List(a), Val::List(b)) => a == b,
            (Val::Obj(a), Val::Obj(b)) => a == b,
            (Val::Module(a), Val::Module(b)) => Rc::ptr_eq(a, b),
            (Val::NativeFunc(a), Val::NativeFunc(b)) => a == b,
            (Val::Error(a), Val::Error(b)) => a == b,
            _ => false,
        }
    }
}

/* ===================== Promises ===================== */

/// A pending value produced by an async builtin.
///
/// Awaiting the same promise twice yields the same result.
#[derive(Clone)]
pub struct Promise {
    inner: Shared<LocalBoxFuture<'static, Result<Val, Failure>>>,
}

impl Promise {
    pub fn new(fut: impl std::future::Future<Output = Result<Val, Failure>> + 'static) -> Self {
        Self {
            inner: fut.boxed_local().shared(),
        }
    }

    pub async fn settle(self) -> Result<Val, Failure> {
        self.inner.await
    }
}
