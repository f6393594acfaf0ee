//! Standard library function implementations
//!
//! Global builtins (`print`, `len`, ...) resolve after the namespace, so a
//! binding of the same name shadows them. Builtin modules (`math`, `time`,
//! `json`, `sys`) are served by the module loader before the search path.

mod builtins;
mod json;
mod math;
mod time;

use std::rc::Rc;

use super::context::{Context, Namespace};
use super::errors::{self, Failure};
use super::types::Val;
use crate::modules::ModuleLoader;

/* ===================== Standard Library Function Types ===================== */

/// Standard library function identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdlibFunc {
    Print,
    Len,
    Str,
    Num,
    Type,
    Range,
    Keys,
    Exit,
    MathFloor,
    MathCeil,
    MathAbs,
    MathRound,
    TimeSleep,
    TimeNow,
    TimeTick,
    JsonDumps,
    JsonLoads,
    SysModules,
}

impl StdlibFunc {
    pub fn name(&self) -> &'static str {
        match self {
            StdlibFunc::Print => "print",
            StdlibFunc::Len => "len",
            StdlibFunc::Str => "str",
            StdlibFunc::Num => "num",
            StdlibFunc::Type => "type",
            StdlibFunc::Range => "range",
            StdlibFunc::Keys => "keys",
            StdlibFunc::Exit => "exit",
            StdlibFunc::MathFloor => "math.floor",
            StdlibFunc::MathCeil => "math.ceil",
            StdlibFunc::MathAbs => "math.abs",
            StdlibFunc::MathRound => "math.round",
            StdlibFunc::TimeSleep => "time.sleep",
            StdlibFunc::TimeNow => "time.now",
            StdlibFunc::TimeTick => "time.tick",
            StdlibFunc::JsonDumps => "json.dumps",
            StdlibFunc::JsonLoads => "json.loads",
            StdlibFunc::SysModules => "sys.modules",
        }
    }
}

/* ===================== Stdlib Dispatcher ===================== */

/// Call a standard library function with arguments
pub fn call_stdlib_func(func: &StdlibFunc, args: Vec<Val>, ctx: &Context) -> Result<Val, Failure> {
    match func {
        StdlibFunc::Print => builtins::print(&args, ctx),
        StdlibFunc::Len => builtins::len(&args),
        StdlibFunc::Str => builtins::str(&args),
        StdlibFunc::Num => builtins::num(&args),
        StdlibFunc::Type => builtins::type_of(&args),
        StdlibFunc::Range => builtins::range(&args),
        StdlibFunc::Keys => builtins::keys(&args),
        StdlibFunc::Exit => builtins::exit(&args),
        StdlibFunc::MathFloor => math::floor(&args),
        StdlibFunc::MathCeil => math::ceil(&args),
        StdlibFunc::MathAbs => math::abs(&args),
        StdlibFunc::MathRound => math::round(&args),
        StdlibFunc::TimeSleep => time::sleep(&args),
        StdlibFunc::TimeNow => time::now(&args),
        StdlibFunc::TimeTick => time::tick(&args),
        StdlibFunc::JsonDumps => json::dumps(&args),
        StdlibFunc::JsonLoads => json::loads(&args),
        StdlibFunc::SysModules => Ok(Val::List(
            ctx.loader.loaded_names().into_iter().map(Val::Str).collect(),
        )),
    }
}

/// Global builtin lookup, consulted after every scope and the namespace
pub fn builtin(name: &str) -> Option<Val> {
    let func = match name {
        "print" => StdlibFunc::Print,
        "len" => StdlibFunc::Len,
        "str" => StdlibFunc::Str,
        "num" => StdlibFunc::Num,
        "type" => StdlibFunc::Type,
        "range" => StdlibFunc::Range,
        "keys" => StdlibFunc::Keys,
        "exit" => StdlibFunc::Exit,
        _ => return None,
    };
    Some(Val::NativeFunc(func))
}

/* ===================== Builtin Modules ===================== */

pub const BUILTIN_MODULES: &[&str] = &["json", "math", "sys", "time"];

/// Build the namespace of a builtin module
pub fn builtin_module(name: &str, loader: &Rc<ModuleLoader>) -> Option<Namespace> {
    let namespace = Namespace::new();
    let funcs: &[(&str, StdlibFunc)] = match name {
        "math" => {
            namespace.set("pi", Val::Num(std::f64::consts::PI));
            &[
                ("floor", StdlibFunc::MathFloor),
                ("ceil", StdlibFunc::MathCeil),
                ("abs", StdlibFunc::MathAbs),
                ("round", StdlibFunc::MathRound),
            ]
        }
        "time" => &[
            ("sleep", StdlibFunc::TimeSleep),
            ("now", StdlibFunc::TimeNow),
            ("tick", StdlibFunc::TimeTick),
        ],
        "json" => &[
            ("dumps", StdlibFunc::JsonDumps),
            ("loads", StdlibFunc::JsonLoads),
        ],
        "sys" => {
            let path = loader
                .search_path()
                .dirs()
                .into_iter()
                .map(|dir| Val::Str(dir.display().to_string()))
                .collect();
            namespace.set("path", Val::List(path));
            &[("modules", StdlibFunc::SysModules), ("exit", StdlibFunc::Exit)]
        }
        _ => return None,
    };

    for (member, func) in funcs {
        namespace.set(member, Val::NativeFunc(*func));
    }
    Some(namespace)
}

/* ===================== Argument Helpers ===================== */

pub(crate) fn expect_arg_count(args: &[Val], expected: usize, func: &str) -> Result<(), Failure> {
    if args.len() != expected {
        return Err(Failure::throw(
            errors::WRONG_ARG_COUNT,
            format!(
                "{}() expected {} argument(s), got {}",
                func,
                expected,
                args.len()
            ),
        ));
    }
    Ok(())
}

pub(crate) fn num_arg(args: &[Val], index: usize, func: &str) -> Result<f64, Failure> {
    match args.get(index) {
        Some(Val::Num(n)) => Ok(*n),
        Some(other) => Err(Failure::throw(
            errors::WRONG_ARG_TYPE,
            format!(
                "{}() argument {} must be a number, got {}",
                func,
                index + 1,
                other.type_name()
            ),
        )),
        None => Err(Failure::throw(
            errors::WRONG_ARG_COUNT,
            format!("{}() missing argument {}", func, index + 1),
        )),
    }
}
