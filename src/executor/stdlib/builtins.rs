//! Global builtin functions

use super::{expect_arg_count, num_arg};
use crate::executor::context::Context;
use crate::executor::errors::{self, Failure};
use crate::executor::types::Val;

/// print(...values) - write values separated by spaces
pub fn print(args: &[Val], ctx: &Context) -> Result<Val, Failure> {
    let parts: Vec<String> = args.iter().map(|v| v.to_string()).collect();
    ctx.stdout.line(parts.join(" "));
    Ok(Val::Null)
}

pub fn len(args: &[Val]) -> Result<Val, Failure> {
    expect_arg_count(args, 1, "len")?;
    let n = match &args[0] {
        Val::Str(s) => s.chars().count(),
        Val::List(items) => items.len(),
        Val::Obj(map) => map.len(),
        other => {
            return Err(Failure::throw(
                errors::WRONG_ARG_TYPE,
                format!("len() of {} is undefined", other.type_name()),
            ))
        }
    };
    Ok(Val::Num(n as f64))
}

pub fn str(args: &[Val]) -> Result<Val, Failure> {
    expect_arg_count(args, 1, "str")?;
    Ok(Val::Str(args[0].to_string()))
}

pub fn num(args: &[Val]) -> Result<Val, Failure> {
    expect_arg_count(args, 1, "num")?;
    match &args[0] {
        Val::Num(n) => Ok(Val::Num(*n)),
        Val::Bool(b) => Ok(Val::Num(if *b { 1.0 } else { 0.0 })),
        Val::Str(s) => s.trim().parse::<f64>().map(Val::Num).map_err(|_| {
            Failure::throw(
                errors::TYPE_ERROR,
                format!("could not convert string to number: {:?}", s),
            )
        }),
        other => Err(Failure::throw(
            errors::WRONG_ARG_TYPE,
            format!("num() argument must be a string or number, not {}", other.type_name()),
        )),
    }
}

pub fn type_of(args: &[Val]) -> Result<Val, Failure> {
    expect_arg_count(args, 1, "type")?;
    Ok(Val::Str(args[0].type_name().to_string()))
}

/// Largest integer an f64 holds exactly
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
/// Longest list `range` will build
const MAX_RANGE_LEN: usize = 1_000_000;

/// range(stop) or range(start, stop)
pub fn range(args: &[Val]) -> Result<Val, Failure> {
    let (start, stop) = match args.len() {
        1 => (0.0, num_arg(args, 0, "range")?),
        2 => (num_arg(args, 0, "range")?, num_arg(args, 1, "range")?),
        n => {
            return Err(Failure::throw(
                errors::WRONG_ARG_COUNT,
                format!("range() expected 1 or 2 arguments, got {}", n),
            ))
        }
    };

    let start = start.floor();
    for bound in [start, stop] {
        if !bound.is_finite() || bound.abs() > MAX_SAFE_INTEGER {
            return Err(Failure::throw(
                errors::WRONG_ARG_TYPE,
                format!("range() bounds must be finite and at most 2^53 in size, got {}", bound),
            ));
        }
    }

    let count = (stop - start).ceil().max(0.0);
    if count > MAX_RANGE_LEN as f64 {
        return Err(Failure::throw(
            errors::WRONG_ARG_TYPE,
            format!(
                "range() of {} items exceeds the limit of {}",
                count, MAX_RANGE_LEN
            ),
        ));
    }

    let items = (0..count as usize)
        .map(|offset| Val::Num(start + offset as f64))
        .collect();
    Ok(Val::List(items))
}

pub fn keys(args: &[Val]) -> Result<Val, Failure> {
    expect_arg_count(args, 1, "keys")?;
    match &args[0] {
        Val::Obj(map) => Ok(Val::List(map.keys().cloned().map(Val::Str).collect())),
        Val::Module(module) => Ok(Val::List(
            module.namespace().names().into_iter().map(Val::Str).collect(),
        )),
        other => Err(Failure::throw(
            errors::WRONG_ARG_TYPE,
            format!("keys() argument must be an object, got {}", other.type_name()),
        )),
    }
}

/// exit(code?) - end the session
pub fn exit(args: &[Val]) -> Result<Val, Failure> {
    let code = match args.first() {
        None | Some(Val::Null) => 0,
        Some(Val::Num(n)) => *n as i32,
        Some(other) => {
            return Err(Failure::throw(
                errors::WRONG_ARG_TYPE,
                format!("exit() code must be a number, got {}", other.type_name()),
            ))
        }
    };
    Err(Failure::Exit(code))
}
