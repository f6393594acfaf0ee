//! math module functions

use super::{expect_arg_count, num_arg};
use crate::executor::errors::Failure;
use crate::executor::types::Val;

pub fn floor(args: &[Val]) -> Result<Val, Failure> {
    expect_arg_count(args, 1, "floor")?;
    Ok(Val::Num(num_arg(args, 0, "floor")?.floor()))
}

pub fn ceil(args: &[Val]) -> Result<Val, Failure> {
    expect_arg_count(args, 1, "ceil")?;
    Ok(Val::Num(num_arg(args, 0, "ceil")?.ceil()))
}

pub fn abs(args: &[Val]) -> Result<Val, Failure> {
    expect_arg_count(args, 1, "abs")?;
    Ok(Val::Num(num_arg(args, 0, "abs")?.abs()))
}

pub fn round(args: &[Val]) -> Result<Val, Failure> {
    expect_arg_count(args, 1, "round")?;
    Ok(Val::Num(num_arg(args, 0, "round")?.round()))
}
