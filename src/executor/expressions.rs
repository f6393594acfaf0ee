//! Expression evaluation

use futures::future::LocalBoxFuture;
use std::collections::BTreeMap;

use super::errors::{self, Failure};
use super::statements::list_index;
use super::stdlib;
use super::types::{BinaryOp, Expr, UnaryOp, Val};
use super::Frame;

impl Frame {
    pub(crate) fn eval<'a>(&'a self, expr: &'a Expr) -> LocalBoxFuture<'a, Result<Val, Failure>> {
        Box::pin(async move {
            match expr {
                Expr::LitBool { v, .. } => Ok(Val::Bool(*v)),
                Expr::LitNum { v, .. } => Ok(Val::Num(*v)),
                Expr::LitStr { v, .. } => Ok(Val::Str(v.clone())),
                Expr::LitNull { .. } => Ok(Val::Null),
                Expr::LitList { elements, .. } => {
                    let mut items = Vec::with_capacity(elements.len());
                    for element in elements {
                        items.push(self.eval(element).await?);
                    }
                    Ok(Val::List(items))
                }
                Expr::LitObj { properties, .. } => {
                    let mut map = BTreeMap::new();
                    for (key, value) in properties {
                        map.insert(key.clone(), self.eval(value).await?);
                    }
                    Ok(Val::Obj(map))
                }
                Expr::Ident { name, .. } => self.lookup(name),
                Expr::Member {
                    object,
                    property,
                    optional,
                    ..
                } => {
                    let object = self.eval(object).await?;
                    get_member(&object, property, *optional)
                }
                Expr::Index { object, index, .. } => {
                    let object = self.eval(object).await?;
                    let index = self.eval(index).await?;
                    get_index(&object, &index)
                }
                Expr::Call { callee, args, .. } => {
                    let callee = self.eval(callee).await?;
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args {
                        values.push(self.eval(arg).await?);
                    }
                    match callee {
                        Val::NativeFunc(func) => stdlib::call_stdlib_func(&func, values, &self.ctx),
                        other => Err(Failure::throw(
                            errors::NOT_A_FUNCTION,
                            format!("{} is not a function", other.type_name()),
                        )),
                    }
                }
                Expr::Await { inner, .. } => match self.eval(inner).await? {
                    Val::Promise(promise) => promise.settle().await,
                    value => Ok(value),
                },
                Expr::Unary { op, operand, .. } => {
                    let value = self.eval(operand).await?;
                    match (op, value) {
                        (UnaryOp::Not, value) => Ok(Val::Bool(!value.is_truthy())),
                        (UnaryOp::Neg, Val::Num(n)) => Ok(Val::Num(-n)),
                        (UnaryOp::Neg, other) => Err(Failure::throw(
                            errors::TYPE_ERROR,
                            format!("Cannot negate {}", other.type_name()),
                        )),
                    }
                }
                Expr::BinaryOp {
                    op, left, right, ..
                } => {
                    let left = self.eval(left).await?;
                    match op {
                        BinaryOp::And if !left.is_truthy() => Ok(left),
                        BinaryOp::Or if left.is_truthy() => Ok(left),
                        BinaryOp::Nullish if left != Val::Null => Ok(left),
                        BinaryOp::And | BinaryOp::Or | BinaryOp::Nullish => self.eval(right).await,
                        _ => {
                            let right = self.eval(right).await?;
                            binary_op(*op, left, right)
                        }
                    }
                }
                Expr::Ternary {
                    condition,
                    consequent,
                    alternate,
                    ..
                } => {
                    if self.eval(condition).await?.is_truthy() {
                        self.eval(consequent).await
                    } else {
                        self.eval(alternate).await
                    }
                }
            }
        })
    }

    /// Resolve a name: block scopes, then the namespace, then builtins
    pub(crate) fn lookup(&self, name: &str) -> Result<Val, Failure> {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.vars.get(name) {
                return Ok(value.clone());
            }
        }
        if let Some(value) = self.ctx.globals.get(name) {
            return Ok(value);
        }
        stdlib::builtin(name).ok_or_else(|| {
            Failure::throw(
                errors::UNDEFINED_VARIABLE,
                format!("Variable '{}' is not defined", name),
            )
        })
    }
}

fn get_member(object: &Val, property: &str, optional: bool) -> Result<Val, Failure> {
    match object {
        Val::Null if optional => Ok(Val::Null),
        Val::Null => Err(Failure::throw(
            errors::TYPE_ERROR,
            format!("Cannot read property '{}' of null", property),
        )),
        Val::Obj(map) => Ok(map.get(property).cloned().unwrap_or(Val::Null)),
        Val::Module(module) => module.namespace().get(property).ok_or_else(|| {
            Failure::throw(
                errors::PROPERTY_NOT_FOUND,
                format!("module '{}' has no attribute '{}'", module.name(), property),
            )
        }),
        Val::List(items) if property == "length" => Ok(Val::Num(items.len() as f64)),
        Val::Str(s) if property == "length" => Ok(Val::Num(s.chars().count() as f64)),
        Val::Error(err) if property == "code" => Ok(Val::Str(err.code.clone())),
        Val::Error(err) if property == "message" => Ok(Val::Str(err.message.clone())),
        other => Err(Failure::throw(
            errors::PROPERTY_NOT_FOUND,
            format!("Property '{}' not found on {}", property, other.type_name()),
        )),
    }
}

fn get_index(object: &Val, index: &Val) -> Result<Val, Failure> {
    match (object, index) {
        (Val::List(items), Val::Num(n)) => Ok(list_index(*n, items.len())
            .map(|i| items[i].clone())
            .unwrap_or(Val::Null)),
        (Val::Str(s), Val::Num(n)) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(list_index(*n, chars.len())
                .map(|i| Val::Str(chars[i].to_string()))
                .unwrap_or(Val::Null))
        }
        (Val::Obj(_) | Val::Module(_) | Val::Error(_), Val::Str(key)) => get_member(object, key, true),
        (object, index) => Err(Failure::throw(
            errors::TYPE_ERROR,
            format!(
                "Cannot index {} with {}",
                object.type_name(),
                index.type_name()
            ),
        )),
    }
}

pub(crate) fn binary_op(op: BinaryOp, left: Val, right: Val) -> Result<Val, Failure> {
    match (op, left, right) {
        (BinaryOp::Eq, l, r) => Ok(Val::Bool(l == r)),
        (BinaryOp::Ne, l, r) => Ok(Val::Bool(l != r)),
        (BinaryOp::Add, Val::Num(a), Val::Num(b)) => Ok(Val::Num(a + b)),
        (BinaryOp::Add, Val::List(mut a), Val::List(b)) => {
            a.extend(b);
            Ok(Val::List(a))
        }
        (BinaryOp::Add, Val::Str(a), b) => Ok(Val::Str(format!("{}{}", a, b))),
        (BinaryOp::Add, a, Val::Str(b)) => Ok(Val::Str(format!("{}{}", a, b))),
        (BinaryOp::Sub, Val::Num(a), Val::Num(b)) => Ok(Val::Num(a - b)),
        (BinaryOp::Mul, Val::Num(a), Val::Num(b)) => Ok(Val::Num(a * b)),
        (BinaryOp::Div | BinaryOp::Mod, Val::Num(_), Val::Num(b)) if b == 0.0 => Err(
            Failure::throw(errors::DIVISION_BY_ZERO, "division by zero"),
        ),
        (BinaryOp::Div, Val::Num(a), Val::Num(b)) => Ok(Val::Num(a / b)),
        (BinaryOp::Mod, Val::Num(a), Val::Num(b)) => Ok(Val::Num(a % b)),
        (BinaryOp::Lt, Val::Num(a), Val::Num(b)) => Ok(Val::Bool(a < b)),
        (BinaryOp::Lte, Val::Num(a), Val::Num(b)) => Ok(Val::Bool(a <= b)),
        (BinaryOp::Gt, Val::Num(a), Val::Num(b)) => Ok(Val::Bool(a > b)),
        (BinaryOp::Gte, Val::Num(a), Val::Num(b)) => Ok(Val::Bool(a >= b)),
        (BinaryOp::Lt, Val::Str(a), Val::Str(b)) => Ok(Val::Bool(a < b)),
        (BinaryOp::Lte, Val::Str(a), Val::Str(b)) => Ok(Val::Bool(a <= b)),
        (BinaryOp::Gt, Val::Str(a), Val::Str(b)) => Ok(Val::Bool(a > b)),
        (BinaryOp::Gte, Val::Str(a), Val::Str(b)) => Ok(Val::Bool(a >= b)),
        (op, l, r) => Err(Failure::throw(
            errors::TYPE_ERROR,
            format!(
                "Unsupported operand types for {}: {} and {}",
                op.symbol(),
                l.type_name(),
                r.type_name()
            ),
        )),
    }
}
