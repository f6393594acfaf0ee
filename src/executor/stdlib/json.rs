//! json module functions, backed by serde_json

use std::collections::BTreeMap;

use super::expect_arg_count;
use crate::executor::errors::{self, Failure};
use crate::executor::types::Val;

/// json.dumps(value) - serialize to a JSON string
pub fn dumps(args: &[Val]) -> Result<Val, Failure> {
    expect_arg_count(args, 1, "dumps")?;
    let json = to_json(&args[0])?;
    serde_json::to_string(&json)
        .map(Val::Str)
        .map_err(|e| Failure::throw(errors::INTERNAL_ERROR, e.to_string()))
}

/// json.loads(text) - parse a JSON string
pub fn loads(args: &[Val]) -> Result<Val, Failure> {
    expect_arg_count(args, 1, "loads")?;
    let Val::Str(text) = &args[0] else {
        return Err(Failure::throw(
            errors::WRONG_ARG_TYPE,
            format!("loads() argument must be a string, got {}", args[0].type_name()),
        ));
    };
    let json: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| Failure::throw(errors::TYPE_ERROR, format!("invalid JSON: {}", e)))?;
    Ok(from_json(json))
}

pub(crate) fn to_json(value: &Val) -> Result<serde_json::Value, Failure> {
    Ok(match value {
        Val::Null => serde_json::Value::Null,
        Val::Bool(b) => serde_json::Value::Bool(*b),
        Val::Num(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Val::Str(s) => serde_json::Value::String(s.clone()),
        Val::List(items) => {
            serde_json::Value::Array(items.iter().map(to_json).collect::<Result<_, _>>()?)
        }
        Val::Obj(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), to_json(v)?)))
                .collect::<Result<_, Failure>>()?,
        ),
        Val::Error(err) => serde_json::json!({ "code": err.code, "message": err.message }),
        other => {
            return Err(Failure::throw(
                errors::TYPE_ERROR,
                format!("Object of type {} is not JSON serializable", other.type_name()),
            ))
        }
    })
}

pub(crate) fn from_json(json: serde_json::Value) -> Val {
    match json {
        serde_json::Value::Null => Val::Null,
        serde_json::Value::Bool(b) => Val::Bool(b),
        serde_json::Value::Number(n) => Val::Num(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Val::Str(s),
        serde_json::Value::Array(items) => Val::List(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => Val::Obj(
            map.into_iter()
                .map(|(k, v)| (k, from_json(v)))
                .collect::<BTreeMap<_, _>>(),
        ),
    }
}
