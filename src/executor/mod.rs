//! Async tree-walking executor for Flow
//!
//! Units run against a [`Context`] whose namespace outlives them, so
//! bindings made by one console statement are visible to the next. The
//! evaluator only suspends at `await`, which is what makes a typed-in
//! statement cooperative with the rest of the session.

pub mod context;
pub mod errors;
mod expressions;
mod statements;
pub mod stdlib;
pub mod types;

#[cfg(test)]
mod tests;

pub use context::{Context, Namespace, SessionState};
pub use errors::{ErrorInfo, Failure};
pub use types::{Promise, Val};

use std::collections::{BTreeMap, HashSet};

use types::Stmt;

/// Non-local control flow out of a statement
#[derive(Debug)]
pub(crate) enum Flow {
    Next,
    Break,
    Continue,
    Return(Val),
}

/// Block-local bindings
#[derive(Default)]
pub(crate) struct Scope {
    vars: BTreeMap<String, Val>,
    consts: HashSet<String>,
}

/// State of one running unit: the shared context plus its block scopes
pub(crate) struct Frame {
    ctx: Context,
    scopes: Vec<Scope>,
    /// Echo top-level expression values (interactive single-statement mode)
    echo: bool,
}

/// Run top-level statements against `ctx`.
///
/// Returns the value of a top-level `return`, or `null`.
pub async fn run_statements(body: &[Stmt], ctx: Context, echo: bool) -> Result<Val, Failure> {
    let mut frame = Frame {
        ctx,
        scopes: Vec::new(),
        echo,
    };

    for stmt in body {
        if frame.echo {
            if let Stmt::Expr { expr, span } = stmt {
                let value = frame
                    .eval(expr)
                    .await
                    .map_err(|failure| failure.at_line(span.line()))?;
                if value != Val::Null {
                    frame.ctx.stdout.line(value.repr());
                }
                continue;
            }
        }

        match frame.exec(stmt).await? {
            Flow::Return(value) => return Ok(value),
            Flow::Next | Flow::Break | Flow::Continue => {}
        }
    }

    Ok(Val::Null)
}
