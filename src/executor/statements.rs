//! Statement execution

use futures::future::LocalBoxFuture;
use std::collections::BTreeMap;

use super::errors::{self, Failure};
use super::types::{Binding, ForLoopKind, PathSegment, Stmt, Val, VarKind};
use super::{Flow, Frame, Scope};

impl Frame {
    pub(crate) fn exec<'a>(&'a mut self, stmt: &'a Stmt) -> LocalBoxFuture<'a, Result<Flow, Failure>> {
        Box::pin(async move {
            let line = stmt.span().line();
            self.exec_inner(stmt)
                .await
                .map_err(|failure| failure.at_line(line))
        })
    }

    async fn exec_inner(&mut self, stmt: &Stmt) -> Result<Flow, Failure> {
        match stmt {
            Stmt::Block { body, .. } => {
                self.scopes.push(Scope::default());
                let result = self.exec_body(body).await;
                self.scopes.pop();
                result
            }
            Stmt::Declare {
                var_kind,
                target,
                init,
                ..
            } => {
                let value = match init {
                    Some(expr) => self.eval(expr).await?,
                    None => Val::Null,
                };
                self.exec_declare(*var_kind, target, value)?;
                Ok(Flow::Next)
            }
            Stmt::Assign {
                var, path, value, ..
            } => {
                let value = self.eval(value).await?;
                self.exec_assign(var, path, value).await?;
                Ok(Flow::Next)
            }
            Stmt::If {
                test,
                then_s,
                else_s,
                ..
            } => {
                if self.eval(test).await?.is_truthy() {
                    self.exec(then_s).await
                } else if let Some(else_s) = else_s {
                    self.exec(else_s).await
                } else {
                    Ok(Flow::Next)
                }
            }
            Stmt::While { test, body, .. } => {
                loop {
                    self.check_interrupt()?;
                    if !self.eval(test).await?.is_truthy() {
                        break;
                    }
                    match self.exec(body).await? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Next | Flow::Continue => {}
                    }
                }
                Ok(Flow::Next)
            }
            Stmt::ForLoop {
                kind,
                binding,
                iterable,
                body,
                ..
            } => {
                let iterable = self.eval(iterable).await?;
                let items = iteration_items(*kind, iterable)?;

                for item in items {
                    self.check_interrupt()?;
                    let mut scope = Scope::default();
                    scope.vars.insert(binding.clone(), item);
                    self.scopes.push(scope);
                    let flow = self.exec(body).await;
                    self.scopes.pop();

                    match flow? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Next | Flow::Continue => {}
                    }
                }
                Ok(Flow::Next)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval(expr).await?,
                    None => Val::Null,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Try {
                body,
                catch_var,
                catch_body,
                ..
            } => {
                let depth = self.scopes.len();
                match self.exec(body).await {
                    Ok(flow) => Ok(flow),
                    Err(failure) if failure.is_fatal() => Err(failure),
                    Err(failure) => {
                        self.scopes.truncate(depth);
                        let mut scope = Scope::default();
                        scope
                            .vars
                            .insert(catch_var.clone(), Val::Error(failure.to_error_info()));
                        self.scopes.push(scope);
                        let flow = self.exec(catch_body).await;
                        self.scopes.pop();
                        flow
                    }
                }
            }
            Stmt::Import { module, alias, .. } => {
                let loaded = self.ctx.loader.import(module, &self.ctx).await?;
                let name = alias.as_deref().unwrap_or(module);
                self.bind(name, Val::Module(loaded), VarKind::Let);
                Ok(Flow::Next)
            }
            Stmt::FromImport { module, names, .. } => {
                let loaded = self.ctx.loader.import(module, &self.ctx).await?;
                for import in names {
                    let value = loaded.namespace().get(&import.name).ok_or_else(|| {
                        Failure::throw(
                            errors::IMPORT_ERROR,
                            format!("cannot import name '{}' from '{}'", import.name, module),
                        )
                        .at_line(import.span.line())
                    })?;
                    self.bind(&import.name, value, VarKind::Let);
                }
                Ok(Flow::Next)
            }
            Stmt::Expr { expr, .. } => {
                self.eval(expr).await?;
                Ok(Flow::Next)
            }
            Stmt::Break { .. } => Ok(Flow::Break),
            Stmt::Continue { .. } => Ok(Flow::Continue),
        }
    }

    async fn exec_body(&mut self, body: &[Stmt]) -> Result<Flow, Failure> {
        for stmt in body {
            match self.exec(stmt).await? {
                Flow::Next => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Next)
    }

    fn check_interrupt(&self) -> Result<(), Failure> {
        if self.ctx.session.take_interrupt() {
            return Err(Failure::Interrupted);
        }
        Ok(())
    }

    /* ===================== Bindings ===================== */

    /// Declare in the innermost block scope, or the namespace at top level
    fn bind(&mut self, name: &str, value: Val, kind: VarKind) {
        match self.scopes.last_mut() {
            Some(scope) => {
                if kind == VarKind::Const {
                    scope.consts.insert(name.to_string());
                } else {
                    scope.consts.remove(name);
                }
                scope.vars.insert(name.to_string(), value);
            }
            None => self.ctx.globals.declare(name, value, kind),
        }
    }

    fn exec_declare(&mut self, kind: VarKind, target: &Binding, value: Val) -> Result<(), Failure> {
        match target {
            Binding::Name(name) => {
                self.bind(name, value, kind);
                Ok(())
            }
            Binding::Fields(names) => {
                let fields: BTreeMap<String, Val> = match value {
                    Val::Obj(map) => map,
                    Val::Module(module) => module.namespace().snapshot(),
                    other => {
                        return Err(Failure::throw(
                            errors::TYPE_ERROR,
                            format!("Cannot destructure {}", other.type_name()),
                        ))
                    }
                };
                for name in names {
                    let value = fields.get(name).cloned().unwrap_or(Val::Null);
                    self.bind(name, value, kind);
                }
                Ok(())
            }
        }
    }

    /// Plain `name = value`: updates the nearest binding, else creates a global
    fn assign_name(&mut self, name: &str, value: Val) -> Result<(), Failure> {
        for scope in self.scopes.iter_mut().rev() {
            if scope.vars.contains_key(name) {
                if scope.consts.contains(name) {
                    return Err(const_error(name));
                }
                scope.vars.insert(name.to_string(), value);
                return Ok(());
            }
        }

        if self.ctx.globals.assign(name, value) {
            Ok(())
        } else {
            Err(const_error(name))
        }
    }

    async fn exec_assign(&mut self, var: &str, path: &[PathSegment], value: Val) -> Result<(), Failure> {
        if path.is_empty() {
            return self.assign_name(var, value);
        }

        let mut keys = Vec::with_capacity(path.len());
        for segment in path {
            let key = match segment {
                PathSegment::Field(field) => Val::Str(field.clone()),
                PathSegment::Index(expr) => self.eval(expr).await?,
            };
            keys.push(key);
        }

        let mut root = self.lookup(var)?;
        set_path(&mut root, &keys, value)?;
        // Containers are values; write the updated root back over the binding
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.vars.get_mut(var) {
                *slot = root;
                return Ok(());
            }
        }
        self.ctx.globals.replace(var, root);
        Ok(())
    }
}

fn const_error(name: &str) -> Failure {
    Failure::throw(
        errors::TYPE_ERROR,
        format!("Assignment to constant variable '{}'", name),
    )
}

fn set_path(target: &mut Val, keys: &[Val], value: Val) -> Result<(), Failure> {
    let Some((key, rest)) = keys.split_first() else {
        *target = value;
        return Ok(());
    };

    match (target, key) {
        (Val::Obj(map), Val::Str(k)) => {
            if rest.is_empty() {
                map.insert(k.clone(), value);
                Ok(())
            } else {
                let child = map.get_mut(k).ok_or_else(|| {
                    Failure::throw(
                        errors::PROPERTY_NOT_FOUND,
                        format!("Property '{}' not found", k),
                    )
                })?;
                set_path(child, rest, value)
            }
        }
        (Val::List(items), Val::Num(n)) => {
            let len = items.len();
            let slot = list_index(*n, len).and_then(|i| items.get_mut(i)).ok_or_else(|| {
                Failure::throw(
                    errors::TYPE_ERROR,
                    format!("Index {} out of range for list of length {}", n, len),
                )
            })?;
            set_path(slot, rest, value)
        }
        (target, key) => Err(Failure::throw(
            errors::TYPE_ERROR,
            format!(
                "Cannot set {} on {}",
                key.repr(),
                target.type_name()
            ),
        )),
    }
}

/// Non-negative integral index within bounds
pub(crate) fn list_index(n: f64, len: usize) -> Option<usize> {
    if n.fract() != 0.0 || n < 0.0 {
        return None;
    }
    let i = n as usize;
    (i < len).then_some(i)
}

fn iteration_items(kind: ForLoopKind, iterable: Val) -> Result<Vec<Val>, Failure> {
    match (kind, iterable) {
        (ForLoopKind::Of, Val::List(items)) => Ok(items),
        (ForLoopKind::Of, Val::Str(s)) => Ok(s.chars().map(|c| Val::Str(c.to_string())).collect()),
        (ForLoopKind::In, Val::Obj(map)) => Ok(map.into_keys().map(Val::Str).collect()),
        (ForLoopKind::In, Val::List(items)) => {
            Ok((0..items.len()).map(|i| Val::Num(i as f64)).collect())
        }
        (ForLoopKind::In, Val::Module(module)) => {
            Ok(module.namespace().names().into_iter().map(Val::Str).collect())
        }
        (kind, other) => Err(Failure::throw(
            errors::TYPE_ERROR,
            format!(
                "Cannot iterate {} with for...{}",
                other.type_name(),
                if kind == ForLoopKind::Of { "of" } else { "in" }
            ),
        )),
    }
}
