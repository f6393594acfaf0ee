//! Execution context: the persistent namespace and session-scoped flags

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use super::types::{Val, VarKind};
use crate::io::Output;
use crate::modules::ModuleLoader;

/* ===================== Namespace ===================== */

#[derive(Default)]
struct NamespaceInner {
    vars: BTreeMap<String, Val>,
    consts: HashSet<String>,
}

/// Name -> value bindings shared by every unit run against them.
///
/// Cloning yields another handle to the same bindings.
#[derive(Clone, Default)]
pub struct Namespace {
    inner: Rc<RefCell<NamespaceInner>>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Val> {
        self.inner.borrow().vars.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.borrow().vars.contains_key(name)
    }

    /// Bind a name, replacing any earlier declaration (console redeclaration is allowed)
    pub fn declare(&self, name: &str, value: Val, kind: VarKind) {
        let mut inner = self.inner.borrow_mut();
        match kind {
            VarKind::Const => inner.consts.insert(name.to_string()),
            VarKind::Let => inner.consts.remove(name),
        };
        inner.vars.insert(name.to_string(), value);
    }

    /// Plain assignment; returns false when the name is a constant
    pub fn assign(&self, name: &str, value: Val) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.consts.contains(name) {
            return false;
        }
        inner.vars.insert(name.to_string(), value);
        true
    }

    /// Overwrite a value in place; constness is unchanged (`const o = {}` then `o.x = 1`)
    pub fn replace(&self, name: &str, value: Val) {
        self.inner.borrow_mut().vars.insert(name.to_string(), value);
    }

    /// Set a binding unconditionally (imports, builtin module members)
    pub fn set(&self, name: &str, value: Val) {
        let mut inner = self.inner.borrow_mut();
        inner.consts.remove(name);
        inner.vars.insert(name.to_string(), value);
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.borrow().vars.keys().cloned().collect()
    }

    /// Copy of every binding, for inspection
    pub fn snapshot(&self) -> BTreeMap<String, Val> {
        self.inner.borrow().vars.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/* ===================== Session State ===================== */

/// Flags shared by every component of one console session
#[derive(Clone, Default)]
pub struct SessionState {
    exit_requested: Rc<Cell<bool>>,
    interrupt_pending: Rc<Cell<bool>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_exit(&self) {
        self.exit_requested.set(true);
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested.get()
    }

    pub fn interrupt(&self) {
        self.interrupt_pending.set(true);
    }

    /// Consume a pending interrupt
    pub fn take_interrupt(&self) -> bool {
        self.interrupt_pending.replace(false)
    }

    pub fn clear_interrupt(&self) {
        self.interrupt_pending.set(false);
    }
}

/* ===================== Context ===================== */

/// Everything a running unit can reach
#[derive(Clone)]
pub struct Context {
    pub globals: Namespace,
    pub loader: Rc<ModuleLoader>,
    pub stdout: Output,
    pub session: SessionState,
}

impl Context {
    pub fn new(loader: Rc<ModuleLoader>, stdout: Output, session: SessionState) -> Self {
        Self {
            globals: Namespace::new(),
            loader,
            stdout,
            session,
        }
    }

    /// Same loader, output and session over a fresh namespace (module bodies)
    pub fn with_globals(&self, globals: Namespace) -> Self {
        Self {
            globals,
            loader: Rc::clone(&self.loader),
            stdout: self.stdout.clone(),
            session: self.session.clone(),
        }
    }
}
