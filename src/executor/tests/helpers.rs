//! Test helpers for executor tests
//!
//! Common utilities for running Flow source against a fresh context

use std::fs;
use tempfile::TempDir;

use crate::executor::{run_statements, Context, Failure, SessionState, Val};
use crate::io::{Captured, Output};
use crate::modules::{ModuleLoader, SearchPath};
use crate::parser;

/// A context over an empty search path, with captured output
pub struct Harness {
    pub ctx: Context,
    pub out: Captured,
    /// Holds the module directory alive for the test's duration
    _dir: Option<TempDir>,
}

impl Harness {
    pub fn new() -> Self {
        let (stdout, out) = Output::capture();
        let loader = ModuleLoader::new(SearchPath::new(Vec::new()));
        Self {
            ctx: Context::new(loader, stdout, SessionState::new()),
            out,
            _dir: None,
        }
    }

    /// A harness whose search path holds `files` as `<name>` -> source
    pub fn with_modules(files: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        for (path, source) in files {
            let target = dir.path().join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).expect("module dir");
            }
            fs::write(target, source).expect("module file");
        }

        let (stdout, out) = Output::capture();
        let loader = ModuleLoader::new(SearchPath::new(vec![dir.path().to_path_buf()]));
        Self {
            ctx: Context::new(loader, stdout, SessionState::new()),
            out,
            _dir: Some(dir),
        }
    }

    /// Parse and run `source` against this harness's namespace
    pub async fn run(&self, source: &str) -> Result<Val, Failure> {
        let body = parser::parse_program(source).expect("Parse failed");
        run_statements(&body, self.ctx.clone(), false).await
    }

    pub fn get(&self, name: &str) -> Option<Val> {
        self.ctx.globals.get(name)
    }
}

/// Run `source` in a fresh harness and return its result
pub async fn eval(source: &str) -> Result<Val, Failure> {
    Harness::new().run(source).await
}

/// The error code of a thrown failure
pub fn error_code(result: Result<Val, Failure>) -> String {
    match result {
        Err(Failure::Throw { error, .. }) => error.code,
        other => panic!("Expected a thrown error, got {:?}", other),
    }
}
