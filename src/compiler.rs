//! Compiling console input into re-invocable units of work
//!
//! [`compile`] classifies buffered source as needing more input, invalid, or
//! ready. A ready unit is bound to a [`Context`] as a [`BoundUnit`], which can
//! be invoked any number of times; every invocation runs against the same
//! namespace, so a unit replayed after a package install sees the bindings
//! made since it first ran.

use futures::future::{FutureExt, LocalBoxFuture};
use std::fmt;
use std::rc::Rc;

use crate::executor::types::{Span, Stmt};
use crate::executor::{run_statements, Context, Failure, Val};
use crate::parser::{self, ParseError};
use crate::task::{Resume, Task};

/* ===================== Modes & Flags ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileMode {
    /// One interactive statement: top-level expression values are echoed
    Single,
    /// A block or file: statements run silently, committed in one run
    Exec,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CompileFlags {
    /// Permit `await` outside any async construct (typed-in statements)
    pub allow_top_level_await: bool,
}

impl CompileFlags {
    pub fn interactive() -> Self {
        Self {
            allow_top_level_await: true,
        }
    }
}

/* ===================== Outcomes ===================== */

#[derive(Debug)]
pub struct CompiledUnit {
    pub filename: String,
    pub mode: CompileMode,
    pub body: Vec<Stmt>,
    /// Whether running the unit can suspend
    pub has_await: bool,
}

#[derive(Debug)]
pub enum Compiled {
    /// The source stops inside an open construct
    Incomplete,
    Invalid(SyntaxFailure),
    Ready(CompiledUnit),
}

/// A syntax error located in the submitted source
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxFailure {
    pub filename: String,
    pub message: String,
    /// 1-based line
    pub line: Option<usize>,
    /// 0-based column
    pub col: Option<usize>,
    /// The offending source line
    pub text: Option<String>,
}

impl SyntaxFailure {
    fn new(message: impl Into<String>, span: Option<Span>, filename: &str, source: &str) -> Self {
        let line = span.map(|s| s.start_line);
        Self {
            filename: filename.to_string(),
            message: message.into(),
            line: line.map(|l| l + 1),
            col: span.map(|s| s.start_col),
            text: line.and_then(|l| source.lines().nth(l)).map(str::to_string),
        }
    }

    fn from_parse(err: ParseError, filename: &str, source: &str) -> Self {
        Self::new(err.message(), err.span(), filename, source)
    }
}

impl fmt::Display for SyntaxFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => writeln!(f, "  File \"{}\", line {}", self.filename, line)?,
            None => writeln!(f, "  File \"{}\"", self.filename)?,
        }
        if let Some(text) = &self.text {
            writeln!(f, "    {}", text)?;
            if let Some(col) = self.col {
                writeln!(f, "    {}^", " ".repeat(col))?;
            }
        }
        write!(f, "SyntaxError: {}", self.message)
    }
}

impl std::error::Error for SyntaxFailure {}

/* ===================== Compilation ===================== */

/// Compile `source`, deciding whether it is complete
pub fn compile(source: &str, filename: &str, mode: CompileMode, flags: CompileFlags) -> Compiled {
    let body = match parser::parse_program(source) {
        Ok(body) => body,
        Err(_) if parser::has_open_delimiters(source) => return Compiled::Incomplete,
        Err(err) => return Compiled::Invalid(SyntaxFailure::from_parse(err, filename, source)),
    };

    for stmt in &body {
        if let Err((message, span)) = validate(stmt, false) {
            return Compiled::Invalid(SyntaxFailure::new(message, Some(span), filename, source));
        }
    }

    let has_await = body.iter().any(Stmt::contains_await);
    if has_await && !flags.allow_top_level_await {
        let span = body
            .iter()
            .find(|stmt| stmt.contains_await())
            .map(Stmt::span);
        return Compiled::Invalid(SyntaxFailure::new(
            "'await' outside async context",
            span,
            filename,
            source,
        ));
    }

    Compiled::Ready(CompiledUnit {
        filename: filename.to_string(),
        mode,
        body,
        has_await,
    })
}

/// Reject `break`/`continue` outside a loop
fn validate(stmt: &Stmt, in_loop: bool) -> Result<(), (String, Span)> {
    match stmt {
        Stmt::Break { span } if !in_loop => Err(("'break' outside loop".to_string(), *span)),
        Stmt::Continue { span } if !in_loop => {
            Err(("'continue' not properly in loop".to_string(), *span))
        }
        Stmt::Block { body, .. } => body.iter().try_for_each(|s| validate(s, in_loop)),
        Stmt::If { then_s, else_s, .. } => {
            validate(then_s, in_loop)?;
            match else_s {
                Some(else_s) => validate(else_s, in_loop),
                None => Ok(()),
            }
        }
        Stmt::While { body, .. } | Stmt::ForLoop { body, .. } => validate(body, true),
        Stmt::Try {
            body, catch_body, ..
        } => {
            validate(body, in_loop)?;
            validate(catch_body, in_loop)
        }
        _ => Ok(()),
    }
}

/* ===================== Bound Units ===================== */

/// A compiled unit closed over the namespace it runs against
#[derive(Clone)]
pub struct BoundUnit {
    unit: Rc<CompiledUnit>,
    ctx: Context,
}

/// Result of driving a unit without yielding to the scheduler
pub enum Invocation {
    Complete(Result<Val, Failure>),
    /// The unit suspended; the future continues where it stopped
    Suspended(LocalBoxFuture<'static, Result<Val, Failure>>),
}

impl BoundUnit {
    pub fn new(unit: impl Into<Rc<CompiledUnit>>, ctx: Context) -> Self {
        Self {
            unit: unit.into(),
            ctx,
        }
    }

    pub fn unit(&self) -> &CompiledUnit {
        &self.unit
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Awaitable units may suspend and must be driven by the scheduler
    pub fn is_awaitable(&self) -> bool {
        self.unit.has_await
    }

    /// Start a fresh run of the unit
    pub fn invoke(&self) -> LocalBoxFuture<'static, Result<Val, Failure>> {
        let unit = Rc::clone(&self.unit);
        let ctx = self.ctx.clone();
        Box::pin(async move {
            let echo = unit.mode == CompileMode::Single;
            run_statements(&unit.body, ctx, echo).await
        })
    }

    /// Run the unit synchronously, as far as it gets without suspending
    pub fn invoke_now(&self) -> Invocation {
        let mut run = self.invoke();
        match (&mut run).now_or_never() {
            Some(result) => Invocation::Complete(result),
            None => Invocation::Suspended(run),
        }
    }

    /// The unit as a pending task for the console
    pub fn into_task(self) -> Task {
        Box::pin(async move {
            self.invoke().await?;
            Ok(Resume::Noop)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(source: &str) -> Compiled {
        compile(source, "<stdin>", CompileMode::Single, CompileFlags::interactive())
    }

    #[test]
    fn test_open_block_is_incomplete() {
        assert!(matches!(single("if (true) {"), Compiled::Incomplete));
        assert!(matches!(single("x = [1,"), Compiled::Incomplete));
        assert!(matches!(
            compile("if (true) {\n  x = 5", "<stdin>", CompileMode::Exec, CompileFlags::interactive()),
            Compiled::Incomplete
        ));
    }

    #[test]
    fn test_closed_block_is_ready() {
        let Compiled::Ready(unit) = compile(
            "if (true) {\n  x = 5\n}",
            "<stdin>",
            CompileMode::Exec,
            CompileFlags::interactive(),
        ) else {
            unreachable!("expected a ready unit");
        };
        assert_eq!(unit.body.len(), 1);
        assert_eq!(unit.mode, CompileMode::Exec);
        assert!(!unit.has_await);
    }

    fn exec(source: &str) -> Compiled {
        compile(source, "<stdin>", CompileMode::Exec, CompileFlags::interactive())
    }

    #[test]
    fn test_statements_on_separate_lines_are_ready() {
        for source in [
            "let a = 1\nlet b = 2",
            "import time\nx = 1\n",
            "if (true) {\n  import time\n  x = 1\n}",
            "let a = 1 // first\nlet b = a + 1",
        ] {
            assert!(
                matches!(exec(source), Compiled::Ready(ref unit) if !unit.body.is_empty()),
                "{:?} should compile",
                source
            );
        }
    }

    #[test]
    fn test_string_continuation_is_incomplete() {
        assert!(matches!(single("x = \"abc\\"), Compiled::Incomplete));
        assert!(matches!(exec("x = \"abc\\\ndef\""), Compiled::Ready(_)));
        assert!(matches!(single("x = \"abc"), Compiled::Invalid(_)));
        assert!(matches!(exec("x = \"abc\ndef\""), Compiled::Invalid(_)));
    }

    #[test]
    fn test_shell_lines_are_invalid() {
        for line in ["unknowncmd foo", "cd ..", "ls; pwd", "x = )", "echo it's"] {
            assert!(
                matches!(single(line), Compiled::Invalid(_)),
                "{} should be invalid",
                line
            );
        }
    }

    #[test]
    fn test_syntax_failure_points_at_offending_token() {
        let Compiled::Invalid(failure) = single("unknowncmd foo") else {
            unreachable!("expected invalid source");
        };
        assert_eq!(failure.line, Some(1));
        assert_eq!(failure.col, Some(11));
        let rendered = failure.to_string();
        assert!(rendered.starts_with("  File \"<stdin>\", line 1\n    unknowncmd foo\n"));
        assert!(rendered.contains("SyntaxError: "));
    }

    #[test]
    fn test_await_requires_flag() {
        let source = "await time.sleep(1)";
        assert!(matches!(single(source), Compiled::Ready(ref unit) if unit.has_await));
        assert!(matches!(
            compile(source, "m.flow", CompileMode::Exec, CompileFlags::default()),
            Compiled::Invalid(_)
        ));
    }

    #[test]
    fn test_break_outside_loop_is_invalid() {
        assert!(matches!(single("break"), Compiled::Invalid(_)));
        assert!(matches!(
            single("while (false) { break }"),
            Compiled::Ready(_)
        ));
    }

    #[test]
    fn test_blank_input_is_an_empty_unit() {
        let Compiled::Ready(unit) = single("") else {
            unreachable!("blank input compiles");
        };
        assert!(unit.body.is_empty());
    }
}
