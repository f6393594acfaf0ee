//! The interactive console
//!
//! Each input cycle reads one line, buffers it until it forms a complete
//! statement, runs it against the session namespace and then drives any
//! pending work to completion before the next prompt:
//!
//! ```text
//! Idle -> ReadingLine -> Buffering/Compiling -> Executing -> AwaitingResume -> Idle
//!              |
//!              +-- end of input --> Terminal
//! ```
//!
//! A statement that fails on a missing module is handed to the
//! [`Resolver`]; its task becomes the cycle's pending work, so the statement
//! is replayed after the install without the user typing it again.

mod builder;
mod input;


pub use builder::ConsoleBuilder;
pub use input::{LineSource, ReadLine, ScriptedInput, StdinLines};

use std::rc::Rc;
use thiserror::Error;
use tracing::debug;

use crate::compiler::{compile, BoundUnit, CompileFlags, CompileMode, Compiled, CompiledUnit, Invocation};
use crate::executor::{Context, Failure, Namespace, SessionState};
use crate::io::Streams;
use crate::resolver::{ResolutionRequest, Resolver};
use crate::shell::{self, Shell};
use crate::task::{Resume, Task};

pub const FAREWELL: &str = "now exiting Console...";
const STDIN: &str = "<stdin>";

/// Ends a console session
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("exit({0})")]
    Exit(i32),

    #[error("KeyboardInterrupt")]
    Interrupted,

    #[error("console input failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ConsoleError {
    /// Process exit status for this ending
    pub fn exit_code(&self) -> i32 {
        match self {
            ConsoleError::Exit(code) => *code,
            ConsoleError::Interrupted => 130,
            ConsoleError::Io(_) => 1,
        }
    }
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompts {
    pub ps1: String,
    pub ps2: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            ps1: ">>> ".to_string(),
            ps2: "... ".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleState {
    Idle,
    ReadingLine,
    Buffering,
    Compiling,
    Executing,
    AwaitingResume,
    Terminal,
}

pub struct Console {
    ctx: Context,
    streams: Streams,
    prompts: Prompts,
    buffer: Vec<String>,
    one_liner: bool,
    pending: Option<Task>,
    last_result: Option<Resume>,
    resolver: Option<Rc<Resolver>>,
    shell: Option<Rc<dyn Shell>>,
    state: ConsoleState,
    filename: String,
}

impl Console {
    /// A bare console: no resolver, no shell
    pub fn new(ctx: Context, streams: Streams) -> Self {
        Self {
            ctx,
            streams,
            prompts: Prompts::default(),
            buffer: Vec::new(),
            one_liner: true,
            pending: None,
            last_result: None,
            resolver: None,
            shell: None,
            state: ConsoleState::Idle,
            filename: STDIN.to_string(),
        }
    }

    pub fn builder() -> ConsoleBuilder {
        ConsoleBuilder::new()
    }

    pub fn namespace(&self) -> &Namespace {
        &self.ctx.globals
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn session(&self) -> &SessionState {
        &self.ctx.session
    }

    pub fn resolver(&self) -> Option<&Rc<Resolver>> {
        self.resolver.as_ref()
    }

    pub fn state(&self) -> ConsoleState {
        self.state
    }

    /// Secondary prompt while a block is open
    pub fn prompt(&self) -> &str {
        if self.buffer.is_empty() {
            &self.prompts.ps1
        } else {
            &self.prompts.ps2
        }
    }

    /// How many failures have been written to the error stream
    pub fn errors_reported(&self) -> usize {
        self.streams.reported()
    }

    pub fn banner(&self) -> String {
        format!(
            "Rhythm console {}\nType \"help\" for shell commands.",
            env!("CARGO_PKG_VERSION")
        )
    }

    fn set_state(&mut self, state: ConsoleState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "console transition");
            self.state = state;
        }
    }

    /* ===================== Input Cycle ===================== */

    /// Buffer one line and run the buffer if it is complete.
    ///
    /// Returns true when more input is needed. Only `exit()` and interrupts
    /// come back as errors; everything else is reported and swallowed.
    pub fn push(&mut self, line: &str) -> ConsoleResult<bool> {
        if self.buffer.is_empty() {
            self.pending = None;
            self.last_result = None;
        }
        self.set_state(ConsoleState::Buffering);
        self.buffer.push(line.to_string());

        let source = self.buffer.join("\n");
        let result = self.runsource(&source, line);
        let more = matches!(result, Ok(true));
        if !more {
            self.buffer.clear();
        }
        result
    }

    /// Discard a half-typed block
    pub fn reset_buffer(&mut self) {
        self.buffer.clear();
        self.one_liner = true;
        self.set_state(ConsoleState::Idle);
    }

    fn runsource(&mut self, source: &str, line: &str) -> ConsoleResult<bool> {
        self.set_state(ConsoleState::Compiling);
        let mode = if self.buffer.len() == 1 {
            CompileMode::Single
        } else {
            CompileMode::Exec
        };

        match compile(source, &self.filename, mode, CompileFlags::interactive()) {
            Compiled::Incomplete => {
                self.one_liner = false;
                self.set_state(ConsoleState::Buffering);
                Ok(true)
            }
            Compiled::Invalid(syntax) => {
                if !(self.one_liner && self.try_shell(line)) {
                    self.report(syntax.to_string());
                }
                self.one_liner = true;
                Ok(false)
            }
            Compiled::Ready(unit) => {
                self.runcode(unit, line)?;
                Ok(false)
            }
        }
    }

    fn runcode(&mut self, unit: CompiledUnit, line: &str) -> ConsoleResult<()> {
        self.set_state(ConsoleState::Executing);
        self.ctx.session.clear_interrupt();
        let bound = BoundUnit::new(unit, self.ctx.clone());

        // Awaitable units run here too, up to their first suspension, so a
        // missing module raised before it is still trapped
        let outcome = match bound.invoke_now() {
            Invocation::Complete(Ok(_)) => {
                self.last_result = None;
                Ok(())
            }
            Invocation::Complete(Err(failure)) => self.trap(failure, bound, line),
            Invocation::Suspended(rest) => {
                self.last_result = Some(Resume::Awaitable(Box::pin(async move {
                    rest.await?;
                    Ok(Resume::Noop)
                })));
                Ok(())
            }
        };

        self.one_liner = true;
        outcome
    }

    /// Decide what a synchronous failure turns into
    fn trap(&mut self, failure: Failure, bound: BoundUnit, line: &str) -> ConsoleResult<()> {
        match failure {
            Failure::Exit(code) => Err(ConsoleError::Exit(code)),
            Failure::Interrupted => Err(ConsoleError::Interrupted),
            Failure::MissingModule { ref name, .. } if self.resolver.is_some() => {
                debug!(module = %name, "trapped missing module");
                let request = ResolutionRequest::new(name.clone(), failure.clone(), Some(bound));
                self.pending = self
                    .resolver
                    .as_ref()
                    .map(|resolver| resolver.resolve_task(request));
                Ok(())
            }
            failure => {
                if !(self.one_liner && self.try_shell(line)) {
                    self.report(failure.traceback(&self.filename));
                }
                Ok(())
            }
        }
    }

    fn try_shell(&mut self, line: &str) -> bool {
        let Some(shell) = self.shell.clone() else {
            return false;
        };
        shell::dispatch(shell.as_ref(), line, &[], &self.streams, &mut self.pending)
    }

    fn report(&mut self, message: String) {
        self.streams.report(message);
    }

    fn report_failure(&mut self, failure: Failure) -> ConsoleResult<()> {
        match failure {
            Failure::Exit(code) => Err(ConsoleError::Exit(code)),
            Failure::Interrupted => Err(ConsoleError::Interrupted),
            failure => {
                let traceback = failure.traceback(&self.filename);
                self.report(traceback);
                Ok(())
            }
        }
    }

    /// Drive the pending task and any awaitable it leaves behind
    pub async fn await_resume(&mut self) -> ConsoleResult<()> {
        self.set_state(ConsoleState::AwaitingResume);

        if let Some(task) = self.pending.take() {
            match task.await {
                Ok(resume) => self.last_result = Some(resume),
                Err(failure) => self.report_failure(failure)?,
            }
        }

        while let Some(Resume::Awaitable(task)) = self.last_result.take() {
            match task.await {
                Ok(resume) => self.last_result = Some(resume),
                Err(failure) => self.report_failure(failure)?,
            }
        }

        self.set_state(ConsoleState::Idle);
        Ok(())
    }

    /// One line of input through a whole cycle
    pub async fn feed(&mut self, line: &str) -> ConsoleResult<bool> {
        let more = self.push(line)?;
        if !more {
            self.await_resume().await?;
        }
        Ok(more)
    }

    /// Run a whole file as one unit through the same trap path
    pub async fn run_source(&mut self, source: &str, filename: &str) -> ConsoleResult<()> {
        let previous = std::mem::replace(&mut self.filename, filename.to_string());
        self.pending = None;
        self.last_result = None;

        let result = match compile(source, filename, CompileMode::Exec, CompileFlags::interactive()) {
            Compiled::Ready(unit) => {
                self.one_liner = false;
                match self.runcode(unit, "") {
                    Ok(()) => self.await_resume().await,
                    Err(err) => Err(err),
                }
            }
            Compiled::Incomplete => {
                self.report(format!(
                    "  File \"{}\"\nSyntaxError: unexpected end of file",
                    filename
                ));
                Ok(())
            }
            Compiled::Invalid(syntax) => {
                self.report(syntax.to_string());
                Ok(())
            }
        };

        self.filename = previous;
        result
    }

    /// Read-eval loop until end of input or an exit request
    pub async fn interact(&mut self, input: &mut dyn LineSource, banner: bool) -> ConsoleResult<()> {
        if banner {
            self.streams.out.line(self.banner());
        }

        loop {
            if self.ctx.session.exit_requested() {
                debug!("exit requested");
                break;
            }
            tokio::task::yield_now().await;

            self.set_state(ConsoleState::ReadingLine);
            let prompt = self.prompt().to_string();
            match input.read_line(&prompt).await? {
                ReadLine::Line(line) => {
                    self.feed(&line).await?;
                }
                ReadLine::Retry => {}
                ReadLine::Interrupted => {
                    self.streams.err.line("KeyboardInterrupt");
                    self.reset_buffer();
                }
                ReadLine::Eof => {
                    self.streams.out.line("");
                    break;
                }
            }
        }

        self.set_state(ConsoleState::Terminal);
        self.streams.out.line(FAREWELL);
        Ok(())
    }
}
