//! Shell dispatch for console lines that are not valid Flow
//!
//! A line is split on `;` into commands. Each command name is looked up on a
//! [`Shell`], which answers with a [`Capability`] saying how the command
//! runs. A command ending in `.flow` is sourced as a script instead.

mod builtin;

#[cfg(test)]
mod tests;

pub use builtin::BuiltinShell;

use futures::future::LocalBoxFuture;
use std::rc::Rc;
use tracing::debug;
use uuid::Uuid;

use crate::io::Streams;
use crate::modules::SOURCE_SUFFIX;
use crate::task::{Resume, Task};

/// One `;`-separated segment: a command token and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub name: String,
    pub args: Vec<String>,
}

impl ShellCommand {
    /// `None` for a blank segment
    pub fn parse(segment: &str) -> Option<Self> {
        let mut words = segment.split_whitespace();
        let name = words.next()?.to_string();
        Some(Self {
            name,
            args: words.map(str::to_string).collect(),
        })
    }

    fn is_script(&self) -> bool {
        self.name.ends_with(SOURCE_SUFFIX)
    }
}

/// Every non-blank command on a line, in order
pub fn parse_line(line: &str) -> Vec<ShellCommand> {
    line.split(';').filter_map(ShellCommand::parse).collect()
}

pub type LinesFn =
    Rc<dyn Fn(&[String]) -> anyhow::Result<Box<dyn Iterator<Item = anyhow::Result<String>>>>>;
pub type BackgroundFn = Rc<dyn Fn(Vec<String>) -> LocalBoxFuture<'static, anyhow::Result<()>>>;
pub type CallFn = Rc<dyn Fn(&[String]) -> anyhow::Result<()>>;

/// How a shell command runs
#[derive(Clone)]
pub enum Capability {
    /// Produces output lines, driven to completion before dispatch continues
    Lines(LinesFn),
    /// Scheduled on the local task set and not awaited
    Background(BackgroundFn),
    /// An asynchronous line stream; not supported at the console
    Stream,
    /// Runs synchronously for its effect
    Call(CallFn),
}

impl Capability {
    pub fn lines(
        f: impl Fn(&[String]) -> anyhow::Result<Box<dyn Iterator<Item = anyhow::Result<String>>>>
            + 'static,
    ) -> Self {
        Capability::Lines(Rc::new(f))
    }

    pub fn background(
        f: impl Fn(Vec<String>) -> LocalBoxFuture<'static, anyhow::Result<()>> + 'static,
    ) -> Self {
        Capability::Background(Rc::new(f))
    }

    pub fn call(f: impl Fn(&[String]) -> anyhow::Result<()> + 'static) -> Self {
        Capability::Call(Rc::new(f))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Capability::Lines(_) => "lines",
            Capability::Background(_) => "background",
            Capability::Stream => "stream",
            Capability::Call(_) => "call",
        }
    }
}

pub trait Shell {
    fn capability(&self, name: &str) -> Option<Capability>;

    /// Run a `.flow` script; the task is awaited by the console
    fn source(&self, path: &str, args: Vec<String>) -> Task;
}

enum Step {
    Run(ShellCommand, Capability),
    Source(ShellCommand),
}

/// Offer `line` to `shell`.
///
/// Returns false, running nothing, when any segment names neither a
/// capability nor a script. A sourced script is left in `pending`.
pub fn dispatch(
    shell: &dyn Shell,
    line: &str,
    extra_args: &[String],
    streams: &Streams,
    pending: &mut Option<Task>,
) -> bool {
    let commands = parse_line(line);
    if commands.is_empty() {
        return false;
    }

    let mut steps = Vec::with_capacity(commands.len());
    for command in commands {
        if let Some(capability) = shell.capability(&command.name) {
            steps.push(Step::Run(command, capability));
        } else if command.is_script() {
            steps.push(Step::Source(command));
        } else {
            debug!(command = %command.name, "not a shell command");
            return false;
        }
    }

    for step in steps {
        match step {
            Step::Run(command, capability) => run(&command, capability, streams),
            Step::Source(command) => {
                let mut args = command.args;
                args.extend(extra_args.iter().cloned());
                let script = shell.source(&command.name, args);
                *pending = Some(match pending.take() {
                    Some(previous) => chain(previous, script),
                    None => script,
                });
            }
        }
    }
    true
}

fn run(command: &ShellCommand, capability: Capability, streams: &Streams) {
    debug!(command = %command.name, kind = capability.kind(), "running shell command");
    let report = |err: anyhow::Error| streams.err.line(format!("{}: {:#}", command.name, err));

    match capability {
        Capability::Lines(lines) => match lines(&command.args) {
            Ok(items) => {
                for item in items {
                    match item {
                        Ok(line) => streams.out.line(line),
                        Err(err) => {
                            report(err);
                            break;
                        }
                    }
                }
            }
            Err(err) => report(err),
        },
        Capability::Background(start) => {
            let job = start(command.args.clone());
            let id = Uuid::new_v4();
            let name = command.name.clone();
            let err = streams.err.clone();
            debug!(job = %id, command = %name, "starting background job");
            tokio::task::spawn_local(async move {
                match job.await {
                    Ok(()) => debug!(job = %id, "background job finished"),
                    Err(e) => err.line(format!("{}: {:#}", name, e)),
                }
            });
        }
        Capability::Stream => {
            streams
                .err
                .line(format!("{}: streaming commands are not implemented", command.name));
        }
        Capability::Call(call) => {
            if let Err(err) = call(&command.args) {
                report(err);
            }
        }
    }
}

/// Run `first` (and whatever it leaves behind) before `next`
fn chain(first: Task, next: Task) -> Task {
    Box::pin(async move {
        if let Resume::Awaitable(rest) = first.await? {
            rest.await?;
        }
        next.await
    })
}
