//! Units of pending work handed between the console, resolver and shell

use futures::future::LocalBoxFuture;

use crate::executor::Failure;

/// A not-yet-awaited unit of work; resolves to what should run after it
pub type Task = LocalBoxFuture<'static, Result<Resume, Failure>>;

/// What a completed task leaves behind
pub enum Resume {
    /// Nothing left to do
    Noop,
    /// A further awaitable the console should drive
    Awaitable(Task),
}

impl Resume {
    pub fn is_noop(&self) -> bool {
        matches!(self, Resume::Noop)
    }
}

impl std::fmt::Debug for Resume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resume::Noop => f.write_str("Noop"),
            Resume::Awaitable(_) => f.write_str("Awaitable"),
        }
    }
}

/// A task that is already complete
pub fn ready(resume: Resume) -> Task {
    Box::pin(async move { Ok(resume) })
}
