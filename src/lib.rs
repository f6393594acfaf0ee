//! Rhythm console: an interactive Flow console that traps imports of
//! missing modules, installs them, and resumes the statement that needed
//! them.

pub mod cli;
pub mod compiler;
pub mod config;
pub mod console;
pub mod executor;
pub mod io;
pub mod modules;
pub mod parser;
pub mod resolver;
pub mod shell;
pub mod task;

pub use compiler::{compile, BoundUnit, CompileFlags, CompileMode, Compiled};
pub use console::{Console, ConsoleBuilder, ConsoleError};
pub use executor::{Context, Failure, Namespace, Val};
pub use resolver::{ResolutionRequest, Resolver};
pub use task::{Resume, Task};
