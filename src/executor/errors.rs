//! Error codes and failure classification for Flow execution

use serde::{Deserialize, Serialize};
use std::fmt;

pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
pub const UNDEFINED_VARIABLE: &str = "UNDEFINED_VARIABLE";
pub const TYPE_ERROR: &str = "TYPE_ERROR";
pub const PROPERTY_NOT_FOUND: &str = "PROPERTY_NOT_FOUND";
pub const NOT_A_FUNCTION: &str = "NOT_A_FUNCTION";
pub const WRONG_ARG_COUNT: &str = "WRONG_ARG_COUNT";
pub const WRONG_ARG_TYPE: &str = "WRONG_ARG_TYPE";
pub const DIVISION_BY_ZERO: &str = "DIVISION_BY_ZERO";
pub const IMPORT_ERROR: &str = "IMPORT_ERROR";
pub const MODULE_NOT_FOUND: &str = "MODULE_NOT_FOUND";

/// Error payload carried by thrown values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Why a unit of Flow code stopped early.
///
/// `Exit` and `Interrupted` end the console session and are never caught by
/// `try`/`catch`. `MissingModule` is the resolvable failure the console traps.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// `exit(code)` was called
    Exit(i32),
    /// Ctrl-C arrived while a statement was running
    Interrupted,
    /// An import named a module that is not on the search path
    MissingModule { name: String, line: usize },
    /// Any other runtime error
    Throw { error: ErrorInfo, line: usize },
}

impl Failure {
    /// A thrown error without a known line yet; the statement that
    /// propagates it fills the line in.
    pub fn throw(code: &str, message: impl Into<String>) -> Self {
        Failure::Throw {
            error: ErrorInfo::new(code, message),
            line: 0,
        }
    }

    pub fn missing_module(name: impl Into<String>) -> Self {
        Failure::MissingModule {
            name: name.into(),
            line: 0,
        }
    }

    /// Exit and interrupt propagate untouched through every handler
    pub fn is_fatal(&self) -> bool {
        matches!(self, Failure::Exit(_) | Failure::Interrupted)
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            Failure::MissingModule { line, .. } | Failure::Throw { line, .. } if *line > 0 => {
                Some(*line)
            }
            _ => None,
        }
    }

    /// Attach the line of the statement being executed, keeping the innermost one
    pub fn at_line(mut self, at: usize) -> Self {
        match &mut self {
            Failure::MissingModule { line, .. } | Failure::Throw { line, .. } if *line == 0 => {
                *line = at;
            }
            _ => {}
        }
        self
    }

    /// The error value bound by `catch (e)`
    pub fn to_error_info(&self) -> ErrorInfo {
        match self {
            Failure::Throw { error, .. } => error.clone(),
            Failure::MissingModule { name, .. } => {
                ErrorInfo::new(MODULE_NOT_FOUND, format!("No module named '{}'", name))
            }
            Failure::Exit(code) => ErrorInfo::new(INTERNAL_ERROR, format!("exit({})", code)),
            Failure::Interrupted => ErrorInfo::new(INTERNAL_ERROR, "interrupted"),
        }
    }

    /// Best-effort traceback naming only the outermost frame
    pub fn traceback(&self, filename: &str) -> String {
        let mut out = String::from("Traceback (most recent call last):\n");
        match self.line() {
            Some(line) => out.push_str(&format!("  File \"{}\", line {}\n", filename, line)),
            None => out.push_str(&format!("  File \"{}\"\n", filename)),
        }
        out.push_str(&self.to_string());
        out
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Exit(code) => write!(f, "exit({})", code),
            Failure::Interrupted => write!(f, "KeyboardInterrupt"),
            Failure::MissingModule { name, .. } => {
                write!(f, "{}: No module named '{}'", MODULE_NOT_FOUND, name)
            }
            Failure::Throw { error, .. } => write!(f, "{}", error),
        }
    }
}

impl std::error::Error for Failure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_line_keeps_innermost() {
        let failure = Failure::throw(TYPE_ERROR, "bad").at_line(3).at_line(1);
        assert_eq!(failure.line(), Some(3));
    }

    #[test]
    fn test_fatal_failures_have_no_line() {
        let failure = Failure::Exit(2).at_line(4);
        assert!(failure.is_fatal());
        assert_eq!(failure.line(), None);
    }

    #[test]
    fn test_traceback_shows_outermost_frame_only() {
        let failure = Failure::missing_module("foo").at_line(2);
        assert_eq!(
            failure.traceback("<stdin>"),
            "Traceback (most recent call last):\n  File \"<stdin>\", line 2\nMODULE_NOT_FOUND: No module named 'foo'"
        );
    }
}
