//! Runtime error values (spec §4.6 "Runtime errors").
//!
//! The teacher's `error.rs` threads errors across an FFI boundary via
//! thread-local state because its functions are called from generated LLVM
//! IR that can't propagate a `Result`. This VM has no such boundary — it's a
//! tree-walking interpreter called from plain Rust — so errors propagate the
//! ordinary way, as a `Result<_, RuntimeError>` returned up the call stack.

use std::fmt;
use std::path::PathBuf;

use yasn_core::{Diagnostic, DiagnosticKind};

/// Distinguishes the handful of runtime-error outcomes that `wait`/`wait_all`
/// must tell apart (timeout vs. cancellation vs. everything else), per spec
/// §4.6's concurrency primitives. Every other failure is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    Timeout,
    Canceled,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
    pub path: Option<PathBuf>,
}

impl RuntimeError {
    pub fn other(message: impl Into<String>) -> Self {
        RuntimeError {
            kind: RuntimeErrorKind::Other,
            message: message.into(),
            path: None,
        }
    }

    pub fn timeout() -> Self {
        RuntimeError {
            kind: RuntimeErrorKind::Timeout,
            message: "timeout".to_string(),
            path: None,
        }
    }

    pub fn canceled() -> Self {
        RuntimeError {
            kind: RuntimeErrorKind::Canceled,
            message: "canceled".to_string(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(p) => write!(f, "{}: RuntimeError: {}", p.display(), self.message),
            None => write!(f, "RuntimeError: {}", self.message),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<RuntimeError> for Diagnostic {
    fn from(err: RuntimeError) -> Diagnostic {
        let mut diag = Diagnostic::new(DiagnosticKind::Runtime, err.message);
        if let Some(path) = err.path {
            diag = diag.with_path(path);
        }
        diag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_and_canceled_are_distinct_kinds() {
        assert_eq!(RuntimeError::timeout().kind, RuntimeErrorKind::Timeout);
        assert_eq!(RuntimeError::canceled().kind, RuntimeErrorKind::Canceled);
        assert_eq!(RuntimeError::other("x").kind, RuntimeErrorKind::Other);
    }

    #[test]
    fn display_includes_path_when_present() {
        let err = RuntimeError::other("boom").with_path("/a/b.yasn");
        assert!(err.to_string().contains("/a/b.yasn"));
        assert!(err.to_string().contains("boom"));
    }
}
