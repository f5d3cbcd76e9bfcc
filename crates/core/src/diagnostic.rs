//! The structured error value every stage surfaces to a host (spec §6, §7).

use std::fmt;
use std::path::PathBuf;

use crate::span::Position;

/// Which pipeline stage produced a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lex,
    Parse,
    Resolve,
    Type,
    Compile,
    Runtime,
    Format,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::Lex => "LexError",
            DiagnosticKind::Parse => "ParseError",
            DiagnosticKind::Resolve => "ResolveError",
            DiagnosticKind::Type => "TypeError",
            DiagnosticKind::Compile => "CompileError",
            DiagnosticKind::Runtime => "RuntimeError",
            DiagnosticKind::Format => "FormatError",
        };
        write!(f, "{name}")
    }
}

/// A fatal, positional error from one stage of the pipeline.
///
/// Every stage stops at the first problem it detects and returns one of
/// these rather than attempting partial recovery (spec §7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub path: Option<PathBuf>,
    pub line: Option<usize>,
    pub col: Option<usize>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            message: message.into(),
            path: None,
            line: None,
            col: None,
        }
    }

    pub fn at(kind: DiagnosticKind, message: impl Into<String>, pos: Position) -> Self {
        Diagnostic {
            kind,
            message: message.into(),
            path: None,
            line: Some(pos.line),
            col: Some(pos.col),
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.path, self.line, self.col) {
            (Some(path), Some(line), Some(col)) => {
                write!(f, "{}:{}:{}: {}", path.display(), line, col, self.message)
            }
            (None, Some(line), Some(col)) => write!(f, "{}:{}: {}", line, col, self.message),
            (Some(path), _, _) => write!(f, "{}: {}", path.display(), self.message),
            (None, _, _) => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for Diagnostic {}
