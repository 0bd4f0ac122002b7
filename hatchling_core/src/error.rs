//! Error handling.
//!
//! `Syntax` errors are compile-time and always fatal to the compile
//! (`CompileError`); every other kind is raised by the VM and is either
//! recoverable (default) or fatal, carried on `RuntimeError`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("syntax error")]
    Syntax,
    #[error("name resolution error")]
    NameResolution,
    #[error("type mismatch")]
    TypeMismatch,
    #[error("arithmetic error")]
    Arithmetic,
    #[error("index out of range")]
    IndexOutOfRange,
    #[error("stack overflow")]
    StackOverflow,
    #[error("stack underflow")]
    StackUnderflow,
    #[error("frame overflow")]
    FrameOverflow,
    #[error("assignment to constant")]
    AssignToConstant,
    #[error("unknown method")]
    UnknownMethod,
    #[error("import failure")]
    ImportFailure,
    #[error("internal invariant violated")]
    InternalInvariant,
}

/// One frame of a call-stack trace: function name, module path, and the
/// precise line/column the instruction pointer was at.
#[derive(Debug, Clone)]
pub struct TraceFrame {
    pub function_name: String,
    pub module_path: Option<String>,
    pub line: u16,
    pub column: u16,
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module_path {
            Some(path) => write!(f, "{} ({}:{}:{})", self.function_name, path, self.line, self.column),
            None => write!(f, "{} (line {}, col {})", self.function_name, self.line, self.column),
        }
    }
}

/// A runtime error. `fatal` distinguishes the propagation path:
/// non-fatal errors pop the three-choice dialog via [`ErrorPresenter`] and
/// let the VM continue with `NULL_VAL`; fatal ones unwind and stop the VM.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    pub fatal: bool,
    pub trace: Vec<TraceFrame>,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        RuntimeError {
            kind,
            message: message.into(),
            fatal: false,
            trace: Vec::new(),
        }
    }

    pub fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    pub fn with_trace(mut self, trace: Vec<TraceFrame>) -> Self {
        self.trace = trace;
        self
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        for frame in &self.trace {
            write!(f, "\n  at {frame}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}

#[derive(Debug, Clone)]
pub struct CompileError {
    pub message: String,
    pub line: u16,
    pub column: u16,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "syntax error at {}:{}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for CompileError {}

/// The three choices a recoverable runtime error presents. `IgnoreAll`
/// is latched per call-site by the VM so subsequent occurrences of the
/// *same* instruction skip the dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorChoice {
    Exit,
    IgnoreAll,
    Continue,
}

/// The host-supplied presentation of a recoverable error. `hatchling_core`
/// does not depend on any UI toolkit; a headless host can always answer
/// `IgnoreAll`.
pub trait ErrorPresenter {
    fn present(&mut self, error: &RuntimeError) -> ErrorChoice;
}

/// A presenter that always continues after logging — what `hatchling_cli`
/// installs, since it has no interactive surface.
#[derive(Debug, Default)]
pub struct LoggingPresenter;

impl ErrorPresenter for LoggingPresenter {
    fn present(&mut self, error: &RuntimeError) -> ErrorChoice {
        tracing::warn!(%error, "recoverable runtime error, continuing");
        ErrorChoice::IgnoreAll
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Format(#[from] hatchling_bytecode::FormatError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_trace_frames() {
        let err = RuntimeError::new(ErrorKind::Arithmetic, "divide by zero").with_trace(vec![TraceFrame {
            function_name: "f".into(),
            module_path: Some("main.hs".into()),
            line: 3,
            column: 5,
        }]);
        let rendered = err.to_string();
        assert!(rendered.contains("divide by zero"));
        assert!(rendered.contains("main.hs:3:5"));
    }
}
