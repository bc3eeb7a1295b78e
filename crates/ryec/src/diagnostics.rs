//! Diagnostic reporting for the Rye compiler.
//!
//! Emits compact, rustc-style error messages to stderr: a colored
//! `error[Kind]` header, a `file:line:column` location computed from the
//! byte span, a few lines of source context and a caret marker under the
//! offending span.
//!
//! The compiler is fail-fast: every phase returns `DiagnosticResult<T>`
//! and the first error aborts the pipeline. There is no multi-error
//! collection and no recovery; downstream phases rely on every upstream
//! invariant having held.

use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};

/// Severity of a reported diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// The closed set of error kinds the compiler can report.
///
/// Binder and emitter code match on these in tests, so the set is part of
/// the compiler's public surface. `Lexer`/`Parser` kinds cover the front
/// end; the rest are semantic-analysis and emission failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnexpectedCharacter,
    UnterminatedString,
    UnexpectedToken,
    DuplicateParameter,
    DuplicateFunction,
    DuplicateVariableDeclaration,
    UndefinedVariableReference,
    UndefinedFunctionCall,
    BadNumberOfParameters,
    IncorrectTypeFunctionCall,
    TypeFunctionDoesNotExist,
    UnaryOperatorType,
    BinaryOperatorType,
    IllegalVariableDeclaration,
    UnexpectedExpressionStatement,
    UnknownStatement,
    OutsideReturn,
    VoidReturn,
    OutsideBreak,
    OutsideContinue,
    UnexpectedNonIntegerValue,
    Conversion,
    ExplicitConversion,
    NotImplemented,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Structured diagnostic container propagated through the pipeline.
///
/// Phases construct a boxed `Diagnostic` and bubble it up with `?`; the
/// driver decides how to present it. The optional byte span enables
/// caret-highlighted output when source text is available at emission.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: ErrorKind,
    /// Compilation phase that produced the diagnostic ("LEXER", "BINDER", ...)
    pub tag: &'static str,
    pub message: String,
    pub file: Option<String>,
    pub note: Option<String>,
    /// Byte range into the source text for caret highlighting.
    pub span: Option<Range<usize>>,
}

/// Uniform result type for fallible compiler phases.
pub type DiagnosticResult<T> = Result<T, Box<Diagnostic>>;

impl Diagnostic {
    /// Creates a boxed error diagnostic without source location.
    pub fn error(tag: &'static str, kind: ErrorKind, msg: impl Into<String>) -> Box<Diagnostic> {
        Box::new(Diagnostic {
            severity: Severity::Error,
            kind,
            tag,
            message: msg.into(),
            file: None,
            note: None,
            span: None,
        })
    }

    /// Creates a boxed error diagnostic anchored to a byte span.
    pub fn error_with_span(
        tag: &'static str,
        kind: ErrorKind,
        msg: impl Into<String>,
        span: Range<usize>,
    ) -> Box<Diagnostic> {
        Box::new(Diagnostic {
            severity: Severity::Error,
            kind,
            tag,
            message: msg.into(),
            file: None,
            note: None,
            span: Some(span),
        })
    }

    pub fn with_note(mut self: Box<Self>, note: impl Into<String>) -> Box<Self> {
        self.note = Some(note.into());
        self
    }
}

static DIAGNOSTICS_ENABLED: AtomicBool = AtomicBool::new(true);

/// Emits a diagnostic to stderr, with caret highlighting when both a span
/// and the source text are available. Respects the global suppression
/// toggle used by the test suite.
pub fn emit_diagnostic(d: &Diagnostic, source: Option<&str>) {
    if !DIAGNOSTICS_ENABLED.load(Ordering::SeqCst) {
        return;
    }
    let (color, label) = match d.severity {
        Severity::Error => ("\x1b[31m", "error"),
        Severity::Warning => ("\x1b[33m", "warning"),
    };
    let reset = "\x1b[0m";

    eprintln!("{}{}{}[{}]: {}", color, label, reset, d.kind, d.message);

    if let (Some(span), Some(src)) = (d.span.as_ref(), source) {
        let (line_no, col) = line_col(src, span.start);
        match &d.file {
            Some(path) => eprintln!("  --> {}:{}:{}", path, line_no, col + 1),
            None => eprintln!("  --> {}:{}", line_no, col + 1),
        }

        // Show the offending line with a caret run under the span.
        let lines: Vec<&str> = src.lines().collect();
        if line_no >= 1 && line_no <= lines.len() {
            let idx = line_no - 1;
            let start = idx.saturating_sub(1);
            for (i, line) in lines.iter().enumerate().take(idx + 1).skip(start) {
                eprintln!("{:4} | {}", i + 1, line);
                if i == idx {
                    let mut caret = " ".repeat(col);
                    let width = span.len().max(1).min(lines[idx].len().saturating_sub(col).max(1));
                    caret.push_str(&"^".repeat(width));
                    eprintln!("     | {}", caret);
                }
            }
        }
    } else if let Some(path) = &d.file {
        eprintln!("  --> {}", path);
    }

    if let Some(note) = &d.note {
        eprintln!("\x1b[34mnote{}: {}", reset, note);
    }
}

/// Computes a 1-based line and 0-based column for a byte offset.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut byte_idx = 0usize;
    for (lineno, line) in source.lines().enumerate() {
        let line_len = line.len() + 1;
        if offset >= byte_idx && offset < byte_idx + line_len {
            return (lineno + 1, offset - byte_idx);
        }
        byte_idx += line_len;
    }
    (source.lines().count().max(1), 0)
}

/// Temporarily silences diagnostic output. The returned guard restores
/// the previous state when dropped; tests use this to keep stderr clean
/// while still asserting on returned `Diagnostic` values.
pub fn suppress() -> SuppressGuard {
    let prev = DIAGNOSTICS_ENABLED.swap(false, Ordering::SeqCst);
    SuppressGuard { prev }
}

pub struct SuppressGuard {
    prev: bool,
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        DIAGNOSTICS_ENABLED.store(self.prev, Ordering::SeqCst);
    }
}
