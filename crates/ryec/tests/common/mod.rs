//! Shared helpers for the compiler test suite.

use anyhow::Result;
use ryec::bound::BoundProgram;
use ryec::diagnostics::{Diagnostic, DiagnosticResult, ErrorKind};

/// Parses and binds a source string without emitting IR.
#[allow(dead_code)]
pub fn bind_source(source: &str) -> DiagnosticResult<BoundProgram> {
    let program = ryec::parser::parse_program(source)?;
    ryec::binder::bind_program(&program)
}

/// Parses, binds and lowers a source string.
#[allow(dead_code)]
pub fn lower_source(source: &str) -> DiagnosticResult<BoundProgram> {
    bind_source(source).map(ryec::lowering::lower_program)
}

/// Binds a source string that must fail, returning the diagnostic.
#[allow(dead_code)]
pub fn bind_error(source: &str) -> Box<Diagnostic> {
    match bind_source(source) {
        Err(diagnostic) => diagnostic,
        Ok(_) => panic!("expected binding to fail for: {}", source),
    }
}

#[allow(dead_code)]
pub fn bind_error_kind(source: &str) -> ErrorKind {
    bind_error(source).kind
}

/// Compiles a source string to textual LLVM IR with source-level symbol
/// names, suppressing diagnostic output for clean test logs.
#[allow(dead_code)]
pub fn gen_ir_for_source(source: &str) -> Result<String> {
    let _diag_guard = ryec::diagnostics::suppress();
    let mut options = ryec::CompileOptions::new("test.rye".to_string());
    options.use_fingerprints = false;
    ryec::compile_to_ir(source, &options)
}

/// Number of times `needle` occurs in `haystack`.
#[allow(dead_code)]
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}
