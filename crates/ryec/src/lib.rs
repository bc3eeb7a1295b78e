//! The Rye compiler library.
//!
//! The pipeline runs strictly single-threaded and fail-fast:
//!
//! 1. lex + parse (`lexer`, `parser`) into the untyped tree (`ast`)
//! 2. bind (`binder`) into the typed bound tree (`bound`)
//! 3. flatten control flow (`lowering`) into the label/goto stream
//! 4. emit LLVM IR with the ARC protocol (`emitter`)
//!
//! Top-level statements form the program body; the binder wraps them in
//! the `main` entry function. The emitted module links against the
//! `rye-runtime` library, which provides the reference-counting runtime
//! and the builtin console functions.

pub mod ast;
pub mod binder;
pub mod bound;
pub mod builtins;
pub mod diagnostics;
pub mod emitter;
pub mod lexer;
pub mod lowering;
pub mod parser;
pub mod symbols;

use anyhow::{Context as _, Result};
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::targets::{
    CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine,
};
use inkwell::OptimizationLevel;
use std::path::Path;

/// Compilation options for the Rye compiler.
///
/// The compiler accepts explicit options rather than discovering project
/// structure; the CLI fills this in from its arguments.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Path to the source file to compile.
    pub src_file: String,

    /// Output path; defaults to the source path with the extension
    /// swapped for `.ll` (or `.o` with `emit_object`).
    pub out_path: Option<String>,

    /// Emit a native object file instead of textual IR. The result still
    /// needs linking against the runtime library.
    pub emit_object: bool,

    /// Name emitted functions and variables by fingerprint instead of
    /// source name. `main` always keeps its fixed name.
    pub use_fingerprints: bool,

    /// Route retain/release through the verbose runtime entry points,
    /// which log a description per ARC event.
    pub verbose_arc: bool,
}

impl CompileOptions {
    pub fn new(src_file: String) -> Self {
        CompileOptions {
            src_file,
            out_path: None,
            emit_object: false,
            use_fingerprints: true,
            verbose_arc: false,
        }
    }
}

/// Runs the front end and emitter over one source string.
pub fn build_module<'ctx>(
    source: &str,
    context: &'ctx Context,
    options: &CompileOptions,
) -> diagnostics::DiagnosticResult<Module<'ctx>> {
    let program = parser::parse_program(source)?;
    let bound = binder::bind_program(&program)?;
    let lowered = lowering::lower_program(bound);
    emitter::emit(
        &lowered,
        context,
        options.use_fingerprints,
        options.verbose_arc,
    )
}

/// Compiles a source string to textual LLVM IR. On failure the
/// diagnostic is printed (unless suppressed) and an error returned.
pub fn compile_to_ir(source: &str, options: &CompileOptions) -> Result<String> {
    let context = Context::create();
    match build_module(source, &context, options) {
        Ok(module) => Ok(module.print_to_string().to_string()),
        Err(diagnostic) => {
            let mut diagnostic = *diagnostic;
            diagnostic.file = Some(options.src_file.clone());
            diagnostics::emit_diagnostic(&diagnostic, Some(source));
            anyhow::bail!("{}", diagnostic.message)
        }
    }
}

/// Compiles a source file per the options. Returns the output path.
pub fn compile(options: &CompileOptions) -> Result<String> {
    let source = std::fs::read_to_string(&options.src_file)
        .with_context(|| format!("failed to read {}", options.src_file))?;

    let context = Context::create();
    let module = match build_module(&source, &context, options) {
        Ok(module) => module,
        Err(diagnostic) => {
            let mut diagnostic = *diagnostic;
            diagnostic.file = Some(options.src_file.clone());
            diagnostics::emit_diagnostic(&diagnostic, Some(&source));
            anyhow::bail!("{}", diagnostic.message)
        }
    };

    let extension = if options.emit_object { "o" } else { "ll" };
    let out_path = match &options.out_path {
        Some(path) => path.clone(),
        None => Path::new(&options.src_file)
            .with_extension(extension)
            .to_string_lossy()
            .into_owned(),
    };

    if options.emit_object {
        Target::initialize_native(&InitializationConfig::default())
            .map_err(|e| anyhow::anyhow!("target initialization failed: {}", e))?;
        let triple = TargetMachine::get_default_triple();
        module.set_triple(&triple);
        let target = Target::from_triple(&triple)
            .map_err(|e| anyhow::anyhow!("no target for triple: {}", e))?;
        let machine = target
            .create_target_machine(
                &triple,
                "generic",
                "",
                OptimizationLevel::Default,
                RelocMode::PIC,
                CodeModel::Default,
            )
            .ok_or_else(|| anyhow::anyhow!("could not create target machine"))?;
        machine
            .write_to_file(&module, FileType::Object, Path::new(&out_path))
            .map_err(|e| anyhow::anyhow!("object emission failed: {}", e))?;
    } else {
        std::fs::write(&out_path, module.print_to_string().to_string())
            .with_context(|| format!("failed to write {}", out_path))?;
    }

    Ok(out_path)
}
