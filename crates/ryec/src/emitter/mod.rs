//! LLVM IR emission.
//!
//! The emitter walks the lowered (flat) bound program and builds one LLVM
//! function per Rye function. Per function it emits a root `entry` block
//! holding the hoisted `alloca`s for every local in the body, one named
//! block per label statement, and per-statement IR into the current
//! block. Interleaved with ordinary code generation it runs the ARC
//! object-lifetime protocol: retain/release calls placed at variable
//! stores, call boundaries, statement drops and scope exits, driven by
//! each expression's `is_persistent` bit.
//!
//! `Emitter` holds the LLVM context handles plus program-wide caches
//! (interned string constants, the function and global maps). All
//! per-function state lives in `FunctionCtx` and is swapped wholesale
//! between functions.

pub mod expr;
pub mod runtime;

use crate::bound::{BoundExpression, BoundProgram, BoundStatement};
use crate::diagnostics::{Diagnostic, DiagnosticResult, ErrorKind};
use crate::symbols::{FunctionSymbol, TypeSymbol, VariableKind, VariableSymbol};
use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum};
use inkwell::values::{BasicValueEnum, FunctionValue, GlobalValue, PointerValue};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

const TAG: &str = "EMITTER";

/// Maps any failed LLVM builder operation onto a diagnostic; these only
/// occur when the builder is mispositioned, which would be an emitter
/// bug rather than a user error.
pub(crate) fn llvm_error<E>(_: E) -> Box<Diagnostic> {
    Diagnostic::error(TAG, ErrorKind::NotImplemented, "LLVM builder operation failed")
}

/// A hoisted stack slot for one local. `is_set` flips on the first store
/// so the return-path cleanup can skip locals never initialized on the
/// path being emitted.
pub(crate) struct Local<'ctx> {
    pub ptr: PointerValue<'ctx>,
    pub ty: TypeSymbol,
    pub is_set: bool,
}

pub(crate) struct GlobalSlot<'ctx> {
    pub ptr: GlobalValue<'ctx>,
    pub ty: TypeSymbol,
}

/// Per-function emission state, rebuilt for every function.
pub(crate) struct FunctionCtx<'ctx> {
    pub function: FunctionValue<'ctx>,
    pub symbol: FunctionSymbol,
    pub is_main: bool,
    pub locals: HashMap<String, Local<'ctx>>,
    pub labels: HashMap<String, BasicBlock<'ctx>>,
}

pub struct Emitter<'ctx> {
    pub(crate) context: &'ctx Context,
    pub module: Module<'ctx>,
    pub(crate) builder: Builder<'ctx>,
    use_fingerprints: bool,
    pub(crate) verbose_arc: bool,

    // Cached scalar types.
    pub(crate) bool_t: inkwell::types::IntType<'ctx>,
    pub(crate) i8_t: inkwell::types::IntType<'ctx>,
    pub(crate) i32_t: inkwell::types::IntType<'ctx>,
    pub(crate) i64_t: inkwell::types::IntType<'ctx>,
    pub(crate) f32_t: inkwell::types::FloatType<'ctx>,
    pub(crate) f64_t: inkwell::types::FloatType<'ctx>,
    pub(crate) ptr_t: inkwell::types::PointerType<'ctx>,

    // Interned string constants: identical literals share one immutable
    // global for the whole module.
    str_constants: RefCell<HashMap<String, GlobalValue<'ctx>>>,
    str_counter: Cell<u32>,

    // Program-wide symbol maps.
    pub(crate) functions: RefCell<HashMap<String, FunctionValue<'ctx>>>,
    pub(crate) globals: RefCell<HashMap<String, GlobalSlot<'ctx>>>,
}

/// Emits the lowered program into a fresh LLVM module.
pub fn emit<'ctx>(
    program: &BoundProgram,
    context: &'ctx Context,
    use_fingerprints: bool,
    verbose_arc: bool,
) -> DiagnosticResult<Module<'ctx>> {
    let emitter = Emitter::new(context, use_fingerprints, verbose_arc);
    emitter.declare_builtin_functions();

    // Declare every function and hoist its locals first so bodies can
    // call forward in any order.
    let mut pending = Vec::new();
    for function in &program.functions {
        if function.symbol.builtin {
            continue;
        }
        let is_main = function.symbol.fingerprint() == program.main_fingerprint;
        let (fn_value, locals) = emitter.declare_function(&function.symbol, &function.body, is_main)?;
        emitter
            .functions
            .borrow_mut()
            .insert(emitter.id_of_function(&function.symbol), fn_value);
        pending.push((function, fn_value, locals, is_main));
    }

    // Bodies are emitted in program order, the entry function first;
    // `set` globals are visible only within their declaring function, so
    // each body's module globals exist before any reference to them.
    for (function, fn_value, locals, is_main) in pending {
        let mut ctx = FunctionCtx {
            function: fn_value,
            symbol: function.symbol.clone(),
            is_main,
            locals,
            labels: HashMap::new(),
        };
        emitter.emit_function_body(&mut ctx, &function.body)?;
    }

    // A malformed module is an emitter bug; surface the verifier message
    // instead of handing broken IR downstream.
    if let Err(message) = emitter.module.verify() {
        return Err(Diagnostic::error(
            TAG,
            ErrorKind::NotImplemented,
            format!("emitted module failed verification: {}", message),
        ));
    }

    Ok(emitter.into_module())
}

impl<'ctx> Emitter<'ctx> {
    pub fn new(context: &'ctx Context, use_fingerprints: bool, verbose_arc: bool) -> Emitter<'ctx> {
        let module = context.create_module("rye_module");
        let builder = context.create_builder();
        Emitter {
            context,
            module,
            builder,
            use_fingerprints,
            verbose_arc,
            bool_t: context.bool_type(),
            i8_t: context.i8_type(),
            i32_t: context.i32_type(),
            i64_t: context.i64_type(),
            f32_t: context.f32_type(),
            f64_t: context.f64_type(),
            ptr_t: context.ptr_type(inkwell::AddressSpace::default()),
            str_constants: RefCell::new(HashMap::new()),
            str_counter: Cell::new(0),
            functions: RefCell::new(HashMap::new()),
            globals: RefCell::new(HashMap::new()),
        }
    }

    pub fn into_module(self) -> Module<'ctx> {
        self.module
    }

    // --- naming ---------------------------------------------------------

    /// Symbol name used in the IR: source name or fingerprint, per the
    /// compile-time toggle. Builtins always keep their source name, which
    /// is the runtime library's exported symbol.
    pub(crate) fn id_of_function(&self, symbol: &FunctionSymbol) -> String {
        if symbol.builtin || !self.use_fingerprints {
            symbol.name.clone()
        } else {
            symbol.fingerprint()
        }
    }

    pub(crate) fn id_of_variable(&self, variable: &VariableSymbol) -> String {
        if self.use_fingerprints {
            variable.fingerprint()
        } else {
            variable.name.clone()
        }
    }

    // --- types ----------------------------------------------------------

    /// ABI type of a Rye type: object types are opaque pointers into the
    /// runtime heap, primitives map to scalars.
    pub(crate) fn ir_type(&self, ty: &TypeSymbol) -> BasicTypeEnum<'ctx> {
        match ty {
            TypeSymbol::Bool => self.bool_t.into(),
            TypeSymbol::Byte => self.i8_t.into(),
            TypeSymbol::Int => self.i32_t.into(),
            TypeSymbol::Float => self.f32_t.into(),
            // void has no ABI slot; function types special-case it.
            TypeSymbol::Void => self.i32_t.into(),
            _ => self.ptr_t.into(),
        }
    }

    pub(crate) fn default_constant(&self, ty: &TypeSymbol) -> BasicValueEnum<'ctx> {
        match ty {
            TypeSymbol::Bool => self.bool_t.const_int(0, false).into(),
            TypeSymbol::Byte => self.i8_t.const_int(0, false).into(),
            TypeSymbol::Int => self.i32_t.const_int(0, false).into(),
            TypeSymbol::Float => self.f32_t.const_float(0.0).into(),
            _ => self.ptr_t.const_null().into(),
        }
    }

    fn function_type(
        &self,
        symbol: &FunctionSymbol,
        is_main: bool,
    ) -> inkwell::types::FunctionType<'ctx> {
        let params: Vec<BasicMetadataTypeEnum> = symbol
            .parameters
            .iter()
            .map(|p| self.ir_type(&p.ty).into())
            .collect();
        if is_main {
            // The fixed entry point returns the process exit code.
            self.i32_t.fn_type(&params, false)
        } else if symbol.return_type == TypeSymbol::Void {
            self.context.void_type().fn_type(&params, false)
        } else {
            self.ir_type(&symbol.return_type).fn_type(&params, false)
        }
    }

    // --- string constants ----------------------------------------------

    /// Interns a NUL-terminated character constant; identical literals
    /// share a single immutable global.
    pub(crate) fn string_constant(&self, literal: &str) -> PointerValue<'ctx> {
        if let Some(global) = self.str_constants.borrow().get(literal) {
            return global.as_pointer_value();
        }
        let data = self.context.const_string(literal.as_bytes(), true);
        let name = format!(".str.{}", self.str_counter.get());
        self.str_counter.set(self.str_counter.get() + 1);
        let global = self.module.add_global(data.get_type(), None, &name);
        global.set_initializer(&data);
        global.set_constant(true);
        self.str_constants
            .borrow_mut()
            .insert(literal.to_string(), global);
        global.as_pointer_value()
    }

    // --- functions ------------------------------------------------------

    fn declare_builtin_functions(&self) {
        for symbol in crate::builtins::builtin_functions() {
            let fn_type = self.function_type(&symbol, false);
            let fn_value = self.module.add_function(&symbol.name, fn_type, None);
            self.functions.borrow_mut().insert(symbol.name.clone(), fn_value);
        }
    }

    /// Creates the LLVM function, its root block, and the hoisted allocas
    /// for every local declared anywhere in the (flat) body. Hoisting is
    /// what lets the return-path cleanup reach all locals regardless of
    /// the control-flow path taken.
    fn declare_function(
        &self,
        symbol: &FunctionSymbol,
        body: &[BoundStatement],
        is_main: bool,
    ) -> DiagnosticResult<(FunctionValue<'ctx>, HashMap<String, Local<'ctx>>)> {
        let ir_name = if is_main {
            "main".to_string()
        } else {
            self.id_of_function(symbol)
        };
        let fn_value = self
            .module
            .add_function(&ir_name, self.function_type(symbol, is_main), None);

        for (param, value) in symbol.parameters.iter().zip(fn_value.get_param_iter()) {
            value.set_name(&param.name);
        }

        let entry = self.context.append_basic_block(fn_value, "entry");
        self.builder.position_at_end(entry);

        let mut locals = HashMap::new();
        for statement in body {
            if let BoundStatement::VariableDeclaration { variable, .. } = statement {
                if variable.is_global() {
                    continue;
                }
                let name = self.id_of_variable(variable);
                if locals.contains_key(&name) {
                    continue;
                }
                let ptr = self
                    .builder
                    .build_alloca(self.ir_type(&variable.ty), &name)
                    .map_err(llvm_error)?;
                // Null object slots so a release before the first store is
                // a runtime no-op.
                if variable.ty.is_object() {
                    self.builder
                        .build_store(ptr, self.ptr_t.const_null())
                        .map_err(llvm_error)?;
                }
                locals.insert(
                    name,
                    Local {
                        ptr,
                        ty: variable.ty.clone(),
                        is_set: false,
                    },
                );
            }
        }

        Ok((fn_value, locals))
    }

    // --- statements -----------------------------------------------------

    fn emit_function_body(
        &self,
        ctx: &mut FunctionCtx<'ctx>,
        body: &[BoundStatement],
    ) -> DiagnosticResult<()> {
        // Pre-create one block per label so gotos can reference forward.
        for statement in body {
            if let BoundStatement::Label(label) = statement {
                let block = self.context.append_basic_block(ctx.function, label);
                ctx.labels.insert(label.clone(), block);
            }
        }

        let entry = ctx
            .function
            .get_first_basic_block()
            .ok_or_else(|| Diagnostic::error(TAG, ErrorKind::NotImplemented, "missing entry block"))?;
        self.builder.position_at_end(entry);

        // After a terminator, skip forward until the next label opens a
        // fresh block.
        let mut skip_to_next_block = false;

        for statement in body {
            if let BoundStatement::Label(label) = statement {
                let block = self.label_block(ctx, label)?;
                self.builder.position_at_end(block);
                skip_to_next_block = false;
                continue;
            }
            if skip_to_next_block {
                continue;
            }

            match statement {
                BoundStatement::VariableDeclaration {
                    variable,
                    initializer,
                } => self.emit_variable_declaration(ctx, variable, initializer.as_ref())?,

                BoundStatement::Goto(label) => {
                    let block = self.label_block(ctx, label)?;
                    self.builder
                        .build_unconditional_branch(block)
                        .map_err(llvm_error)?;
                    skip_to_next_block = true;
                }

                BoundStatement::ConditionalGoto {
                    condition,
                    if_label,
                    else_label,
                } => {
                    let cond = self.emit_expression(ctx, condition)?.into_int_value();
                    let if_block = self.label_block(ctx, if_label)?;
                    let else_block = self.label_block(ctx, else_label)?;
                    self.builder
                        .build_conditional_branch(cond, if_block, else_block)
                        .map_err(llvm_error)?;
                    skip_to_next_block = true;
                }

                BoundStatement::Expression(expression) => {
                    let value = self.emit_expression_opt(ctx, expression)?;
                    // A dropped object-typed result is always transient
                    // (+1) here; release it.
                    if expression.ty().is_object() {
                        if let Some(value) = value {
                            self.destroy_reference(
                                value,
                                "expression value unused, destroying reference",
                            )?;
                        }
                    }
                }

                BoundStatement::Return(expression) => {
                    self.emit_return_statement(ctx, expression.as_ref())?;
                    skip_to_next_block = true;
                }

                BoundStatement::GarbageCollect(variables) => {
                    self.emit_garbage_collect(ctx, variables)?;
                }

                other => {
                    return Err(Diagnostic::error(
                        TAG,
                        ErrorKind::NotImplemented,
                        format!("statement not in lowered form: {:?}", std::mem::discriminant(other)),
                    ));
                }
            }
        }

        Ok(())
    }

    pub(crate) fn label_block(
        &self,
        ctx: &FunctionCtx<'ctx>,
        label: &str,
    ) -> DiagnosticResult<BasicBlock<'ctx>> {
        ctx.labels.get(label).copied().ok_or_else(|| {
            Diagnostic::error(
                TAG,
                ErrorKind::NotImplemented,
                format!("unknown label \"{}\"", label),
            )
        })
    }

    fn emit_variable_declaration(
        &self,
        ctx: &mut FunctionCtx<'ctx>,
        variable: &VariableSymbol,
        initializer: Option<&BoundExpression>,
    ) -> DiagnosticResult<()> {
        let name = self.id_of_variable(variable);

        if variable.is_global() {
            let global = self.module.add_global(self.ir_type(&variable.ty), None, &name);
            global.set_initializer(&self.default_constant(&variable.ty));
            self.globals.borrow_mut().insert(
                name.clone(),
                GlobalSlot {
                    ptr: global,
                    ty: variable.ty.clone(),
                },
            );
            if let Some(initializer) = initializer {
                let value = self.emit_expression(ctx, initializer)?;
                // Retain on copy: a persistent source gains a reference
                // when its value is stored into a second location.
                if initializer.is_persistent() && initializer.ty().is_object() {
                    self.create_reference(value, &format!("variable declaration [{}]", name))?;
                }
                self.builder
                    .build_store(global.as_pointer_value(), value)
                    .map_err(llvm_error)?;
            }
            return Ok(());
        }

        if let Some(initializer) = initializer {
            let value = self.emit_expression(ctx, initializer)?;
            if initializer.is_persistent() && initializer.ty().is_object() {
                self.create_reference(value, &format!("variable declaration [{}]", name))?;
            }
            let local = ctx.locals.get_mut(&name).ok_or_else(|| {
                Diagnostic::error(
                    TAG,
                    ErrorKind::NotImplemented,
                    format!("local \"{}\" was not hoisted", name),
                )
            })?;
            local.is_set = true;
            let ptr = local.ptr;
            self.builder.build_store(ptr, value).map_err(llvm_error)?;
        }
        Ok(())
    }

    fn emit_return_statement(
        &self,
        ctx: &mut FunctionCtx<'ctx>,
        expression: Option<&BoundExpression>,
    ) -> DiagnosticResult<()> {
        // Compute the return value before the cleanup below can release it.
        let mut value = None;
        if let Some(expression) = expression {
            let v = self.emit_expression(ctx, expression)?;
            // Retain on return copy: variables keep their own reference,
            // so returning one hands the caller a reference of its own.
            if expression.is_persistent() && expression.ty().is_object() {
                self.create_reference(
                    v,
                    &format!("return value copy [{}]", ctx.symbol.name),
                )?;
            }
            value = Some(v);
        }

        // Release every object local assigned on the way here, then the
        // object parameters (their references were created by callers).
        for (name, local) in &ctx.locals {
            if !local.is_set || !local.ty.is_object() {
                continue;
            }
            let loaded = self
                .builder
                .build_load(self.ir_type(&local.ty), local.ptr, &format!("{}.gc", name))
                .map_err(llvm_error)?;
            self.destroy_reference(loaded, &format!("return cleanup [{}]", name))?;
        }
        for param in &ctx.symbol.parameters {
            if !param.ty.is_object() {
                continue;
            }
            if let VariableKind::Parameter(ordinal) = param.kind {
                if let Some(arg) = ctx.function.get_nth_param(ordinal as u32) {
                    self.destroy_reference(arg, &format!("return cleanup [{}]", param.name))?;
                }
            }
        }

        if ctx.is_main {
            let zero = self.i32_t.const_int(0, false);
            self.builder.build_return(Some(&zero)).map_err(llvm_error)?;
        } else if let Some(value) = value {
            self.builder.build_return(Some(&value)).map_err(llvm_error)?;
        } else if ctx.symbol.return_type == TypeSymbol::Void {
            self.builder.build_return(None).map_err(llvm_error)?;
        } else {
            // Implicit trailing return in a non-void function: yield the
            // type's default value.
            let default = self.default_constant(&ctx.symbol.return_type);
            self.builder.build_return(Some(&default)).map_err(llvm_error)?;
        }
        Ok(())
    }

    /// End-of-scope cleanup emitted by the lowerer: release each listed
    /// local and null its slot so the return-path cleanup is a no-op for
    /// it.
    fn emit_garbage_collect(
        &self,
        ctx: &mut FunctionCtx<'ctx>,
        variables: &[VariableSymbol],
    ) -> DiagnosticResult<()> {
        for variable in variables {
            if !variable.ty.is_object() {
                continue;
            }
            let name = self.id_of_variable(variable);
            let local = match ctx.locals.get(&name) {
                Some(local) => local,
                None => continue,
            };
            let loaded = self
                .builder
                .build_load(self.ir_type(&local.ty), local.ptr, &format!("{}.scope", name))
                .map_err(llvm_error)?;
            let ptr = local.ptr;
            self.destroy_reference(loaded, &format!("scope cleanup [{}]", name))?;
            self.builder
                .build_store(ptr, self.ptr_t.const_null())
                .map_err(llvm_error)?;
        }
        Ok(())
    }
}
