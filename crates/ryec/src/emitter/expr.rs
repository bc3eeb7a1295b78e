//! Expression emission, including the ARC retain/release placement and
//! the conversion lowering paths.

use super::{llvm_error, Emitter, FunctionCtx};
use crate::ast::LiteralValue;
use crate::bound::{BoundBinaryOperator, BoundBinaryOperatorKind, BoundExpression, BoundUnaryOperatorKind};
use crate::builtins::methods;
use crate::diagnostics::{Diagnostic, DiagnosticResult, ErrorKind};
use crate::symbols::{FunctionSymbol, TypeSymbol, VariableKind, VariableSymbol};
use inkwell::values::{BasicMetadataValueEnum, BasicValueEnum, CallSiteValue, PointerValue};
use inkwell::{FloatPredicate, IntPredicate};

const TAG: &str = "EMITTER";

impl<'ctx> Emitter<'ctx> {
    /// Emits an expression that must produce a value. Void-typed calls in
    /// value position cannot come out of the binder.
    pub(crate) fn emit_expression(
        &self,
        ctx: &mut FunctionCtx<'ctx>,
        expression: &BoundExpression,
    ) -> DiagnosticResult<BasicValueEnum<'ctx>> {
        self.emit_expression_opt(ctx, expression)?.ok_or_else(|| {
            Diagnostic::error(
                TAG,
                ErrorKind::NotImplemented,
                "void expression used as a value",
            )
        })
    }

    /// Emits an expression; `None` means the expression was a call to a
    /// void function (only legal in statement position).
    pub(crate) fn emit_expression_opt(
        &self,
        ctx: &mut FunctionCtx<'ctx>,
        expression: &BoundExpression,
    ) -> DiagnosticResult<Option<BasicValueEnum<'ctx>>> {
        match expression {
            BoundExpression::Literal { value } => self.emit_literal(value).map(Some),
            BoundExpression::Variable { variable } => {
                self.emit_variable(ctx, variable).map(Some)
            }
            BoundExpression::Assignment { variable, value } => {
                self.emit_assignment(ctx, variable, value).map(Some)
            }
            BoundExpression::ArrayAccess {
                base,
                index,
                element_type,
            } => self
                .emit_array_access(ctx, base, index, element_type)
                .map(Some),
            BoundExpression::ArrayAssignment {
                base,
                index,
                value,
                element_type,
            } => self
                .emit_array_assignment(ctx, base, index, value, element_type)
                .map(Some),
            BoundExpression::MakeArray {
                element_type,
                length,
            } => self.emit_make_array(ctx, element_type, length).map(Some),
            BoundExpression::Call {
                function,
                arguments,
            } => self.emit_call(ctx, function, arguments),
            BoundExpression::TypeCall {
                base,
                function,
                arguments,
            } => self.emit_type_call(ctx, base, &function.name, arguments),
            BoundExpression::Thread { function } => self.emit_thread(function).map(Some),
            BoundExpression::Unary { op, operand } => {
                let value = self.emit_expression(ctx, operand)?;
                self.emit_unary(op.kind, &op.operand_type, value).map(Some)
            }
            BoundExpression::Binary { left, op, right } => {
                self.emit_binary(ctx, left, op, right).map(Some)
            }
            BoundExpression::Ternary {
                condition,
                then_branch,
                else_branch,
            } => self
                .emit_ternary(ctx, condition, then_branch, else_branch)
                .map(Some),
            BoundExpression::Conversion { to, expression } => {
                self.emit_conversion(ctx, to, expression).map(Some)
            }
            BoundExpression::FunctionReference { .. } => Err(Diagnostic::error(
                TAG,
                ErrorKind::NotImplemented,
                "a function reference is not a value",
            )),
        }
    }

    // --- ARC helpers ----------------------------------------------------

    pub(crate) fn create_reference(
        &self,
        value: BasicValueEnum<'ctx>,
        comment: &str,
    ) -> DiagnosticResult<()> {
        let ptr = value.into_pointer_value();
        if self.verbose_arc {
            let note = self.string_constant(comment);
            self.builder
                .build_call(
                    self.register_reference_verbose_fn(),
                    &[ptr.into(), note.into()],
                    "",
                )
                .map_err(llvm_error)?;
        } else {
            self.builder
                .build_call(self.register_reference_fn(), &[ptr.into()], "")
                .map_err(llvm_error)?;
        }
        Ok(())
    }

    pub(crate) fn destroy_reference(
        &self,
        value: BasicValueEnum<'ctx>,
        comment: &str,
    ) -> DiagnosticResult<()> {
        let ptr = value.into_pointer_value();
        if self.verbose_arc {
            let note = self.string_constant(comment);
            self.builder
                .build_call(
                    self.unregister_reference_verbose_fn(),
                    &[ptr.into(), note.into()],
                    "",
                )
                .map_err(llvm_error)?;
        } else {
            self.builder
                .build_call(self.unregister_reference_fn(), &[ptr.into()], "")
                .map_err(llvm_error)?;
        }
        Ok(())
    }

    /// Allocates a runtime object and registers its initial reference.
    pub(crate) fn create_object(
        &self,
        class: &str,
        args: &[BasicMetadataValueEnum<'ctx>],
    ) -> DiagnosticResult<PointerValue<'ctx>> {
        let call = self
            .builder
            .build_call(self.class_new_fn(class), args, "new")
            .map_err(llvm_error)?;
        let object = self.call_value(call)?.into_pointer_value();
        self.create_reference(object.into(), "initial instance")?;
        Ok(object)
    }

    fn call_value(&self, call: CallSiteValue<'ctx>) -> DiagnosticResult<BasicValueEnum<'ctx>> {
        call.try_as_basic_value().left().ok_or_else(|| {
            Diagnostic::error(TAG, ErrorKind::NotImplemented, "call produced no value")
        })
    }

    // --- leaves ---------------------------------------------------------

    fn emit_literal(&self, value: &LiteralValue) -> DiagnosticResult<BasicValueEnum<'ctx>> {
        match value {
            LiteralValue::Bool(b) => Ok(self.bool_t.const_int(*b as u64, false).into()),
            LiteralValue::Int(i) => Ok(self.i32_t.const_int(*i as i64 as u64, true).into()),
            LiteralValue::Float(f) => Ok(self.f32_t.const_float(*f as f64).into()),
            LiteralValue::String(s) => {
                let chars = self.string_constant(s);
                let object = self.create_object("string", &[])?;
                self.builder
                    .build_call(self.string_load_fn(), &[object.into(), chars.into()], "")
                    .map_err(llvm_error)?;
                Ok(object.into())
            }
        }
    }

    fn emit_variable(
        &self,
        ctx: &FunctionCtx<'ctx>,
        variable: &VariableSymbol,
    ) -> DiagnosticResult<BasicValueEnum<'ctx>> {
        if let VariableKind::Parameter(ordinal) = variable.kind {
            return ctx
                .function
                .get_nth_param(ordinal as u32)
                .ok_or_else(|| {
                    Diagnostic::error(
                        TAG,
                        ErrorKind::NotImplemented,
                        format!("missing parameter {}", variable.name),
                    )
                });
        }

        let name = self.id_of_variable(variable);
        if variable.is_global() {
            let globals = self.globals.borrow();
            let slot = globals.get(&name).ok_or_else(|| {
                Diagnostic::error(
                    TAG,
                    ErrorKind::NotImplemented,
                    format!("unknown global \"{}\"", name),
                )
            })?;
            return self
                .builder
                .build_load(self.ir_type(&slot.ty), slot.ptr.as_pointer_value(), &name)
                .map_err(llvm_error);
        }

        let local = ctx.locals.get(&name).ok_or_else(|| {
            Diagnostic::error(
                TAG,
                ErrorKind::NotImplemented,
                format!("unknown local \"{}\"", name),
            )
        })?;
        self.builder
            .build_load(self.ir_type(&local.ty), local.ptr, &name)
            .map_err(llvm_error)
    }

    // --- stores ---------------------------------------------------------

    fn emit_assignment(
        &self,
        ctx: &mut FunctionCtx<'ctx>,
        variable: &VariableSymbol,
        value_expression: &BoundExpression,
    ) -> DiagnosticResult<BasicValueEnum<'ctx>> {
        let name = self.id_of_variable(variable);
        let value = self.emit_expression(ctx, value_expression)?;

        // Retain on copy.
        if value_expression.is_persistent() && value_expression.ty().is_object() {
            self.create_reference(value, &format!("variable assignment [{}]", name))?;
        }

        if variable.is_global() {
            let (ptr, ty) = {
                let globals = self.globals.borrow();
                let slot = globals.get(&name).ok_or_else(|| {
                    Diagnostic::error(
                        TAG,
                        ErrorKind::NotImplemented,
                        format!("unknown global \"{}\"", name),
                    )
                })?;
                (slot.ptr.as_pointer_value(), slot.ty.clone())
            };
            // Release whatever the slot held before this store.
            if ty.is_object() {
                let old = self
                    .builder
                    .build_load(self.ir_type(&ty), ptr, &format!("{}.old", name))
                    .map_err(llvm_error)?;
                self.destroy_reference(old, &format!("previous value of [{}]", name))?;
            }
            self.builder.build_store(ptr, value).map_err(llvm_error)?;
        } else {
            let (ptr, ty) = {
                let local = ctx.locals.get(&name).ok_or_else(|| {
                    Diagnostic::error(
                        TAG,
                        ErrorKind::NotImplemented,
                        format!("unknown local \"{}\"", name),
                    )
                })?;
                (local.ptr, local.ty.clone())
            };
            if ty.is_object() {
                let old = self
                    .builder
                    .build_load(self.ir_type(&ty), ptr, &format!("{}.old", name))
                    .map_err(llvm_error)?;
                self.destroy_reference(old, &format!("previous value of [{}]", name))?;
            }
            self.builder.build_store(ptr, value).map_err(llvm_error)?;
            if let Some(local) = ctx.locals.get_mut(&name) {
                local.is_set = true;
            }
        }

        // The assignment is itself an expression; for objects the
        // surfaced value is a fresh copy and needs its own reference.
        if variable.ty.is_object() {
            self.create_reference(value, "assignment value copy")?;
        }
        Ok(value)
    }

    // --- arrays ---------------------------------------------------------

    fn emit_array_access(
        &self,
        ctx: &mut FunctionCtx<'ctx>,
        base: &BoundExpression,
        index: &BoundExpression,
        element_type: &TypeSymbol,
    ) -> DiagnosticResult<BasicValueEnum<'ctx>> {
        let base_value = self.emit_expression(ctx, base)?;
        let index_value = self.emit_expression(ctx, index)?;

        if element_type.is_object() {
            let call = self
                .builder
                .build_call(
                    self.array_get_ptr_fn(),
                    &[base_value.into(), index_value.into()],
                    "elem",
                )
                .map_err(llvm_error)?;
            return self.call_value(call);
        }
        if *element_type == TypeSymbol::Float {
            let call = self
                .builder
                .build_call(
                    self.array_get_f32_fn(),
                    &[base_value.into(), index_value.into()],
                    "elem",
                )
                .map_err(llvm_error)?;
            return self.call_value(call);
        }

        let call = self
            .builder
            .build_call(
                self.array_get_raw_fn(),
                &[base_value.into(), index_value.into()],
                "slot",
            )
            .map_err(llvm_error)?;
        let slot = self.call_value(call)?.into_int_value();
        let truncated = self
            .builder
            .build_int_truncate(slot, self.ir_type(element_type).into_int_type(), "elem")
            .map_err(llvm_error)?;
        Ok(truncated.into())
    }

    fn emit_array_assignment(
        &self,
        ctx: &mut FunctionCtx<'ctx>,
        base: &BoundExpression,
        index: &BoundExpression,
        value: &BoundExpression,
        element_type: &TypeSymbol,
    ) -> DiagnosticResult<BasicValueEnum<'ctx>> {
        let base_value = self.emit_expression(ctx, base)?;
        let index_value = self.emit_expression(ctx, index)?;
        let element_value = self.emit_expression(ctx, value)?;

        if element_type.is_object() {
            // The runtime store retains the new element and releases the
            // old one, so a transient value keeps its own +1 for the
            // surrounding statement to drop.
            self.builder
                .build_call(
                    self.array_set_ptr_fn(),
                    &[base_value.into(), index_value.into(), element_value.into()],
                    "",
                )
                .map_err(llvm_error)?;
            if value.is_persistent() {
                self.create_reference(element_value, "assignment value copy")?;
            }
        } else if *element_type == TypeSymbol::Float {
            self.builder
                .build_call(
                    self.array_set_f32_fn(),
                    &[base_value.into(), index_value.into(), element_value.into()],
                    "",
                )
                .map_err(llvm_error)?;
        } else {
            let widened = self
                .builder
                .build_int_z_extend(element_value.into_int_value(), self.i64_t, "slot")
                .map_err(llvm_error)?;
            self.builder
                .build_call(
                    self.array_set_raw_fn(),
                    &[base_value.into(), index_value.into(), widened.into()],
                    "",
                )
                .map_err(llvm_error)?;
        }
        Ok(element_value)
    }

    fn emit_make_array(
        &self,
        ctx: &mut FunctionCtx<'ctx>,
        element_type: &TypeSymbol,
        length: &BoundExpression,
    ) -> DiagnosticResult<BasicValueEnum<'ctx>> {
        let length_value = self.emit_expression(ctx, length)?;
        let is_object = self
            .bool_t
            .const_int(element_type.is_object() as u64, false);
        let object = self.create_object("array", &[length_value.into(), is_object.into()])?;
        Ok(object.into())
    }

    // --- calls ----------------------------------------------------------

    fn emit_call(
        &self,
        ctx: &mut FunctionCtx<'ctx>,
        function: &FunctionSymbol,
        arguments: &[BoundExpression],
    ) -> DiagnosticResult<Option<BasicValueEnum<'ctx>>> {
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            let value = self.emit_expression(ctx, argument)?;
            // Pass-into-parameter retain: the callee owns one reference
            // per object argument and releases it on its own return path.
            if argument.is_persistent() && argument.ty().is_object() {
                self.create_reference(value, "argument copy")?;
            }
            values.push(value);
        }

        let id = self.id_of_function(function);
        let fn_value = self.functions.borrow().get(&id).copied().ok_or_else(|| {
            Diagnostic::error(
                TAG,
                ErrorKind::UndefinedFunctionCall,
                format!("no emitted function for \"{}\"", function.name),
            )
        })?;

        let meta: Vec<BasicMetadataValueEnum> = values.iter().map(|v| (*v).into()).collect();
        let call = self
            .builder
            .build_call(fn_value, &meta, "")
            .map_err(llvm_error)?;
        let result = call.try_as_basic_value().left();

        // Builtins do not participate in the ARC protocol, so their
        // object arguments are cleaned up by the caller.
        if function.builtin {
            for (value, argument) in values.iter().zip(arguments) {
                if argument.ty().is_object() {
                    self.destroy_reference(
                        *value,
                        &format!("builtin argument cleanup [{}]", function.name),
                    )?;
                }
            }
        }

        Ok(result)
    }

    fn emit_type_call(
        &self,
        ctx: &mut FunctionCtx<'ctx>,
        base: &BoundExpression,
        method: &str,
        arguments: &[BoundExpression],
    ) -> DiagnosticResult<Option<BasicValueEnum<'ctx>>> {
        let base_value = self.emit_expression(ctx, base)?;
        let base_type = base.ty();

        let result = match method {
            methods::GET_LENGTH => {
                let length_fn = if base_type == TypeSymbol::String {
                    self.string_get_length_fn()
                } else {
                    self.array_get_length_fn()
                };
                let call = self
                    .builder
                    .build_call(length_fn, &[base_value.into()], "len")
                    .map_err(llvm_error)?;
                Some(self.call_value(call)?)
            }
            methods::SUBSTRING => {
                let start = self.emit_expression(ctx, &arguments[0])?;
                let length = self.emit_expression(ctx, &arguments[1])?;
                let call = self
                    .builder
                    .build_call(
                        self.string_substring_fn(),
                        &[base_value.into(), start.into(), length.into()],
                        "substr",
                    )
                    .map_err(llvm_error)?;
                Some(self.call_value(call)?)
            }
            methods::PUSH => {
                let element = self.emit_expression(ctx, &arguments[0])?;
                let element_type = arguments[0].ty();
                if element_type.is_object() {
                    self.builder
                        .build_call(
                            self.array_push_ptr_fn(),
                            &[base_value.into(), element.into()],
                            "",
                        )
                        .map_err(llvm_error)?;
                    // The array now holds its own reference; release the
                    // transient handle this expression produced.
                    if !arguments[0].is_persistent() {
                        self.destroy_reference(element, "push argument cleanup")?;
                    }
                } else if element_type == TypeSymbol::Float {
                    self.builder
                        .build_call(
                            self.array_push_f32_fn(),
                            &[base_value.into(), element.into()],
                            "",
                        )
                        .map_err(llvm_error)?;
                } else {
                    let widened = self
                        .builder
                        .build_int_z_extend(element.into_int_value(), self.i64_t, "slot")
                        .map_err(llvm_error)?;
                    self.builder
                        .build_call(
                            self.array_push_raw_fn(),
                            &[base_value.into(), widened.into()],
                            "",
                        )
                        .map_err(llvm_error)?;
                }
                None
            }
            methods::START | methods::JOIN | methods::KILL => {
                self.builder
                    .build_call(self.thread_method_fn(method), &[base_value.into()], "")
                    .map_err(llvm_error)?;
                None
            }
            other => {
                return Err(Diagnostic::error(
                    TAG,
                    ErrorKind::NotImplemented,
                    format!("type function \"{}\" has no emission", other),
                ));
            }
        };

        // A transient receiver was produced solely for this call.
        if !base.is_persistent() && base_type.is_object() {
            self.destroy_reference(base_value, "type call receiver cleanup")?;
        }

        Ok(result)
    }

    fn emit_thread(&self, function: &FunctionSymbol) -> DiagnosticResult<BasicValueEnum<'ctx>> {
        let id = self.id_of_function(function);
        let fn_value = self.functions.borrow().get(&id).copied().ok_or_else(|| {
            Diagnostic::error(
                TAG,
                ErrorKind::UndefinedFunctionCall,
                format!("no emitted function for \"{}\"", function.name),
            )
        })?;
        let fn_ptr = fn_value.as_global_value().as_pointer_value();
        let object = self.create_object("thread", &[fn_ptr.into()])?;
        Ok(object.into())
    }

    // --- operators ------------------------------------------------------

    fn emit_unary(
        &self,
        kind: BoundUnaryOperatorKind,
        operand_type: &TypeSymbol,
        value: BasicValueEnum<'ctx>,
    ) -> DiagnosticResult<BasicValueEnum<'ctx>> {
        match kind {
            BoundUnaryOperatorKind::Identity => Ok(value),
            BoundUnaryOperatorKind::Negation => {
                if *operand_type == TypeSymbol::Int {
                    let zero = self.i32_t.const_int(0, false);
                    let negated = self
                        .builder
                        .build_int_sub(zero, value.into_int_value(), "neg")
                        .map_err(llvm_error)?;
                    Ok(negated.into())
                } else {
                    let negated = self
                        .builder
                        .build_float_neg(value.into_float_value(), "neg")
                        .map_err(llvm_error)?;
                    Ok(negated.into())
                }
            }
            BoundUnaryOperatorKind::LogicalNegation => {
                let nonzero = self
                    .builder
                    .build_int_compare(
                        IntPredicate::NE,
                        value.into_int_value(),
                        self.bool_t.const_int(0, false),
                        "nonzero",
                    )
                    .map_err(llvm_error)?;
                let inverted = self
                    .builder
                    .build_xor(nonzero, self.bool_t.const_int(1, false), "not")
                    .map_err(llvm_error)?;
                Ok(inverted.into())
            }
        }
    }

    fn emit_binary(
        &self,
        ctx: &mut FunctionCtx<'ctx>,
        left_expression: &BoundExpression,
        op: &BoundBinaryOperator,
        right_expression: &BoundExpression,
    ) -> DiagnosticResult<BasicValueEnum<'ctx>> {
        let left = self.emit_expression(ctx, left_expression)?;
        let right = self.emit_expression(ctx, right_expression)?;

        use BoundBinaryOperatorKind::*;
        let is_int = op.left_type == TypeSymbol::Int;
        let is_float = op.left_type == TypeSymbol::Float;
        let is_bool = op.left_type == TypeSymbol::Bool;
        let is_string = op.left_type == TypeSymbol::String;

        // String operators go through the runtime; release transient
        // operands once they are consumed.
        if is_string {
            return match op.kind {
                Addition => {
                    let call = self
                        .builder
                        .build_call(
                            self.string_concat_fn(),
                            &[left.into(), right.into()],
                            "concat",
                        )
                        .map_err(llvm_error)?;
                    let result = self.call_value(call)?;
                    if !left_expression.is_persistent() {
                        self.destroy_reference(left, "string concat cleanup (left)")?;
                    }
                    if !right_expression.is_persistent() {
                        self.destroy_reference(right, "string concat cleanup (right)")?;
                    }
                    Ok(result)
                }
                Equals | NotEquals => {
                    let call = self
                        .builder
                        .build_call(
                            self.string_equal_fn(),
                            &[left.into(), right.into()],
                            "eq",
                        )
                        .map_err(llvm_error)?;
                    let raw = self.call_value(call)?.into_int_value();
                    if !left_expression.is_persistent() {
                        self.destroy_reference(left, "string compare cleanup (left)")?;
                    }
                    if !right_expression.is_persistent() {
                        self.destroy_reference(right, "string compare cleanup (right)")?;
                    }
                    let predicate = if op.kind == Equals {
                        IntPredicate::NE
                    } else {
                        IntPredicate::EQ
                    };
                    let result = self
                        .builder
                        .build_int_compare(
                            predicate,
                            raw,
                            self.i32_t.const_int(0, false),
                            "cmp",
                        )
                        .map_err(llvm_error)?;
                    Ok(result.into())
                }
                _ => Err(Diagnostic::error(
                    TAG,
                    ErrorKind::NotImplemented,
                    "string operator has no emission",
                )),
            };
        }

        if is_float {
            let l = left.into_float_value();
            let r = right.into_float_value();
            let result: BasicValueEnum = match op.kind {
                Addition => self.builder.build_float_add(l, r, "add").map_err(llvm_error)?.into(),
                Subtraction => self.builder.build_float_sub(l, r, "sub").map_err(llvm_error)?.into(),
                Multiplication => self.builder.build_float_mul(l, r, "mul").map_err(llvm_error)?.into(),
                Division => self.builder.build_float_div(l, r, "div").map_err(llvm_error)?.into(),
                Modulus => self.builder.build_float_rem(l, r, "rem").map_err(llvm_error)?.into(),
                Equals => self.float_compare(FloatPredicate::OEQ, l, r)?.into(),
                NotEquals => self.float_compare(FloatPredicate::ONE, l, r)?.into(),
                Less => self.float_compare(FloatPredicate::OLT, l, r)?.into(),
                LessOrEquals => self.float_compare(FloatPredicate::OLE, l, r)?.into(),
                Greater => self.float_compare(FloatPredicate::OGT, l, r)?.into(),
                GreaterOrEquals => self.float_compare(FloatPredicate::OGE, l, r)?.into(),
                _ => {
                    return Err(Diagnostic::error(
                        TAG,
                        ErrorKind::NotImplemented,
                        "float operator has no emission",
                    ));
                }
            };
            return Ok(result);
        }

        if is_int || is_bool {
            let l = left.into_int_value();
            let r = right.into_int_value();
            let result: BasicValueEnum = match op.kind {
                Addition => self.builder.build_int_add(l, r, "add").map_err(llvm_error)?.into(),
                Subtraction => self.builder.build_int_sub(l, r, "sub").map_err(llvm_error)?.into(),
                Multiplication => self.builder.build_int_mul(l, r, "mul").map_err(llvm_error)?.into(),
                Division => self
                    .builder
                    .build_int_signed_div(l, r, "div")
                    .map_err(llvm_error)?
                    .into(),
                Modulus => self
                    .builder
                    .build_int_signed_rem(l, r, "rem")
                    .map_err(llvm_error)?
                    .into(),
                BitwiseAnd | LogicalAnd => {
                    self.builder.build_and(l, r, "and").map_err(llvm_error)?.into()
                }
                BitwiseOr | LogicalOr => {
                    self.builder.build_or(l, r, "or").map_err(llvm_error)?.into()
                }
                BitwiseXor => self.builder.build_xor(l, r, "xor").map_err(llvm_error)?.into(),
                Equals => self.int_compare(IntPredicate::EQ, l, r)?.into(),
                NotEquals => self.int_compare(IntPredicate::NE, l, r)?.into(),
                Less => self.int_compare(IntPredicate::SLT, l, r)?.into(),
                LessOrEquals => self.int_compare(IntPredicate::SLE, l, r)?.into(),
                Greater => self.int_compare(IntPredicate::SGT, l, r)?.into(),
                GreaterOrEquals => self.int_compare(IntPredicate::SGE, l, r)?.into(),
            };
            return Ok(result);
        }

        Err(Diagnostic::error(
            TAG,
            ErrorKind::NotImplemented,
            format!("binary operator on \"{}\" has no emission", op.left_type),
        ))
    }

    fn int_compare(
        &self,
        predicate: IntPredicate,
        l: inkwell::values::IntValue<'ctx>,
        r: inkwell::values::IntValue<'ctx>,
    ) -> DiagnosticResult<inkwell::values::IntValue<'ctx>> {
        self.builder
            .build_int_compare(predicate, l, r, "cmp")
            .map_err(llvm_error)
    }

    fn float_compare(
        &self,
        predicate: FloatPredicate,
        l: inkwell::values::FloatValue<'ctx>,
        r: inkwell::values::FloatValue<'ctx>,
    ) -> DiagnosticResult<inkwell::values::IntValue<'ctx>> {
        self.builder
            .build_float_compare(predicate, l, r, "cmp")
            .map_err(llvm_error)
    }

    fn emit_ternary(
        &self,
        ctx: &mut FunctionCtx<'ctx>,
        condition: &BoundExpression,
        then_branch: &BoundExpression,
        else_branch: &BoundExpression,
    ) -> DiagnosticResult<BasicValueEnum<'ctx>> {
        let result_type = then_branch.ty();
        let cond = self.emit_expression(ctx, condition)?.into_int_value();

        let then_block = self.context.append_basic_block(ctx.function, "tern.then");
        let else_block = self.context.append_basic_block(ctx.function, "tern.else");
        let merge_block = self.context.append_basic_block(ctx.function, "tern.merge");
        self.builder
            .build_conditional_branch(cond, then_block, else_block)
            .map_err(llvm_error)?;

        // Branches evaluate lazily. For object results, normalize both
        // arms to owned (+1) handles so the merged value is uniformly
        // transient.
        self.builder.position_at_end(then_block);
        let then_value = self.emit_expression(ctx, then_branch)?;
        if result_type.is_object() && then_branch.is_persistent() {
            self.create_reference(then_value, "ternary branch copy")?;
        }
        let then_end = self.builder.get_insert_block().ok_or_else(|| {
            Diagnostic::error(TAG, ErrorKind::NotImplemented, "builder left a block")
        })?;
        self.builder
            .build_unconditional_branch(merge_block)
            .map_err(llvm_error)?;

        self.builder.position_at_end(else_block);
        let else_value = self.emit_expression(ctx, else_branch)?;
        if result_type.is_object() && else_branch.is_persistent() {
            self.create_reference(else_value, "ternary branch copy")?;
        }
        let else_end = self.builder.get_insert_block().ok_or_else(|| {
            Diagnostic::error(TAG, ErrorKind::NotImplemented, "builder left a block")
        })?;
        self.builder
            .build_unconditional_branch(merge_block)
            .map_err(llvm_error)?;

        self.builder.position_at_end(merge_block);
        let phi = self
            .builder
            .build_phi(self.ir_type(&result_type), "tern")
            .map_err(llvm_error)?;
        phi.add_incoming(&[(&then_value, then_end), (&else_value, else_end)]);
        Ok(phi.as_basic_value())
    }

    // --- conversions ----------------------------------------------------

    fn emit_conversion(
        &self,
        ctx: &mut FunctionCtx<'ctx>,
        to: &TypeSymbol,
        inner: &BoundExpression,
    ) -> DiagnosticResult<BasicValueEnum<'ctx>> {
        let value = self.emit_expression(ctx, inner)?;
        let from = inner.ty();

        // Object-to-object conversions preserve pointer identity; with
        // opaque pointers they are the value itself.
        if to.is_object() && from.is_object() {
            return Ok(value);
        }

        match to {
            TypeSymbol::Any => {
                // Box the primitive into its runtime class.
                let class = match from {
                    TypeSymbol::Bool => "bool",
                    TypeSymbol::Byte => "byte",
                    TypeSymbol::Int => "int",
                    TypeSymbol::Float => "float",
                    _ => {
                        return Err(self.no_conversion(&from, to));
                    }
                };
                let boxed = self.create_object(class, &[value.into()])?;
                Ok(boxed.into())
            }

            TypeSymbol::String => match from {
                TypeSymbol::Bool => {
                    let true_chars = self.string_constant("true");
                    let false_chars = self.string_constant("false");
                    let chars = self
                        .builder
                        .build_select(value.into_int_value(), true_chars, false_chars, "boolstr")
                        .map_err(llvm_error)?;
                    let object = self.create_object("string", &[])?;
                    self.builder
                        .build_call(self.string_load_fn(), &[object.into(), chars.into()], "")
                        .map_err(llvm_error)?;
                    Ok(object.into())
                }
                TypeSymbol::Int => self.emit_formatted_string("%d", value.into()),
                TypeSymbol::Float => {
                    // Promote to double; snprintf is varargs.
                    let wide = self
                        .builder
                        .build_float_ext(value.into_float_value(), self.f64_t, "wide")
                        .map_err(llvm_error)?;
                    self.emit_formatted_string("%g", wide.into())
                }
                _ => Err(self.no_conversion(&from, to)),
            },

            TypeSymbol::Bool => match from {
                TypeSymbol::String => {
                    let buffer = self.string_buffer(value)?;
                    let call = self
                        .builder
                        .build_call(
                            self.strcmp_fn(),
                            &[buffer.into(), self.string_constant("true").into()],
                            "cmp",
                        )
                        .map_err(llvm_error)?;
                    let raw = self.call_value(call)?.into_int_value();
                    self.release_consumed(inner, value, "string to bool conversion cleanup")?;
                    let result = self
                        .builder
                        .build_int_compare(
                            IntPredicate::EQ,
                            raw,
                            self.i32_t.const_int(0, false),
                            "isbool",
                        )
                        .map_err(llvm_error)?;
                    Ok(result.into())
                }
                TypeSymbol::Any => self.unbox(inner, value, self.bool_get_value_fn()),
                _ => Err(self.no_conversion(&from, to)),
            },

            TypeSymbol::Int => match from {
                TypeSymbol::String => {
                    let buffer = self.string_buffer(value)?;
                    let call = self
                        .builder
                        .build_call(self.atoi_fn(), &[buffer.into()], "parsed")
                        .map_err(llvm_error)?;
                    let result = self.call_value(call)?;
                    self.release_consumed(inner, value, "string to int conversion cleanup")?;
                    Ok(result)
                }
                TypeSymbol::Any => self.unbox(inner, value, self.int_get_value_fn()),
                _ => Err(self.no_conversion(&from, to)),
            },

            TypeSymbol::Float => match from {
                TypeSymbol::String => {
                    let buffer = self.string_buffer(value)?;
                    let call = self
                        .builder
                        .build_call(self.atof_fn(), &[buffer.into()], "parsed")
                        .map_err(llvm_error)?;
                    let wide = self.call_value(call)?.into_float_value();
                    let result = self
                        .builder
                        .build_float_trunc(wide, self.f32_t, "narrow")
                        .map_err(llvm_error)?;
                    self.release_consumed(inner, value, "string to float conversion cleanup")?;
                    Ok(result.into())
                }
                TypeSymbol::Any => self.unbox(inner, value, self.float_get_value_fn()),
                _ => Err(self.no_conversion(&from, to)),
            },

            TypeSymbol::Byte => match from {
                TypeSymbol::Any => self.unbox(inner, value, self.byte_get_value_fn()),
                _ => Err(self.no_conversion(&from, to)),
            },

            _ => Err(self.no_conversion(&from, to)),
        }
    }

    fn no_conversion(&self, from: &TypeSymbol, to: &TypeSymbol) -> Box<Diagnostic> {
        Diagnostic::error(
            TAG,
            ErrorKind::NotImplemented,
            format!("no conversion emission from \"{}\" to \"{}\"", from, to),
        )
    }

    fn string_buffer(&self, value: BasicValueEnum<'ctx>) -> DiagnosticResult<BasicValueEnum<'ctx>> {
        let call = self
            .builder
            .build_call(self.string_get_buffer_fn(), &[value.into()], "buf")
            .map_err(llvm_error)?;
        self.call_value(call)
    }

    /// Reads a boxed primitive out of an `any` and releases the box if it
    /// was transient.
    fn unbox(
        &self,
        inner: &BoundExpression,
        value: BasicValueEnum<'ctx>,
        accessor: inkwell::values::FunctionValue<'ctx>,
    ) -> DiagnosticResult<BasicValueEnum<'ctx>> {
        let call = self
            .builder
            .build_call(accessor, &[value.into()], "unboxed")
            .map_err(llvm_error)?;
        let result = self.call_value(call)?;
        self.release_consumed(inner, value, "unboxing conversion cleanup")?;
        Ok(result)
    }

    fn release_consumed(
        &self,
        inner: &BoundExpression,
        value: BasicValueEnum<'ctx>,
        comment: &str,
    ) -> DiagnosticResult<()> {
        if !inner.is_persistent() {
            self.destroy_reference(value, comment)?;
        }
        Ok(())
    }

    /// Two-pass `snprintf` rendering of a number into a fresh string
    /// object: measure, allocate, format, load, free the scratch buffer.
    fn emit_formatted_string(
        &self,
        format: &str,
        value: BasicMetadataValueEnum<'ctx>,
    ) -> DiagnosticResult<BasicValueEnum<'ctx>> {
        let snprintf = self.snprintf_fn();
        let format_chars = self.string_constant(format);

        let measure = self
            .builder
            .build_call(
                snprintf,
                &[
                    self.ptr_t.const_null().into(),
                    self.i64_t.const_int(0, false).into(),
                    format_chars.into(),
                    value,
                ],
                "len",
            )
            .map_err(llvm_error)?;
        let length = self.call_value(measure)?.into_int_value();
        let with_nul = self
            .builder
            .build_int_add(length, self.i32_t.const_int(1, false), "len1")
            .map_err(llvm_error)?;
        let size = self
            .builder
            .build_int_z_extend(with_nul, self.i64_t, "size")
            .map_err(llvm_error)?;

        let scratch_call = self
            .builder
            .build_call(self.malloc_fn(), &[size.into()], "scratch")
            .map_err(llvm_error)?;
        let scratch = self.call_value(scratch_call)?;

        self.builder
            .build_call(
                snprintf,
                &[scratch.into(), size.into(), format_chars.into(), value],
                "",
            )
            .map_err(llvm_error)?;

        let object = self.create_object("string", &[])?;
        self.builder
            .build_call(self.string_load_fn(), &[object.into(), scratch.into()], "")
            .map_err(llvm_error)?;
        self.builder
            .build_call(self.free_fn(), &[scratch.into()], "")
            .map_err(llvm_error)?;
        Ok(object.into())
    }
}
