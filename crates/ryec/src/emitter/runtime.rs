//! The runtime surface consumed by emitted IR.
//!
//! Centralizes every extern symbol name the emitter can reference and
//! lazily declares each function in the module on first use so the ABI
//! types stay consistent across call sites. All symbols are implemented
//! by the `rye-runtime` library (or libc, for the C group).
//!
//! Object allocators (`*_new`) return a reference count of zero; the
//! emitter's `create_object` immediately registers the initial
//! reference. Helpers that store objects (`array_set_ptr`,
//! `array_push_ptr`) retain internally and release what they overwrite.

use super::Emitter;
use inkwell::types::FunctionType;
use inkwell::values::FunctionValue;

/// Runtime symbol names.
pub mod names {
    // ARC entry points.
    pub const REGISTER_REFERENCE: &str = "RegisterReference";
    pub const UNREGISTER_REFERENCE: &str = "UnregisterReference";
    pub const REGISTER_REFERENCE_VERBOSE: &str = "RegisterReferenceVerbose";
    pub const UNREGISTER_REFERENCE_VERBOSE: &str = "UnregisterReferenceVerbose";

    // C library.
    pub const MALLOC: &str = "malloc";
    pub const FREE: &str = "free";
    pub const SNPRINTF: &str = "snprintf";
    pub const STRCMP: &str = "strcmp";
    pub const ATOI: &str = "atoi";
    pub const ATOF: &str = "atof";

    // String class.
    pub const STRING_NEW: &str = "string_new";
    pub const STRING_LOAD: &str = "string_load";
    pub const STRING_GET_BUFFER: &str = "string_get_buffer";
    pub const STRING_GET_LENGTH: &str = "string_get_length";
    pub const STRING_CONCAT: &str = "string_concat";
    pub const STRING_EQUAL: &str = "string_equal";
    pub const STRING_SUBSTRING: &str = "string_substring";

    // Boxed primitives.
    pub const INT_NEW: &str = "int_new";
    pub const INT_GET_VALUE: &str = "int_get_value";
    pub const FLOAT_NEW: &str = "float_new";
    pub const FLOAT_GET_VALUE: &str = "float_get_value";
    pub const BOOL_NEW: &str = "bool_new";
    pub const BOOL_GET_VALUE: &str = "bool_get_value";
    pub const BYTE_NEW: &str = "byte_new";
    pub const BYTE_GET_VALUE: &str = "byte_get_value";

    // Arrays: primitive elements travel in 8-byte raw slots except f32,
    // which has dedicated accessors; object elements use the ptr family.
    pub const ARRAY_NEW: &str = "array_new";
    pub const ARRAY_GET_LENGTH: &str = "array_get_length";
    pub const ARRAY_GET_RAW: &str = "array_get_raw";
    pub const ARRAY_SET_RAW: &str = "array_set_raw";
    pub const ARRAY_GET_F32: &str = "array_get_f32";
    pub const ARRAY_SET_F32: &str = "array_set_f32";
    pub const ARRAY_GET_PTR: &str = "array_get_ptr";
    pub const ARRAY_SET_PTR: &str = "array_set_ptr";
    pub const ARRAY_PUSH_RAW: &str = "array_push_raw";
    pub const ARRAY_PUSH_F32: &str = "array_push_f32";
    pub const ARRAY_PUSH_PTR: &str = "array_push_ptr";

    // Threads.
    pub const THREAD_NEW: &str = "thread_new";
    pub const THREAD_START: &str = "thread_start";
    pub const THREAD_JOIN: &str = "thread_join";
    pub const THREAD_KILL: &str = "thread_kill";
}

impl<'ctx> Emitter<'ctx> {
    fn declare(&self, name: &str, fn_type: FunctionType<'ctx>) -> FunctionValue<'ctx> {
        self.module
            .get_function(name)
            .unwrap_or_else(|| self.module.add_function(name, fn_type, None))
    }

    // --- ARC ------------------------------------------------------------

    pub(crate) fn register_reference_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self
            .context
            .void_type()
            .fn_type(&[self.ptr_t.into()], false);
        self.declare(names::REGISTER_REFERENCE, fn_type)
    }

    pub(crate) fn unregister_reference_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self
            .context
            .void_type()
            .fn_type(&[self.ptr_t.into()], false);
        self.declare(names::UNREGISTER_REFERENCE, fn_type)
    }

    pub(crate) fn register_reference_verbose_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self
            .context
            .void_type()
            .fn_type(&[self.ptr_t.into(), self.ptr_t.into()], false);
        self.declare(names::REGISTER_REFERENCE_VERBOSE, fn_type)
    }

    pub(crate) fn unregister_reference_verbose_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self
            .context
            .void_type()
            .fn_type(&[self.ptr_t.into(), self.ptr_t.into()], false);
        self.declare(names::UNREGISTER_REFERENCE_VERBOSE, fn_type)
    }

    // --- C library ------------------------------------------------------

    pub(crate) fn malloc_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self.ptr_t.fn_type(&[self.i64_t.into()], false);
        self.declare(names::MALLOC, fn_type)
    }

    pub(crate) fn free_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self
            .context
            .void_type()
            .fn_type(&[self.ptr_t.into()], false);
        self.declare(names::FREE, fn_type)
    }

    pub(crate) fn snprintf_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self.i32_t.fn_type(
            &[self.ptr_t.into(), self.i64_t.into(), self.ptr_t.into()],
            true,
        );
        self.declare(names::SNPRINTF, fn_type)
    }

    pub(crate) fn strcmp_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self
            .i32_t
            .fn_type(&[self.ptr_t.into(), self.ptr_t.into()], false);
        self.declare(names::STRCMP, fn_type)
    }

    pub(crate) fn atoi_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self.i32_t.fn_type(&[self.ptr_t.into()], false);
        self.declare(names::ATOI, fn_type)
    }

    pub(crate) fn atof_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self.f64_t.fn_type(&[self.ptr_t.into()], false);
        self.declare(names::ATOF, fn_type)
    }

    // --- string class ---------------------------------------------------

    pub(crate) fn string_load_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self
            .context
            .void_type()
            .fn_type(&[self.ptr_t.into(), self.ptr_t.into()], false);
        self.declare(names::STRING_LOAD, fn_type)
    }

    pub(crate) fn string_get_buffer_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self.ptr_t.fn_type(&[self.ptr_t.into()], false);
        self.declare(names::STRING_GET_BUFFER, fn_type)
    }

    pub(crate) fn string_get_length_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self.i32_t.fn_type(&[self.ptr_t.into()], false);
        self.declare(names::STRING_GET_LENGTH, fn_type)
    }

    pub(crate) fn string_concat_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self
            .ptr_t
            .fn_type(&[self.ptr_t.into(), self.ptr_t.into()], false);
        self.declare(names::STRING_CONCAT, fn_type)
    }

    pub(crate) fn string_equal_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self
            .i32_t
            .fn_type(&[self.ptr_t.into(), self.ptr_t.into()], false);
        self.declare(names::STRING_EQUAL, fn_type)
    }

    pub(crate) fn string_substring_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self.ptr_t.fn_type(
            &[self.ptr_t.into(), self.i32_t.into(), self.i32_t.into()],
            false,
        );
        self.declare(names::STRING_SUBSTRING, fn_type)
    }

    // --- boxed primitive accessors --------------------------------------

    pub(crate) fn int_get_value_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self.i32_t.fn_type(&[self.ptr_t.into()], false);
        self.declare(names::INT_GET_VALUE, fn_type)
    }

    pub(crate) fn float_get_value_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self.f32_t.fn_type(&[self.ptr_t.into()], false);
        self.declare(names::FLOAT_GET_VALUE, fn_type)
    }

    pub(crate) fn bool_get_value_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self.bool_t.fn_type(&[self.ptr_t.into()], false);
        self.declare(names::BOOL_GET_VALUE, fn_type)
    }

    pub(crate) fn byte_get_value_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self.i8_t.fn_type(&[self.ptr_t.into()], false);
        self.declare(names::BYTE_GET_VALUE, fn_type)
    }

    /// The allocator for a runtime class, by class name. Allocators
    /// return a zero-count object; callers register the first reference.
    pub(crate) fn class_new_fn(&self, class: &str) -> FunctionValue<'ctx> {
        match class {
            "string" => self.declare(names::STRING_NEW, self.ptr_t.fn_type(&[], false)),
            "int" => self.declare(
                names::INT_NEW,
                self.ptr_t.fn_type(&[self.i32_t.into()], false),
            ),
            "float" => self.declare(
                names::FLOAT_NEW,
                self.ptr_t.fn_type(&[self.f32_t.into()], false),
            ),
            "bool" => self.declare(
                names::BOOL_NEW,
                self.ptr_t.fn_type(&[self.bool_t.into()], false),
            ),
            "byte" => self.declare(
                names::BYTE_NEW,
                self.ptr_t.fn_type(&[self.i8_t.into()], false),
            ),
            "array" => self.declare(
                names::ARRAY_NEW,
                self.ptr_t
                    .fn_type(&[self.i32_t.into(), self.bool_t.into()], false),
            ),
            "thread" => self.declare(
                names::THREAD_NEW,
                self.ptr_t.fn_type(&[self.ptr_t.into()], false),
            ),
            other => {
                // Unknown class names cannot come out of the binder.
                unreachable!("no runtime class named {}", other)
            }
        }
    }

    // --- arrays ---------------------------------------------------------

    pub(crate) fn array_get_length_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self.i32_t.fn_type(&[self.ptr_t.into()], false);
        self.declare(names::ARRAY_GET_LENGTH, fn_type)
    }

    pub(crate) fn array_get_raw_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self
            .i64_t
            .fn_type(&[self.ptr_t.into(), self.i32_t.into()], false);
        self.declare(names::ARRAY_GET_RAW, fn_type)
    }

    pub(crate) fn array_set_raw_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self.context.void_type().fn_type(
            &[self.ptr_t.into(), self.i32_t.into(), self.i64_t.into()],
            false,
        );
        self.declare(names::ARRAY_SET_RAW, fn_type)
    }

    pub(crate) fn array_get_f32_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self
            .f32_t
            .fn_type(&[self.ptr_t.into(), self.i32_t.into()], false);
        self.declare(names::ARRAY_GET_F32, fn_type)
    }

    pub(crate) fn array_set_f32_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self.context.void_type().fn_type(
            &[self.ptr_t.into(), self.i32_t.into(), self.f32_t.into()],
            false,
        );
        self.declare(names::ARRAY_SET_F32, fn_type)
    }

    pub(crate) fn array_get_ptr_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self
            .ptr_t
            .fn_type(&[self.ptr_t.into(), self.i32_t.into()], false);
        self.declare(names::ARRAY_GET_PTR, fn_type)
    }

    pub(crate) fn array_set_ptr_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self.context.void_type().fn_type(
            &[self.ptr_t.into(), self.i32_t.into(), self.ptr_t.into()],
            false,
        );
        self.declare(names::ARRAY_SET_PTR, fn_type)
    }

    pub(crate) fn array_push_raw_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self
            .context
            .void_type()
            .fn_type(&[self.ptr_t.into(), self.i64_t.into()], false);
        self.declare(names::ARRAY_PUSH_RAW, fn_type)
    }

    pub(crate) fn array_push_f32_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self
            .context
            .void_type()
            .fn_type(&[self.ptr_t.into(), self.f32_t.into()], false);
        self.declare(names::ARRAY_PUSH_F32, fn_type)
    }

    pub(crate) fn array_push_ptr_fn(&self) -> FunctionValue<'ctx> {
        let fn_type = self
            .context
            .void_type()
            .fn_type(&[self.ptr_t.into(), self.ptr_t.into()], false);
        self.declare(names::ARRAY_PUSH_PTR, fn_type)
    }

    // --- threads --------------------------------------------------------

    pub(crate) fn thread_method_fn(&self, method: &str) -> FunctionValue<'ctx> {
        let fn_type = self
            .context
            .void_type()
            .fn_type(&[self.ptr_t.into()], false);
        let name = match method {
            "Start" => names::THREAD_START,
            "Join" => names::THREAD_JOIN,
            _ => names::THREAD_KILL,
        };
        self.declare(name, fn_type)
    }
}
