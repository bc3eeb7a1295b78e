//! Object header shared by every runtime class.

use std::sync::atomic::AtomicU32;

// Class tags stored in the header; `UnregisterReference` dispatches on
// them when a count reaches zero.
pub const CLASS_STRING: u32 = 1;
pub const CLASS_INT: u32 = 2;
pub const CLASS_FLOAT: u32 = 3;
pub const CLASS_BOOL: u32 = 4;
pub const CLASS_BYTE: u32 = 5;
pub const CLASS_ARRAY: u32 = 6;
pub const CLASS_THREAD: u32 = 7;

/// Every heap object starts with this header; the ARC entry points
/// operate on it uniformly regardless of the concrete class.
#[repr(C)]
pub struct ObjHeader {
    pub rc: AtomicU32,
    pub class: u32,
}

/// Allocates a zeroed object of class `class` with the given initial
/// reference count. The caller writes the class payload afterwards.
///
/// # Safety
/// `T` must be a `#[repr(C)]` struct whose first field is `ObjHeader`.
pub(crate) unsafe fn alloc_object<T>(class: u32, initial_rc: u32) -> *mut T {
    let size = std::mem::size_of::<T>();
    let p = libc::calloc(1, size) as *mut T;
    if p.is_null() {
        return std::ptr::null_mut();
    }
    let header = p as *mut ObjHeader;
    std::ptr::write(
        header,
        ObjHeader {
            rc: AtomicU32::new(initial_rc),
            class,
        },
    );
    p
}
