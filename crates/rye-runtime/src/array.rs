//! The array class.
//!
//! Elements live in 8-byte slots. Primitive elements travel as raw
//! zero-extended slot values (`f32` via its bit pattern, with dedicated
//! accessors); object elements store the pointer, and the setters retain
//! the new element and release the one they overwrite. Out-of-bounds
//! reads yield zero, out-of-bounds writes are dropped.

use crate::header::*;
use crate::rc::{RegisterReference, UnregisterReference};

#[repr(C)]
pub struct RyeArray {
    pub header: ObjHeader,
    pub length: i32,
    pub capacity: i32,
    pub elem_is_object: bool,
    pub data: *mut u64,
}

#[no_mangle]
pub extern "C" fn array_new(length: i32, elem_is_object: bool) -> *mut RyeArray {
    unsafe {
        let length = length.max(0);
        let a: *mut RyeArray = alloc_object(CLASS_ARRAY, 0);
        if a.is_null() {
            return a;
        }
        let capacity = length.max(4);
        (*a).length = length;
        (*a).capacity = capacity;
        (*a).elem_is_object = elem_is_object;
        (*a).data = libc::calloc(capacity as usize, 8) as *mut u64;
        a
    }
}

unsafe fn in_bounds(a: *const RyeArray, index: i32) -> bool {
    !a.is_null() && !(*a).data.is_null() && index >= 0 && index < (*a).length
}

/// # Safety
/// `a` must be null or a live array object.
#[no_mangle]
pub unsafe extern "C" fn array_get_length(a: *const RyeArray) -> i32 {
    if a.is_null() { 0 } else { (*a).length }
}

/// # Safety
/// `a` must be null or a live array object.
#[no_mangle]
pub unsafe extern "C" fn array_get_raw(a: *const RyeArray, index: i32) -> i64 {
    if !in_bounds(a, index) {
        return 0;
    }
    *(*a).data.add(index as usize) as i64
}

/// # Safety
/// `a` must be null or a live array object.
#[no_mangle]
pub unsafe extern "C" fn array_set_raw(a: *mut RyeArray, index: i32, value: i64) {
    if in_bounds(a, index) {
        *(*a).data.add(index as usize) = value as u64;
    }
}

/// # Safety
/// `a` must be null or a live array object.
#[no_mangle]
pub unsafe extern "C" fn array_get_f32(a: *const RyeArray, index: i32) -> f32 {
    if !in_bounds(a, index) {
        return 0.0;
    }
    f32::from_bits(*(*a).data.add(index as usize) as u32)
}

/// # Safety
/// `a` must be null or a live array object.
#[no_mangle]
pub unsafe extern "C" fn array_set_f32(a: *mut RyeArray, index: i32, value: f32) {
    if in_bounds(a, index) {
        *(*a).data.add(index as usize) = value.to_bits() as u64;
    }
}

/// Borrowed read of an object element; the array keeps its reference.
///
/// # Safety
/// `a` must be null or a live array object.
#[no_mangle]
pub unsafe extern "C" fn array_get_ptr(a: *const RyeArray, index: i32) -> *mut ObjHeader {
    if !in_bounds(a, index) {
        return std::ptr::null_mut();
    }
    *(*a).data.add(index as usize) as *mut ObjHeader
}

/// Stores an object element: retains the new value, releases the old.
///
/// # Safety
/// `a` must be null or a live array object; `value` null or a live
/// runtime object.
#[no_mangle]
pub unsafe extern "C" fn array_set_ptr(a: *mut RyeArray, index: i32, value: *mut ObjHeader) {
    if !in_bounds(a, index) {
        return;
    }
    let slot = (*a).data.add(index as usize);
    RegisterReference(value);
    UnregisterReference(*slot as *mut ObjHeader);
    *slot = value as u64;
}

unsafe fn reserve_one(a: *mut RyeArray) -> bool {
    if a.is_null() || (*a).data.is_null() {
        return false;
    }
    if (*a).length < (*a).capacity {
        return true;
    }
    let new_capacity = ((*a).capacity * 2).max(4);
    let grown = libc::realloc((*a).data as *mut libc::c_void, new_capacity as usize * 8) as *mut u64;
    if grown.is_null() {
        return false;
    }
    // Zero the fresh tail so raw reads of unwritten slots stay defined.
    std::ptr::write_bytes(
        grown.add((*a).capacity as usize),
        0,
        (new_capacity - (*a).capacity) as usize,
    );
    (*a).data = grown;
    (*a).capacity = new_capacity;
    true
}

/// # Safety
/// `a` must be null or a live array object.
#[no_mangle]
pub unsafe extern "C" fn array_push_raw(a: *mut RyeArray, value: i64) {
    if !reserve_one(a) {
        return;
    }
    *(*a).data.add((*a).length as usize) = value as u64;
    (*a).length += 1;
}

/// # Safety
/// `a` must be null or a live array object.
#[no_mangle]
pub unsafe extern "C" fn array_push_f32(a: *mut RyeArray, value: f32) {
    array_push_raw(a, value.to_bits() as i64);
}

/// Appends an object element, retaining it on behalf of the array.
///
/// # Safety
/// `a` must be null or a live array object; `value` null or a live
/// runtime object.
#[no_mangle]
pub unsafe extern "C" fn array_push_ptr(a: *mut RyeArray, value: *mut ObjHeader) {
    if !reserve_one(a) {
        return;
    }
    RegisterReference(value);
    *(*a).data.add((*a).length as usize) = value as u64;
    (*a).length += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn raw_elements_round_trip() {
        unsafe {
            let a = array_new(3, false);
            array_set_raw(a, 0, -7);
            array_set_raw(a, 2, 1 << 40);
            assert_eq!(array_get_raw(a, 0), -7);
            assert_eq!(array_get_raw(a, 1), 0);
            assert_eq!(array_get_raw(a, 2), 1 << 40);
            // Out of bounds is dropped / zero.
            array_set_raw(a, 9, 1);
            assert_eq!(array_get_raw(a, 9), 0);
            assert_eq!(array_get_raw(a, -1), 0);
        }
    }

    #[test]
    fn f32_elements_preserve_bits() {
        unsafe {
            let a = array_new(1, false);
            array_set_f32(a, 0, 3.25);
            assert_eq!(array_get_f32(a, 0), 3.25);
        }
    }

    #[test]
    fn push_grows_past_initial_capacity() {
        unsafe {
            let a = array_new(0, false);
            for i in 0..100 {
                array_push_raw(a, i);
            }
            assert_eq!(array_get_length(a), 100);
            assert_eq!(array_get_raw(a, 99), 99);
        }
    }

    #[test]
    fn object_stores_manage_references() {
        unsafe {
            let a = array_new(1, true);
            let s = crate::string::string_from_bytes(b"x", 1);
            let header = s as *mut ObjHeader;

            array_set_ptr(a, 0, header);
            assert_eq!((*header).rc.load(Ordering::Relaxed), 2);

            // Overwriting releases the previous element.
            let t = crate::string::string_from_bytes(b"y", 1);
            array_set_ptr(a, 0, t as *mut ObjHeader);
            assert_eq!((*header).rc.load(Ordering::Relaxed), 1);

            let u = crate::string::string_from_bytes(b"z", 1);
            array_push_ptr(a, u as *mut ObjHeader);
            assert_eq!((*(u as *mut ObjHeader)).rc.load(Ordering::Relaxed), 2);
            assert_eq!(array_get_length(a), 2);
            assert_eq!(array_get_ptr(a, 1), u as *mut ObjHeader);
        }
    }
}
