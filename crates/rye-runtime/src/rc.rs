//! The ARC entry points inserted by the compiler.

use crate::header::*;
use std::io::Write;
use std::os::raw::c_char;
use std::sync::atomic::Ordering;

/// Increments an object's reference count.
///
/// # Safety
/// `obj` must be null or a pointer previously returned by a runtime
/// allocator.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn RegisterReference(obj: *mut ObjHeader) {
    if obj.is_null() {
        return;
    }
    (*obj).rc.fetch_add(1, Ordering::Relaxed);
}

/// Decrements an object's reference count and frees it (including class
/// payloads) when the count reaches zero. A zero-count or null object is
/// left alone, so releasing a nulled slot is always safe.
///
/// # Safety
/// `obj` must be null or a live pointer previously returned by a runtime
/// allocator.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn UnregisterReference(obj: *mut ObjHeader) {
    if obj.is_null() {
        return;
    }
    loop {
        let current = (*obj).rc.load(Ordering::Acquire);
        if current == 0 {
            return;
        }
        match (*obj).rc.compare_exchange_weak(
            current,
            current - 1,
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => {
                if current == 1 {
                    drop_object(obj);
                }
                return;
            }
            Err(_) => continue,
        }
    }
}

/// Verbose variant used with the compiler's `--verbose-arc` toggle: logs
/// the emitter-provided note, then behaves like `RegisterReference`.
///
/// # Safety
/// `note` must be null or a NUL-terminated string constant.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn RegisterReferenceVerbose(obj: *mut ObjHeader, note: *const c_char) {
    log_arc("retain", obj, note);
    RegisterReference(obj);
}

/// # Safety
/// See `RegisterReferenceVerbose`.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn UnregisterReferenceVerbose(obj: *mut ObjHeader, note: *const c_char) {
    log_arc("release", obj, note);
    UnregisterReference(obj);
}

unsafe fn log_arc(action: &str, obj: *mut ObjHeader, note: *const c_char) {
    let note = if note.is_null() {
        String::new()
    } else {
        std::ffi::CStr::from_ptr(note).to_string_lossy().into_owned()
    };
    let count = if obj.is_null() {
        0
    } else {
        (*obj).rc.load(Ordering::Relaxed)
    };
    let _ = writeln!(
        std::io::stderr(),
        "[rye runtime] {} {:p} (rc={}) {}",
        action,
        obj,
        count,
        note
    );
}

/// Frees an object whose count just reached zero, releasing any
/// class-owned payloads first.
pub(crate) unsafe fn drop_object(obj: *mut ObjHeader) {
    match (*obj).class {
        CLASS_STRING => {
            let s = obj as *mut crate::string::RyeString;
            if !(*s).buffer.is_null() {
                libc::free((*s).buffer as *mut libc::c_void);
            }
        }
        CLASS_ARRAY => {
            let a = obj as *mut crate::array::RyeArray;
            if (*a).elem_is_object {
                for i in 0..(*a).length {
                    let elem = *(*a).data.add(i as usize) as *mut ObjHeader;
                    UnregisterReference(elem);
                }
            }
            if !(*a).data.is_null() {
                libc::free((*a).data as *mut libc::c_void);
            }
        }
        CLASS_THREAD => {
            crate::thread::detach_on_drop(obj as *mut crate::thread::RyeThread);
        }
        _ => {}
    }
    libc::free(obj as *mut libc::c_void);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn register_and_unregister_balance() {
        unsafe {
            let s = crate::string::string_new();
            let header = s as *mut ObjHeader;
            RegisterReference(header);
            RegisterReference(header);
            assert_eq!((*header).rc.load(Ordering::Relaxed), 2);
            UnregisterReference(header);
            assert_eq!((*header).rc.load(Ordering::Relaxed), 1);
            // Final release frees the object.
            UnregisterReference(header);
        }
    }

    #[test]
    fn null_and_zero_count_are_noops() {
        unsafe {
            UnregisterReference(std::ptr::null_mut());
            RegisterReference(std::ptr::null_mut());
            let s = crate::string::string_new();
            let header = s as *mut ObjHeader;
            // Count is zero; release must not free or underflow.
            UnregisterReference(header);
            assert_eq!((*header).rc.load(Ordering::Relaxed), 0);
            RegisterReference(header);
            UnregisterReference(header);
        }
    }
}
