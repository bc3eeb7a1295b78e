//! The thread class.
//!
//! A thread object wraps a nullary compiled function. `thread_start`
//! spawns an OS thread running it; `thread_join` blocks until it
//! finishes. `thread_kill` detaches the handle - forcibly stopping an OS
//! thread is not supported, so a killed thread simply runs to completion
//! unobserved.

use crate::header::*;
use std::os::raw::c_void;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::thread::JoinHandle;

#[repr(C)]
pub struct RyeThread {
    pub header: ObjHeader,
    pub func: *mut c_void,
    pub handle: AtomicPtr<c_void>,
}

/// Wraps a compiled nullary function pointer.
///
/// # Safety
/// `func` must be null or a pointer to an `extern "C" fn()`.
#[no_mangle]
pub unsafe extern "C" fn thread_new(func: *mut c_void) -> *mut RyeThread {
    let t: *mut RyeThread = alloc_object(CLASS_THREAD, 0);
    if !t.is_null() {
        (*t).func = func;
        (*t).handle = AtomicPtr::new(std::ptr::null_mut());
    }
    t
}

/// # Safety
/// `t` must be null or a live thread object.
#[no_mangle]
pub unsafe extern "C" fn thread_start(t: *mut RyeThread) {
    if t.is_null() || (*t).func.is_null() {
        return;
    }
    let address = (*t).func as usize;
    let handle = std::thread::spawn(move || {
        let f: extern "C" fn() = unsafe { std::mem::transmute(address) };
        f();
    });
    let boxed = Box::into_raw(Box::new(handle)) as *mut c_void;
    let previous = (*t).handle.swap(boxed, Ordering::AcqRel);
    if !previous.is_null() {
        // Restarting replaces the old handle; detach it.
        drop(Box::from_raw(previous as *mut JoinHandle<()>));
    }
}

/// # Safety
/// `t` must be null or a live thread object.
#[no_mangle]
pub unsafe extern "C" fn thread_join(t: *mut RyeThread) {
    if t.is_null() {
        return;
    }
    let handle = (*t).handle.swap(std::ptr::null_mut(), Ordering::AcqRel);
    if !handle.is_null() {
        let handle = Box::from_raw(handle as *mut JoinHandle<()>);
        let _ = handle.join();
    }
}

/// # Safety
/// `t` must be null or a live thread object.
#[no_mangle]
pub unsafe extern "C" fn thread_kill(t: *mut RyeThread) {
    if t.is_null() {
        return;
    }
    let handle = (*t).handle.swap(std::ptr::null_mut(), Ordering::AcqRel);
    if !handle.is_null() {
        drop(Box::from_raw(handle as *mut JoinHandle<()>));
    }
}

pub(crate) unsafe fn detach_on_drop(t: *mut RyeThread) {
    let handle = (*t).handle.swap(std::ptr::null_mut(), Ordering::AcqRel);
    if !handle.is_null() {
        drop(Box::from_raw(handle as *mut JoinHandle<()>));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    static RAN: AtomicU32 = AtomicU32::new(0);

    extern "C" fn bump() {
        RAN.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn start_and_join_run_the_function() {
        unsafe {
            let t = thread_new(bump as *mut c_void);
            thread_start(t);
            thread_join(t);
            assert!(RAN.load(Ordering::SeqCst) >= 1);
            // Joining twice is a no-op.
            thread_join(t);
        }
    }

    #[test]
    fn kill_detaches_without_blocking() {
        unsafe {
            let t = thread_new(bump as *mut c_void);
            thread_start(t);
            thread_kill(t);
            thread_kill(t);
        }
    }
}
