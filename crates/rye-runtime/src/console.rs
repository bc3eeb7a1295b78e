//! Builtin functions visible to Rye source programs.
//!
//! These keep their source-level names as exported symbols; the compiler
//! declares them verbatim. Terminal control uses ANSI escapes, the
//! window size comes from `TIOCGWINSZ`, and `InputKey` flips the
//! terminal into raw mode for a single keystroke.

#![allow(non_snake_case)]

use crate::string::{bytes_of, string_from_bytes, RyeString};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static CURSOR_VISIBLE: AtomicBool = AtomicBool::new(true);

fn write_bytes(bytes: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(bytes);
    let _ = out.flush();
}

/// # Safety
/// `text` must be null or a live string object.
#[no_mangle]
pub unsafe extern "C" fn Print(text: *const RyeString) {
    let mut line = bytes_of(text).to_vec();
    line.push(b'\n');
    write_bytes(&line);
}

/// # Safety
/// `text` must be null or a live string object.
#[no_mangle]
pub unsafe extern "C" fn Write(text: *const RyeString) {
    write_bytes(bytes_of(text));
}

/// Reads one line from stdin (without the newline). The caller owns the
/// returned string.
#[no_mangle]
pub extern "C" fn Input() -> *mut RyeString {
    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    unsafe { string_from_bytes(line.as_bytes(), 1) }
}

/// Reads a single keystroke in raw mode. The caller owns the returned
/// string.
#[no_mangle]
pub extern "C" fn InputKey() -> *mut RyeString {
    let mut byte = [0u8; 1];
    let read_one = unsafe {
        let fd = libc::STDIN_FILENO;
        let mut original: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &mut original) == 0 {
            let mut raw = original;
            raw.c_lflag &= !(libc::ICANON | libc::ECHO);
            raw.c_cc[libc::VMIN] = 1;
            raw.c_cc[libc::VTIME] = 0;
            let _ = libc::tcsetattr(fd, libc::TCSANOW, &raw);
            let result = std::io::stdin().read_exact(&mut byte).is_ok();
            let _ = libc::tcsetattr(fd, libc::TCSANOW, &original);
            result
        } else {
            // Not a terminal; fall back to a buffered read.
            std::io::stdin().read_exact(&mut byte).is_ok()
        }
    };
    let bytes: &[u8] = if read_one { &byte } else { &[] };
    unsafe { string_from_bytes(bytes, 1) }
}

#[no_mangle]
pub extern "C" fn Clear() {
    write_bytes(b"\x1b[2J\x1b[H");
}

#[no_mangle]
pub extern "C" fn SetCursor(x: i32, y: i32) {
    // ANSI rows and columns are 1-based.
    write_bytes(format!("\x1b[{};{}H", y.max(0) + 1, x.max(0) + 1).as_bytes());
}

fn terminal_size() -> (i32, i32) {
    unsafe {
        let mut size: libc::winsize = std::mem::zeroed();
        if libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut size) == 0 && size.ws_col > 0 {
            (size.ws_col as i32, size.ws_row as i32)
        } else {
            (80, 24)
        }
    }
}

#[no_mangle]
pub extern "C" fn GetSizeX() -> i32 {
    terminal_size().0
}

#[no_mangle]
pub extern "C" fn GetSizeY() -> i32 {
    terminal_size().1
}

#[no_mangle]
pub extern "C" fn SetCursorVisible(state: bool) {
    CURSOR_VISIBLE.store(state, Ordering::Relaxed);
    write_bytes(if state { b"\x1b[?25h" } else { b"\x1b[?25l" });
}

#[no_mangle]
pub extern "C" fn GetCursorVisible() -> bool {
    CURSOR_VISIBLE.load(Ordering::Relaxed)
}

// Linear congruential generator, seeded lazily from the clock.
static RNG_STATE: AtomicU64 = AtomicU64::new(0);

fn next_random() -> u64 {
    let mut state = RNG_STATE.load(Ordering::Relaxed);
    if state == 0 {
        state = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64
            | 1;
    }
    state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    RNG_STATE.store(state, Ordering::Relaxed);
    state >> 33
}

/// A random int in `[0, max)`; non-positive bounds yield 0.
#[no_mangle]
pub extern "C" fn Random(maxNum: i32) -> i32 {
    if maxNum <= 0 {
        return 0;
    }
    (next_random() % maxNum as u64) as i32
}

#[no_mangle]
pub extern "C" fn Sleep(milliseconds: i32) {
    if milliseconds > 0 {
        std::thread::sleep(std::time::Duration::from_millis(milliseconds as u64));
    }
}

/// Runtime version string; the caller owns the result.
#[no_mangle]
pub extern "C" fn Version() -> *mut RyeString {
    let version = concat!("rye ", env!("CARGO_PKG_VERSION"));
    unsafe { string_from_bytes(version.as_bytes(), 1) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_respects_bounds() {
        for _ in 0..1000 {
            let value = Random(10);
            assert!((0..10).contains(&value));
        }
        assert_eq!(Random(0), 0);
        assert_eq!(Random(-5), 0);
    }

    #[test]
    fn version_reports_package_version() {
        unsafe {
            let v = Version();
            let text = std::str::from_utf8(crate::string::bytes_of(v)).unwrap();
            assert!(text.starts_with("rye "));
        }
    }

    #[test]
    fn cursor_visibility_round_trips() {
        SetCursorVisible(false);
        assert!(!GetCursorVisible());
        SetCursorVisible(true);
        assert!(GetCursorVisible());
    }
}
