//! Call-stack capture for crash reports.
//!
//! On glibc and macOS this goes through `execinfo` (`backtrace` +
//! `backtrace_symbols`), which yields one `module(symbol+offset) [addr]`
//! string per frame. Elsewhere it falls back to the std backtrace printer.

/// Maximum number of frames written to a crash log.
pub const MAX_FRAMES: usize = 50;

#[cfg(any(target_env = "gnu", target_os = "macos"))]
mod execinfo {
    use libc::{c_char, c_int, c_void};

    extern "C" {
        pub fn backtrace(buffer: *mut *mut c_void, size: c_int) -> c_int;
        pub fn backtrace_symbols(buffer: *const *mut c_void, size: c_int) -> *mut *mut c_char;
    }
}

/// Capture up to `max_frames` frames of the calling thread, innermost first.
///
/// Returns an empty list when unwinding is unavailable or fails.
#[cfg(any(target_env = "gnu", target_os = "macos"))]
pub fn capture(max_frames: usize) -> Vec<String> {
    use std::ffi::CStr;

    let mut addrs = [std::ptr::null_mut::<libc::c_void>(); MAX_FRAMES];
    let limit = max_frames.min(MAX_FRAMES) as libc::c_int;
    let size = unsafe { execinfo::backtrace(addrs.as_mut_ptr(), limit) };
    if size <= 0 {
        return Vec::new();
    }

    let strings = unsafe { execinfo::backtrace_symbols(addrs.as_ptr(), size) };
    if strings.is_null() {
        return Vec::new();
    }

    let mut frames = Vec::with_capacity(size as usize);
    for i in 0..size as usize {
        let entry = unsafe { *strings.add(i) };
        if entry.is_null() {
            continue;
        }
        frames.push(unsafe { CStr::from_ptr(entry) }.to_string_lossy().into_owned());
    }
    // One malloc'd block holds both the pointer array and the strings.
    unsafe { libc::free(strings as *mut libc::c_void) };
    frames
}

#[cfg(not(any(target_env = "gnu", target_os = "macos")))]
pub fn capture(max_frames: usize) -> Vec<String> {
    let rendered = std::backtrace::Backtrace::force_capture().to_string();
    rendered
        .lines()
        .filter(|line| !line.trim_start().starts_with("at "))
        .map(|line| line.trim().to_string())
        .take(max_frames.min(MAX_FRAMES))
        .collect()
}
