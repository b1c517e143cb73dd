//! Locating the module we were loaded from.

use std::ffi::{CStr, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

/// Absolute path of the shared object (or executable) containing this code.
///
/// Uses `dladdr` on one of our own functions, so when this crate is linked
/// into the injected library the answer is the library's path.
pub fn current_module_path() -> Option<PathBuf> {
    module_path_of(current_module_path as *const libc::c_void)
}

/// Path of the loaded object that contains `addr`.
pub fn module_path_of(addr: *const libc::c_void) -> Option<PathBuf> {
    let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
    if unsafe { libc::dladdr(addr, &mut info) } == 0 || info.dli_fname.is_null() {
        return None;
    }

    let bytes = unsafe { CStr::from_ptr(info.dli_fname) }.to_bytes();
    if bytes.is_empty() {
        // glibc reports the main program with an empty name
        return std::env::current_exe().ok();
    }

    let path = PathBuf::from(OsStr::from_bytes(bytes));
    if path.is_absolute() {
        Some(path)
    } else {
        Some(std::fs::canonicalize(&path).unwrap_or(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_to_existing_file() {
        let path = current_module_path().expect("dladdr should find the test binary");
        assert!(path.exists(), "{path:?}");
    }

    #[test]
    fn test_matches_current_exe() {
        let path = std::fs::canonicalize(current_module_path().unwrap()).unwrap();
        let exe = std::fs::canonicalize(std::env::current_exe().unwrap()).unwrap();
        assert_eq!(path, exe);
    }

    #[test]
    fn test_unmapped_address_is_none() {
        assert_eq!(module_path_of(std::ptr::null()), None);
    }
}
