//! # hookrt
//!
//! The shared library injected into a host process. Its load hook boots
//! [`HostRuntime`] on a background thread and returns straight away; its
//! unload hook runs the runtime's static cleanup.
//!
//! Nothing here blocks the dynamic loader: path resolution and runtime
//! construction are cheap, and `init()` happens on the spawned thread.

#![allow(clippy::missing_safety_doc)]

use std::path::PathBuf;
use std::sync::Arc;

use hookrt_config::log_loader_debug;
use hookrt_loader::module_path::current_module_path;
use hookrt_loader::{DetachedSpawner, HostRuntime, ModuleSlot, TracingOutput};

static MODULE: ModuleSlot<HostRuntime> = ModuleSlot::new();

fn on_load() {
    // An unresolvable path surfaces later as an init error.
    let module_path = current_module_path().unwrap_or_default();
    MODULE.load(
        module_path,
        &DetachedSpawner::default(),
        Arc::new(TracingOutput::new()),
    );
}

fn on_unload() {
    MODULE.unload();
    log_loader_debug!("Module unloaded");
}

/// Called when the library is loaded
#[used]
#[cfg(not(test))]
#[cfg_attr(target_os = "linux", link_section = ".init_array")]
#[cfg_attr(target_os = "macos", link_section = "__DATA,__mod_init_func")]
static INIT: extern "C" fn() = {
    extern "C" fn init() {
        on_load();
    }
    init
};

/// Called when the library is unloaded or the process exits normally
#[used]
#[cfg(not(test))]
#[cfg_attr(target_os = "linux", link_section = ".fini_array")]
#[cfg_attr(target_os = "macos", link_section = "__DATA,__mod_term_func")]
static FINI: extern "C" fn() = {
    extern "C" fn fini() {
        on_unload();
    }
    fini
};

/// Lifecycle state of the injected runtime, as the `u8` discriminant of
/// `ModuleState` (0 = unloaded, 1 = initializing, 2 = running, 3 = failed,
/// 4 = unloading, 5 = terminated).
#[no_mangle]
pub extern "C" fn hookrt_module_state() -> u8 {
    MODULE.state() as u8
}

/// Writes the NUL-terminated path this library was loaded from into `buf`.
/// Returns the path length, or -1 if it is unknown or does not fit.
#[no_mangle]
pub unsafe extern "C" fn hookrt_module_path(buf: *mut libc::c_char, buf_size: usize) -> libc::c_int {
    use std::os::unix::ffi::OsStrExt;

    if buf.is_null() || buf_size == 0 {
        return -1;
    }
    let path: PathBuf = match current_module_path() {
        Some(path) => path,
        None => return -1,
    };
    let bytes = path.as_os_str().as_bytes();
    if bytes.len() + 1 > buf_size {
        return -1;
    }
    std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf as *mut u8, bytes.len());
    *buf.add(bytes.len()) = 0;
    bytes.len() as libc::c_int
}
