// =============================================================================
// report.rs: Crash log production (runs inside the signal handler)
// =============================================================================
//
//   - crash_log_file_name(): crash_<YYYY>_<MM>_<DD>_<HH>_<mm>_<SS>.log (UTC)
//   - write_report()       : signal line, backtrace, optional memory map
//   - handle_fatal_signal(): the handler body: write the log, re-raise
//
// Two signals within the same second map to the same file; the later one
// overwrites the earlier log.
// =============================================================================

use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::backtrace::{self, MAX_FRAMES};

/// Process-wide dump verbosity, read on every signal delivery.
static FULL_MEMORY_DUMP: AtomicBool = AtomicBool::new(false);

/// Exit status used when the crash log cannot be created.
pub const CRASH_LOG_FAILURE_EXIT: i32 = 1;

pub(crate) fn set_full_memory_dump(enabled: bool) {
    FULL_MEMORY_DUMP.store(enabled, Ordering::Relaxed);
}

pub fn full_memory_dump() -> bool {
    FULL_MEMORY_DUMP.load(Ordering::Relaxed)
}

/// Everything known about one fatal signal delivery.
#[derive(Debug, Clone)]
pub struct CrashRecord {
    pub signal: libc::c_int,
    pub timestamp: DateTime<Utc>,
    /// Innermost frame first
    pub frames: Vec<String>,
}

impl CrashRecord {
    /// Stamp the current time and capture the calling thread's stack.
    pub fn capture(signal: libc::c_int) -> Self {
        Self {
            signal,
            timestamp: Utc::now(),
            frames: backtrace::capture(MAX_FRAMES),
        }
    }

    pub fn file_name(&self) -> String {
        crash_log_file_name(&self.timestamp)
    }
}

/// File name for a crash at `timestamp`; lexical order follows time order.
pub fn crash_log_file_name(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("crash_%Y_%m_%d_%H_%M_%S.log").to_string()
}

/// Write the crash log body.
///
/// ```text
/// Signal 11 received
/// Backtrace:
/// <frame 0>
/// ...
/// ```
///
/// With `full_dump` a `Memory map:` section with the process mappings follows.
pub fn write_report<W: Write>(out: &mut W, record: &CrashRecord, full_dump: bool) -> io::Result<()> {
    writeln!(out, "Signal {} received", record.signal)?;
    writeln!(out, "Backtrace:")?;
    for frame in &record.frames {
        writeln!(out, "{frame}")?;
    }
    if full_dump {
        writeln!(out, "Memory map:")?;
        if let Some(maps) = read_memory_map() {
            out.write_all(maps.as_bytes())?;
            if !maps.ends_with('\n') {
                writeln!(out)?;
            }
        }
    }
    out.flush()
}

#[cfg(target_os = "linux")]
fn read_memory_map() -> Option<String> {
    std::fs::read_to_string("/proc/self/maps").ok()
}

#[cfg(not(target_os = "linux"))]
fn read_memory_map() -> Option<String> {
    None
}

/// Create (or truncate) the crash log for `record` inside `dir`.
pub fn create_crash_log(dir: &Path, record: &CrashRecord) -> io::Result<(PathBuf, File)> {
    let path = dir.join(record.file_name());
    let file = File::create(&path)?;
    Ok((path, file))
}

/// Raw `write(2)` to stderr; never takes the std stderr lock.
fn write_stderr(msg: &[u8]) {
    unsafe { libc::write(libc::STDERR_FILENO, msg.as_ptr() as *const libc::c_void, msg.len()) };
}

/// Handler body for a delivered fatal signal. Never returns normally into
/// the faulting code with our handler still installed: either the process
/// exits with [`CRASH_LOG_FAILURE_EXIT`] or the signal is re-raised with the
/// default disposition.
pub(crate) fn handle_fatal_signal(signum: libc::c_int) {
    let record = CrashRecord::capture(signum);

    let dir = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(_) => fail_to_create(),
    };
    let (path, file) = match create_crash_log(&dir, &record) {
        Ok(opened) => opened,
        Err(_) => fail_to_create(),
    };

    // A failed write leaves a partial log; the signal still goes on to the
    // default disposition.
    let mut out = io::BufWriter::new(file);
    let _ = write_report(&mut out, &record, full_memory_dump());
    drop(out);

    let notice = format!("Crash log written to: {}\n", path.display());
    write_stderr(notice.as_bytes());

    unsafe {
        libc::signal(signum, libc::SIG_DFL);
        libc::raise(signum);
    }
}

fn fail_to_create() -> ! {
    write_stderr(b"Failed to create crash log file\n");
    std::process::exit(CRASH_LOG_FAILURE_EXIT);
}
