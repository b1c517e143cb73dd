//! crash-probe: raise a monitored signal under a `SignalGuard`.
//!
//! Used by the integration tests to observe real signal delivery out of
//! process. The probe never returns normally when a signal is raised:
//! it dies from the signal, exits 1 (crash log not creatable), or exits
//! with [`PRIOR_HANDLER_EXIT`] when a pre-existing handler ran.

use anyhow::{Context, Result};
use clap::Parser;
use hookrt_config::logging::{init_logging, LogLevel};
use hookrt_crash::{CrashError, MonitoredSignal, SignalGuard};
use nix::sys::signal::{raise, sigaction, SaFlags, SigAction, SigHandler, SigSet};

/// Exit status of the handler installed by `--prior-handler`.
const PRIOR_HANDLER_EXIT: i32 = 42;
/// Exit status when a second `enable()` was rejected.
const ALREADY_ENABLED_EXIT: i32 = 3;

#[derive(Parser, Debug)]
#[command(name = "crash-probe", about = "Raise a fatal signal under the crash reporter")]
struct Args {
    /// Signal to raise (SIGSEGV, abrt, 8, ...)
    #[arg(long)]
    signal: MonitoredSignal,

    /// Install a handler before the guard that exits with status 42
    #[arg(long)]
    prior_handler: bool,

    /// Restore the previous handlers before raising
    #[arg(long)]
    disable: bool,

    /// Append the memory map to the crash log
    #[arg(long)]
    full_dump: bool,

    /// Call enable() a second time and report the result
    #[arg(long)]
    double_enable: bool,

    /// Raise from a working directory that no longer exists
    #[arg(long)]
    cwd_gone: bool,

    /// Log guard activity to stderr
    #[arg(long)]
    verbose: bool,
}

extern "C" fn prior_handler(_signum: libc::c_int) {
    let msg = b"prior handler ran\n";
    unsafe {
        libc::write(libc::STDERR_FILENO, msg.as_ptr() as *const libc::c_void, msg.len());
        libc::_exit(PRIOR_HANDLER_EXIT);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.verbose {
        init_logging(LogLevel::Debug);
    }

    if args.prior_handler {
        let action = SigAction::new(
            SigHandler::Handler(prior_handler),
            SaFlags::empty(),
            SigSet::empty(),
        );
        unsafe { sigaction(args.signal.signal(), &action) }
            .context("installing prior handler")?;
    }

    let mut guard = SignalGuard::new();
    guard.set_full_memory_dump(args.full_dump);
    guard.enable().context("enabling crash reporter")?;

    if args.double_enable {
        match guard.enable() {
            Err(CrashError::AlreadyEnabled) => {
                eprintln!("second enable rejected");
                std::process::exit(ALREADY_ENABLED_EXIT);
            }
            other => anyhow::bail!("unexpected second enable result: {other:?}"),
        }
    }

    if args.disable {
        guard.disable();
    }

    if args.cwd_gone {
        let doomed = std::env::current_dir()?.join("doomed");
        std::fs::create_dir_all(&doomed)?;
        std::env::set_current_dir(&doomed)?;
        std::fs::remove_dir(&doomed)?;
    }

    raise(args.signal.signal()).context("raising signal")?;

    // Only reachable if the signal's final disposition let us continue.
    eprintln!("survived {}", args.signal);
    Ok(())
}
