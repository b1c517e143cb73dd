use nix::sys::signal::Signal;
use std::fmt;

/// The fatal signals the guard hooks, in handler-table slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitoredSignal {
    /// Segmentation fault
    Segv,
    /// Abort
    Abrt,
    /// Floating point exception
    Fpe,
    /// Illegal instruction
    Ill,
    /// Bus error
    Bus,
    /// Trap
    Trap,
}

impl MonitoredSignal {
    pub const COUNT: usize = 6;

    /// Every monitored signal; index `i` is handler-table slot `i`.
    pub const ALL: [MonitoredSignal; Self::COUNT] = [
        MonitoredSignal::Segv,
        MonitoredSignal::Abrt,
        MonitoredSignal::Fpe,
        MonitoredSignal::Ill,
        MonitoredSignal::Bus,
        MonitoredSignal::Trap,
    ];

    pub fn slot(self) -> usize {
        self as usize
    }

    pub fn signal(self) -> Signal {
        match self {
            MonitoredSignal::Segv => Signal::SIGSEGV,
            MonitoredSignal::Abrt => Signal::SIGABRT,
            MonitoredSignal::Fpe => Signal::SIGFPE,
            MonitoredSignal::Ill => Signal::SIGILL,
            MonitoredSignal::Bus => Signal::SIGBUS,
            MonitoredSignal::Trap => Signal::SIGTRAP,
        }
    }

    pub fn as_raw(self) -> libc::c_int {
        self.signal() as libc::c_int
    }

    pub fn from_raw(signum: libc::c_int) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_raw() == signum)
    }

    pub fn name(self) -> &'static str {
        self.signal().as_str()
    }
}

impl fmt::Display for MonitoredSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for MonitoredSignal {
    type Err = String;

    /// Accepts `SIGSEGV`, `segv` or the raw number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(raw) = s.parse::<libc::c_int>() {
            return Self::from_raw(raw).ok_or_else(|| format!("signal {raw} is not monitored"));
        }
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);
        Self::ALL
            .into_iter()
            .find(|sig| &sig.name()[3..] == name)
            .ok_or_else(|| format!("unknown signal: {s}"))
    }
}
