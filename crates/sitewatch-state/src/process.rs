//! Process liveness and signal delivery.
//!
//! On Unix both are built on `kill(2)`. Elsewhere liveness is reported as
//! [`Liveness::Unknown`] and signalling is unsupported; callers decide how
//! to treat that.

use crate::types::Liveness;

/// Signals the supervisor sends to a job process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Ask the process to exit (SIGTERM).
    Terminate,
    /// Force the process to exit (SIGKILL).
    Kill,
}

#[cfg(unix)]
fn to_pid(pid: u32) -> Option<libc::pid_t> {
    // pid 0 and negative values address process groups, never a single job.
    match libc::pid_t::try_from(pid) {
        Ok(p) if p > 0 => Some(p),
        _ => None,
    }
}

/// Check whether `pid` refers to a running process.
#[cfg(unix)]
pub fn probe_liveness(pid: u32) -> Liveness {
    let Some(pid) = to_pid(pid) else {
        return Liveness::Dead;
    };
    // SAFETY: signal 0 performs the existence and permission checks only.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return Liveness::Alive;
    }
    match std::io::Error::last_os_error().raw_os_error() {
        // The process exists but belongs to someone else.
        Some(libc::EPERM) => Liveness::Alive,
        _ => Liveness::Dead,
    }
}

#[cfg(not(unix))]
pub fn probe_liveness(_pid: u32) -> Liveness {
    Liveness::Unknown
}

/// Deliver `signal` to `pid`.
#[cfg(unix)]
pub fn send_signal(pid: u32, signal: Signal) -> std::io::Result<()> {
    let Some(pid) = to_pid(pid) else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("refusing to signal pid {pid}"),
        ));
    };
    let signo = match signal {
        Signal::Terminate => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // SAFETY: plain kill(2) on a validated positive pid.
    if unsafe { libc::kill(pid, signo) } == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
pub fn send_signal(pid: u32, signal: Signal) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        format!("cannot deliver {signal:?} to pid {pid} on this platform"),
    ))
}
