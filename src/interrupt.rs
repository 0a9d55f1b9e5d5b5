//! Ctrl-C handling
//!
//! SIGINT sets a process-wide flag instead of killing the process. The tree
//! walks check the flag between files and stop early, so a file is never
//! left half-written. Files rewritten before the interrupt stay rewritten.

use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// The flag set by the SIGINT handler
pub fn flag() -> &'static AtomicBool {
    &INTERRUPTED
}

pub fn is_set(flag: &AtomicBool) -> bool {
    flag.load(Ordering::SeqCst)
}

/// How a tree walk ended. Both variants carry what was done up to that point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Completed(T),
    Interrupted(T),
}

impl<T> Outcome<T> {
    pub fn report(&self) -> &T {
        match self {
            Outcome::Completed(report) | Outcome::Interrupted(report) => report,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Outcome::Interrupted(_))
    }
}

#[cfg(unix)]
extern "C" fn on_sigint(_signal: libc::c_int) {
    // Only an atomic store here: anything else is not async-signal-safe.
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Install the SIGINT handler. Without it Ctrl-C terminates the process.
#[cfg(unix)]
pub fn install_handler() -> anyhow::Result<()> {
    let handler = on_sigint as extern "C" fn(libc::c_int) as libc::sighandler_t;

    // SAFETY: `on_sigint` only performs an atomic store, which is
    // async-signal-safe, and has the signature `signal` expects.
    let previous = unsafe { libc::signal(libc::SIGINT, handler) };
    if previous == libc::SIG_ERR {
        anyhow::bail!(
            "Failed to install interrupt handler: {}",
            std::io::Error::last_os_error()
        );
    }

    tracing::debug!("SIGINT handler installed");
    Ok(())
}

#[cfg(not(unix))]
pub fn install_handler() -> anyhow::Result<()> {
    Ok(())
}
