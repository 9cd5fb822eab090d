//! Cooperative cancellation for the trace loop.
//!
//! SIGINT and SIGTERM set a process-wide flag. The handler then switches
//! the signal to `SIG_IGN`, so a second Ctrl-C cannot interrupt the
//! shutdown path that closes the collection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

static SIGNALLED: AtomicBool = AtomicBool::new(false);

/// Cancellation flag shared between the loop and whoever may stop it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    watch_signals: bool,
}

impl CancelToken {
    /// A token cancelled only through [`CancelToken::cancel`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also observes SIGINT/SIGTERM.
    ///
    /// Installs the signal handlers; returns an error if the kernel refuses.
    pub fn with_signals() -> std::io::Result<Self> {
        install_signal_handlers()?;
        Ok(Self {
            flag: Arc::new(AtomicBool::new(false)),
            watch_signals: true,
        })
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || (self.watch_signals && SIGNALLED.load(Ordering::SeqCst))
    }
}

#[cfg(unix)]
extern "C" fn on_signal(sig: libc::c_int) {
    SIGNALLED.store(true, Ordering::SeqCst);
    // sigaction is async-signal-safe; the result is irrelevant here.
    unsafe {
        let _ = set_disposition(sig, libc::SIG_IGN);
    }
}

#[cfg(unix)]
unsafe fn set_disposition(sig: libc::c_int, handler: libc::sighandler_t) -> libc::c_int {
    let mut action: libc::sigaction = std::mem::zeroed();
    action.sa_sigaction = handler;
    action.sa_flags = 0;
    libc::sigemptyset(&mut action.sa_mask);
    libc::sigaction(sig, &action, std::ptr::null_mut())
}

#[cfg(unix)]
fn install_signal_handlers() -> std::io::Result<()> {
    let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
    for sig in [libc::SIGINT, libc::SIGTERM] {
        let rc = unsafe { set_disposition(sig, handler) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    debug!("installed SIGINT/SIGTERM handlers");
    Ok(())
}

#[cfg(not(unix))]
fn install_signal_handlers() -> std::io::Result<()> {
    debug!("signal handling unavailable on this platform");
    Ok(())
}
