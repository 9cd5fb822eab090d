//! Signal-driven cancellation.
//!
//! Lives in its own test binary: the handlers and the flag they set are
//! process-wide, so nothing else may run in this process.

#![cfg(unix)]

use tl_core::CancelToken;

fn disposition(sig: libc::c_int) -> libc::sighandler_t {
    let mut current: libc::sigaction = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::sigaction(sig, std::ptr::null(), &mut current) };
    assert_eq!(rc, 0);
    current.sa_sigaction
}

#[test]
fn first_signal_cancels_and_repeats_are_ignored() {
    let token = CancelToken::with_signals().unwrap();
    let plain = CancelToken::new();
    assert!(!token.is_cancelled());
    assert_ne!(disposition(libc::SIGINT), libc::SIG_IGN);

    assert_eq!(unsafe { libc::raise(libc::SIGINT) }, 0);
    assert!(token.is_cancelled());
    assert!(token.clone().is_cancelled());
    assert!(!plain.is_cancelled());
    assert_eq!(disposition(libc::SIGINT), libc::SIG_IGN);

    // Ignored now; the process keeps running.
    assert_eq!(unsafe { libc::raise(libc::SIGINT) }, 0);
    assert!(token.is_cancelled());

    // SIGTERM goes through the same handler once, then is ignored too.
    assert_ne!(disposition(libc::SIGTERM), libc::SIG_IGN);
    assert_eq!(unsafe { libc::raise(libc::SIGTERM) }, 0);
    assert_eq!(disposition(libc::SIGTERM), libc::SIG_IGN);
    assert_eq!(unsafe { libc::raise(libc::SIGTERM) }, 0);
    assert!(token.is_cancelled());
}
