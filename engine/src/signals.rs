//! The signal plane (C9). Every process the engine forks (each child
//! worker, the watchdog) installs the same disposition set; only the
//! actions taken from inside the handlers differ per signal.
//!
//! The original design used `sigsetjmp`/`siglongjmp` to unwind a worker out
//! of whatever syscall it was blocked in back to the top of its loop.
//! There's no safe equivalent to that in Rust: a signal handler can only
//! perform signal-safe operations, and unwinding the stack from inside one
//! is not among them. Instead, `SIGALRM` is deliberately installed without
//! `SA_RESTART`: a worker that's blocked in a raw syscall when the watchdog
//! sends it an alarm gets `-EINTR` back from that syscall rather than
//! having it transparently restarted, and the worker loop checks
//! `CANCEL_REQUESTED` right after every invocation to notice that this
//! happened. The handler itself only ever performs atomic stores.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::control::{ExitReason, SharedControl};

/// Set by the `SIGALRM` handler; cleared by the worker once it has
/// accounted for the interrupted call.
pub static CANCEL_REQUESTED: AtomicBool = AtomicBool::new(false);

static CONTROL_PTR: AtomicUsize = AtomicUsize::new(0);

const NSIG: i32 = 64;

/// Installs this process's signal dispositions. Must be called once near
/// the top of every forked child and the watchdog, after the fork but
/// before anything that could block.
pub fn install_for_process(ctrl: &SharedControl, keep_segv_default: bool) {
    CONTROL_PTR.store(ctrl as *const SharedControl as usize, Ordering::Relaxed);

    unsafe {
        for sig in 1..NSIG {
            if sig == libc::SIGKILL || sig == libc::SIGSTOP {
                continue;
            }
            let mut sa: libc::sigaction = std::mem::zeroed();
            sa.sa_sigaction = generic_handler as usize;
            sa.sa_flags = libc::SA_RESTART;
            libc::sigfillset(&mut sa.sa_mask);
            libc::sigaction(sig, &sa, std::ptr::null_mut());
        }

        let mut alarm_sa: libc::sigaction = std::mem::zeroed();
        alarm_sa.sa_sigaction = alarm_handler as usize;
        alarm_sa.sa_flags = 0;
        libc::sigfillset(&mut alarm_sa.sa_mask);
        libc::sigaction(libc::SIGALRM, &alarm_sa, std::ptr::null_mut());

        libc::signal(libc::SIGCHLD, libc::SIG_DFL);
        libc::signal(libc::SIGFPE, libc::SIG_IGN);
        libc::signal(libc::SIGXCPU, libc::SIG_IGN);
        libc::signal(libc::SIGTSTP, libc::SIG_IGN);
        libc::signal(libc::SIGWINCH, libc::SIG_IGN);

        for rt in libc::SIGRTMIN()..=libc::SIGRTMAX() {
            libc::signal(rt, libc::SIG_IGN);
        }

        if keep_segv_default {
            libc::signal(libc::SIGSEGV, libc::SIG_DFL);
        } else {
            libc::signal(libc::SIGSEGV, libc::SIG_IGN);
        }
    }
}

extern "C" fn alarm_handler(_sig: libc::c_int) {
    CANCEL_REQUESTED.store(true, Ordering::SeqCst);
    let ptr = CONTROL_PTR.load(Ordering::Relaxed) as *const SharedControl;
    if !ptr.is_null() {
        unsafe { (*ptr).fd_lifetime.store(0, Ordering::SeqCst) };
    }
}

extern "C" fn generic_handler(sig: libc::c_int) {
    if sig == libc::SIGINT || sig == libc::SIGTERM {
        let ptr = CONTROL_PTR.load(Ordering::Relaxed) as *const SharedControl;
        if !ptr.is_null() {
            unsafe { (*ptr).exit_reason.escalate(ExitReason::SigInt) };
        }
        return;
    }
    // Anything else delivered to a worker means something went wrong with
    // the call it was making; the worker is disposable and the supervisor
    // will notice it's gone and respawn it. Orderly exit, not a failure
    // status: the signal itself is the interesting event, already visible
    // to the supervisor via the child's wait status.
    unsafe { libc::_exit(0) };
}
