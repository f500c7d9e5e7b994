//! The supervisor (C7): forks and reaps children, keeps the pool at
//! capacity, periodically bumps the page-regeneration epoch, and drains
//! everything on shutdown.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};

use crate::control::{ExitReason, SharedControl, MAX_CHILDREN};
use crate::fdreg::FdRegistry;
use crate::pages::Pages;
use crate::random::Rng;
use crate::signals;
use crate::table::SyscallTable;
use crate::worker::ChildWorker;

pub struct SupervisorConfig {
    pub max_children: u32,
    pub regenerate_interval: Duration,
    pub poll_interval: Duration,
    pub drain_timeout: Duration,
    pub bits64: bool,
    pub debug: bool,
    /// Where to read the kernel's taint flag from.
    pub taint_path: PathBuf,
    /// How often to re-check it; independent of `poll_interval` since
    /// re-reading a `/proc` file every 200ms would be wasteful.
    pub taint_poll_interval: Duration,
    /// `SIGALRM` deadline for a single `NEED_ALARM` syscall (§5 default: ~3s).
    pub alarm_secs: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_children: 8,
            regenerate_interval: Duration::from_secs(30),
            poll_interval: Duration::from_millis(200),
            drain_timeout: Duration::from_secs(5),
            bits64: cfg!(target_pointer_width = "64"),
            debug: false,
            taint_path: PathBuf::from("/proc/sys/kernel/tainted"),
            taint_poll_interval: Duration::from_secs(2),
            alarm_secs: 3,
        }
    }
}

/// Reads the kernel's taint flag. A missing or unreadable file (e.g. no
/// `/proc` mounted) reads as "not tainted" rather than a fatal error — the
/// supervisor has no other source of truth for this and treating it as
/// fatal would make the fuzzer unusable in plenty of container setups.
fn check_tainted(path: &std::path::Path) -> bool {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(|v| v != 0)
        .unwrap_or(false)
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Forks one worker into the given slot. In the parent this records the
/// child's pid and returns; in the child this runs the whole worker loop
/// and never returns (it `_exit`s directly).
fn spawn_child(ctrl: &SharedControl, table: &SyscallTable, registry: &FdRegistry, pages: &Pages, idx: usize, cfg: &SupervisorConfig) {
    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            let slot = &ctrl.children[idx];
            slot.reset();
            slot.pid.store(unsafe { libc::getpid() }, Ordering::Relaxed);

            signals::install_for_process(ctrl, cfg.debug);

            let base_seed = ctrl.seed.load(Ordering::Relaxed);
            let seed = base_seed ^ (idx as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ (unsafe { libc::getpid() } as u64);
            let mut rng = Rng::new(seed);
            // Each child regenerates its own copy of page_rand right away
            // rather than fuzzing with whatever the supervisor last left in
            // the inherited page, so two children started at different
            // times don't share identical noise.
            pages.regenerate_random_page(&mut rng);

            let mut worker = ChildWorker {
                slot_index: idx,
                ctrl,
                table,
                registry,
                pages,
                rng,
                local_epoch: ctrl.regenerate_epoch.load(Ordering::Relaxed),
                bits64: cfg.bits64,
                alarm_secs: cfg.alarm_secs,
            };
            worker.run();
            unsafe { libc::_exit(0) };
        }
        Ok(ForkResult::Parent { child }) => {
            ctrl.children[idx].pid.store(child.as_raw(), Ordering::Relaxed);
        }
        Err(e) => {
            tracing::error!(error = %e, "fork failed while (re)spawning a child worker");
            ctrl.exit_reason.escalate(ExitReason::Fatal);
        }
    }
}

fn reap_if_exited(ctrl: &SharedControl, idx: usize) -> bool {
    let pid = ctrl.children[idx].pid.load(Ordering::Relaxed);
    if pid <= 0 {
        return true;
    }
    match waitpid(Pid::from_raw(pid), Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::StillAlive) => false,
        Ok(_) | Err(_) => {
            ctrl.children[idx].reset();
            true
        }
    }
}

/// Runs until `ctrl.exit_reason` leaves `Running`, then drains every
/// outstanding child before returning.
pub fn run_main_loop(ctrl: &SharedControl, table: &SyscallTable, registry: &FdRegistry, pages: &Pages, cfg: &SupervisorConfig) {
    let mut last_regen = now_secs();
    let mut last_taint_check = now_secs();
    let n = (cfg.max_children as usize).min(MAX_CHILDREN);

    loop {
        if ctrl.exit_reason.get() != ExitReason::Running {
            break;
        }

        if now_secs().saturating_sub(last_taint_check) >= cfg.taint_poll_interval.as_secs() {
            last_taint_check = now_secs();
            if check_tainted(&cfg.taint_path) {
                tracing::warn!("kernel taint detected; no new children will be spawned");
                ctrl.exit_reason.escalate(ExitReason::KernelTainted);
            }
        }

        for idx in 0..n {
            if reap_if_exited(ctrl, idx) && ctrl.exit_reason.get() == ExitReason::Running {
                spawn_child(ctrl, table, registry, pages, idx, cfg);
            }
        }

        if now_secs().saturating_sub(last_regen) >= cfg.regenerate_interval.as_secs() {
            ctrl.regenerate_epoch.fetch_add(1, Ordering::Relaxed);
            last_regen = now_secs();
        }

        std::thread::sleep(cfg.poll_interval);
    }

    drain(ctrl, n, cfg.drain_timeout);
}

/// Gives outstanding children a bounded window to exit on their own (their
/// loop already saw the exit reason change), then force-kills whatever is
/// still around.
fn drain(ctrl: &SharedControl, n: usize, timeout: Duration) {
    let deadline = now_secs() + timeout.as_secs();
    loop {
        let mut any_alive = false;
        for idx in 0..n {
            if !reap_if_exited(ctrl, idx) {
                any_alive = true;
            }
        }
        if !any_alive || now_secs() >= deadline {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    for idx in 0..n {
        let pid = ctrl.children[idx].pid.load(Ordering::Relaxed);
        if pid > 0 {
            unsafe { libc::kill(pid, libc::SIGKILL) };
            let _ = waitpid(Pid::from_raw(pid), None);
            ctrl.children[idx].reset();
        }
    }
    let watchdog_pid = ctrl.watchdog_pid.load(Ordering::Relaxed);
    if watchdog_pid > 0 {
        unsafe { libc::kill(watchdog_pid, libc::SIGTERM) };
        let _ = waitpid(Pid::from_raw(watchdog_pid), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_taint_file_reads_as_clean() {
        assert!(!check_tainted(std::path::Path::new("/no/such/path/trinity-sup-test")));
    }

    #[test]
    fn zero_taint_file_reads_as_clean() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tainted");
        std::fs::write(&path, "0\n").unwrap();
        assert!(!check_tainted(&path));
    }

    #[test]
    fn nonzero_taint_file_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tainted");
        std::fs::write(&path, "4096\n").unwrap();
        assert!(check_tainted(&path));
    }
}
