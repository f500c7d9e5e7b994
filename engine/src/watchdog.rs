//! The watchdog (C8): an independent process the supervisor forks once,
//! before any children exist. It never touches a child slot directly
//! (single-writer discipline belongs to the owning child) — it only reads
//! `last_progress_secs`/`syscall_state` and, when a child looks stuck, sends
//! it a signal from outside.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::Duration;

use nix::unistd::{fork, ForkResult};

use crate::control::{ChildSlot, ExitReason, SharedControl, SyscallState, MAX_CHILDREN};
use crate::error::{Error, Result};

pub struct WatchdogConfig {
    /// How often the watchdog wakes up to look at the world.
    pub tick_interval: Duration,
    /// A child stuck in `During` longer than this gets a `SIGALRM`.
    pub stall_threshold: Duration,
    /// Total wall-clock budget for the whole run, if any.
    pub max_runtime: Option<Duration>,
    /// Total `exec_count` budget for the whole run, if any.
    pub max_exec_count: Option<u64>,
    /// Where to read the kernel's taint flag from.
    pub taint_path: PathBuf,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            stall_threshold: Duration::from_secs(30),
            max_runtime: None,
            max_exec_count: None,
            taint_path: PathBuf::from("/proc/sys/kernel/tainted"),
        }
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Reads the kernel's taint flag. Any I/O error (file missing, unreadable —
/// e.g. a container without `/proc/sys/kernel` writable) is treated as
/// "not tainted", since the watchdog has no other signal to fall back on.
fn check_tainted(path: &Path) -> bool {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(|v| v != 0)
        .unwrap_or(false)
}

/// One stalled-child entry: how many consecutive ticks it's looked stuck in
/// `During`, and whether we've already sent it an alarm.
#[derive(Default, Clone, Copy)]
struct StallTracker {
    ticks_stalled: u8,
    alarmed: bool,
}

fn slot_is_stalled(slot: &ChildSlot, stall_threshold: Duration, now: u64) -> bool {
    if slot.pid.load(Ordering::Relaxed) <= 0 {
        return false;
    }
    if slot.state() != SyscallState::During {
        return false;
    }
    let last = slot.last_progress_secs.load(Ordering::Relaxed);
    now.saturating_sub(last) >= stall_threshold.as_secs()
}

/// Runs the watchdog loop until `ctrl.exit_reason` stops being `Running`.
/// Intended to run in a dedicated process; the caller is responsible for
/// `_exit`ing right afterward (see [`spawn`]).
pub fn run(ctrl: &SharedControl, cfg: &WatchdogConfig) {
    let start = now_secs();
    let mut trackers = [StallTracker::default(); MAX_CHILDREN];

    loop {
        if ctrl.exit_reason.get() != ExitReason::Running {
            break;
        }

        if check_tainted(&cfg.taint_path) {
            ctrl.exit_reason.escalate(ExitReason::KernelTainted);
            break;
        }

        if let Some(max_runtime) = cfg.max_runtime {
            if now_secs().saturating_sub(start) >= max_runtime.as_secs() {
                ctrl.exit_reason.escalate(ExitReason::ChildReachedCount);
                break;
            }
        }
        if let Some(max_exec) = cfg.max_exec_count {
            if ctrl.exec_count.load(Ordering::Relaxed) >= max_exec {
                ctrl.exit_reason.escalate(ExitReason::ChildReachedCount);
                break;
            }
        }

        let now = now_secs();
        for (idx, slot) in ctrl.children.iter().enumerate() {
            let tracker = &mut trackers[idx];
            if !slot_is_stalled(slot, cfg.stall_threshold, now) {
                *tracker = StallTracker::default();
                continue;
            }
            let pid = slot.pid.load(Ordering::Relaxed);
            if !tracker.alarmed {
                unsafe { libc::kill(pid, libc::SIGALRM) };
                tracker.alarmed = true;
                tracker.ticks_stalled = 1;
            } else {
                tracker.ticks_stalled = tracker.ticks_stalled.saturating_add(1);
                if tracker.ticks_stalled >= 2 {
                    unsafe { libc::kill(pid, libc::SIGKILL) };
                    *tracker = StallTracker::default();
                }
            }
        }

        std::thread::sleep(cfg.tick_interval);
    }
}

/// Forks the watchdog process, recording its pid in the control block.
/// Returns in the parent immediately; the child runs [`run`] and then
/// `_exit`s, never returning to the caller.
pub fn spawn(ctrl: &SharedControl, cfg: WatchdogConfig) -> Result<()> {
    match unsafe { fork() }.map_err(Error::Fork)? {
        ForkResult::Child => {
            ctrl.watchdog_pid.store(unsafe { libc::getpid() }, Ordering::Relaxed);
            crate::signals::install_for_process(ctrl, false);
            run(ctrl, &cfg);
            unsafe { libc::_exit(0) };
        }
        ForkResult::Parent { child } => {
            ctrl.watchdog_pid.store(child.as_raw(), Ordering::Relaxed);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::SharedMap;

    #[test]
    fn untainted_missing_file_reads_as_clean() {
        assert!(!check_tainted(Path::new("/no/such/path/trinity-test")));
    }

    #[test]
    fn tainted_file_with_nonzero_value_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tainted");
        std::fs::write(&path, "1\n").unwrap();
        assert!(check_tainted(&path));
    }

    #[test]
    fn idle_child_is_never_considered_stalled() {
        let map = SharedMap::create(1, 1).unwrap();
        let ctrl = map.get();
        ctrl.children[0].pid.store(1234, Ordering::Relaxed);
        ctrl.children[0].set_state(SyscallState::Idle);
        assert!(!slot_is_stalled(&ctrl.children[0], Duration::from_secs(30), now_secs()));
    }

    #[test]
    fn during_child_past_threshold_is_stalled() {
        let map = SharedMap::create(1, 1).unwrap();
        let ctrl = map.get();
        ctrl.children[0].pid.store(1234, Ordering::Relaxed);
        ctrl.children[0].set_state(SyscallState::During);
        ctrl.children[0].last_progress_secs.store(0, Ordering::Relaxed);
        assert!(slot_is_stalled(&ctrl.children[0], Duration::from_secs(30), now_secs()));
    }
}
