//! The shared control block: one `mmap(MAP_SHARED | MAP_ANONYMOUS)` region,
//! allocated by the supervisor before the first fork and inherited by every
//! child and the watchdog afterward. Every field is a plain atomic; nothing
//! in here is protected by a userspace lock, per the concurrency model each
//! slot is written by exactly one process at a time.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, AtomicU32, AtomicU64, Ordering};

use crate::error::{Error, Result};

pub const MAX_CHILDREN: usize = 64;
pub const EMPTY_PID: i32 = -1;

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    Running = 0,
    SigInt = 1,
    ShutdownRequested = 2,
    ChildReachedCount = 3,
    KernelTainted = 4,
    Fatal = 5,
}

impl ExitReason {
    fn from_u32(v: u32) -> Self {
        match v {
            0 => ExitReason::Running,
            1 => ExitReason::SigInt,
            2 => ExitReason::ShutdownRequested,
            3 => ExitReason::ChildReachedCount,
            4 => ExitReason::KernelTainted,
            _ => ExitReason::Fatal,
        }
    }
}

/// A monotonic latch: once set away from `Running`, only a *stronger*
/// reason can overwrite it. `SigInt < ShutdownRequested < ChildReachedCount
/// < KernelTainted < Fatal`; the exact ordering among the middle three
/// isn't specified anywhere a caller depends on it, only that a taint or a
/// fatal condition always wins over a plain shutdown request.
pub struct ExitReasonCell(AtomicU32);

impl ExitReasonCell {
    const fn new() -> Self {
        Self(AtomicU32::new(ExitReason::Running as u32))
    }

    pub fn get(&self) -> ExitReason {
        ExitReason::from_u32(self.0.load(Ordering::Acquire))
    }

    pub fn escalate(&self, reason: ExitReason) {
        let mut cur = self.0.load(Ordering::Acquire);
        loop {
            if ExitReason::from_u32(cur) as u32 >= reason as u32 {
                return;
            }
            match self.0.compare_exchange_weak(cur, reason as u32, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return,
                Err(actual) => cur = actual,
            }
        }
    }
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyscallState {
    Idle = 0,
    Chosen = 1,
    Pre = 2,
    During = 3,
    Post = 4,
}

/// Per-child record the supervisor and watchdog both read, and that child
/// alone writes.
#[repr(C)]
pub struct ChildSlot {
    pub pid: AtomicI32,
    pub syscall_state: AtomicU32,
    pub last_syscall: AtomicU32,
    pub args: [AtomicU64; 6],
    pub retval: AtomicI64,
    pub errno_val: AtomicI32,
    pub num_syscalls_done: AtomicU64,
    pub last_progress_secs: AtomicU64,
    pub log_dirty: AtomicBool,
}

impl ChildSlot {
    fn new() -> Self {
        Self {
            pid: AtomicI32::new(EMPTY_PID),
            syscall_state: AtomicU32::new(SyscallState::Idle as u32),
            last_syscall: AtomicU32::new(0),
            args: std::array::from_fn(|_| AtomicU64::new(0)),
            retval: AtomicI64::new(0),
            errno_val: AtomicI32::new(0),
            num_syscalls_done: AtomicU64::new(0),
            last_progress_secs: AtomicU64::new(0),
            log_dirty: AtomicBool::new(false),
        }
    }

    pub fn set_state(&self, state: SyscallState) {
        self.syscall_state.store(state as u32, Ordering::Release);
    }

    pub fn state(&self) -> SyscallState {
        match self.syscall_state.load(Ordering::Acquire) {
            0 => SyscallState::Idle,
            1 => SyscallState::Chosen,
            2 => SyscallState::Pre,
            3 => SyscallState::During,
            _ => SyscallState::Post,
        }
    }

    pub fn reset(&self) {
        self.pid.store(EMPTY_PID, Ordering::Relaxed);
        self.syscall_state.store(SyscallState::Idle as u32, Ordering::Relaxed);
        self.num_syscalls_done.store(0, Ordering::Relaxed);
        self.log_dirty.store(false, Ordering::Relaxed);
    }
}

#[repr(C)]
pub struct SharedControl {
    pub seed: AtomicU64,
    pub exec_count: AtomicU64,
    pub successes: AtomicU64,
    pub failures: AtomicU64,
    pub exit_reason: ExitReasonCell,
    pub watchdog_pid: AtomicI32,
    pub max_children: AtomicU32,
    pub children: [ChildSlot; MAX_CHILDREN],
    pub current_fd: AtomicI32,
    pub fd_lifetime: AtomicU32,
    pub regenerate_epoch: AtomicU64,
}

impl SharedControl {
    fn new(seed: u64, max_children: u32) -> Self {
        Self {
            seed: AtomicU64::new(seed),
            exec_count: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            exit_reason: ExitReasonCell::new(),
            watchdog_pid: AtomicI32::new(EMPTY_PID),
            max_children: AtomicU32::new(max_children),
            children: std::array::from_fn(|_| ChildSlot::new()),
            current_fd: AtomicI32::new(0),
            fd_lifetime: AtomicU32::new(0),
            regenerate_epoch: AtomicU64::new(0),
        }
    }
}

/// Owns the mmap'd region backing a [`SharedControl`]. Unmapped on drop,
/// which should only happen in the supervisor after every child and the
/// watchdog have exited.
pub struct SharedMap {
    ptr: *mut SharedControl,
    len: usize,
}

unsafe impl Send for SharedMap {}
unsafe impl Sync for SharedMap {}

impl SharedMap {
    pub fn create(seed: u64, max_children: u32) -> Result<Self> {
        if max_children as usize > MAX_CHILDREN {
            return Err(Error::TooManyChildren(MAX_CHILDREN));
        }
        let len = std::mem::size_of::<SharedControl>();
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(Error::Mmap(std::io::Error::last_os_error()));
        }
        let ptr = addr as *mut SharedControl;
        unsafe { ptr.write(SharedControl::new(seed, max_children)) };
        Ok(Self { ptr, len })
    }

    pub fn get(&self) -> &SharedControl {
        unsafe { &*self.ptr }
    }
}

impl Drop for SharedMap {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalation_only_moves_forward() {
        let cell = ExitReasonCell::new();
        cell.escalate(ExitReason::SigInt);
        assert_eq!(cell.get(), ExitReason::SigInt);
        cell.escalate(ExitReason::ShutdownRequested);
        assert_eq!(cell.get(), ExitReason::ShutdownRequested);
        // A weaker reason arriving after a stronger one is a no-op.
        cell.escalate(ExitReason::SigInt);
        assert_eq!(cell.get(), ExitReason::ShutdownRequested);
        cell.escalate(ExitReason::Fatal);
        assert_eq!(cell.get(), ExitReason::Fatal);
    }

    #[test]
    fn shared_map_round_trips_through_atomics() {
        let map = SharedMap::create(42, 4).unwrap();
        let ctrl = map.get();
        assert_eq!(ctrl.seed.load(Ordering::Relaxed), 42);
        assert_eq!(ctrl.max_children.load(Ordering::Relaxed), 4);
        assert_eq!(ctrl.exit_reason.get(), ExitReason::Running);
        ctrl.children[0].pid.store(123, Ordering::Relaxed);
        assert_eq!(ctrl.children[0].pid.load(Ordering::Relaxed), 123);
    }

    #[test]
    fn too_many_children_rejected() {
        assert!(SharedMap::create(1, (MAX_CHILDREN + 1) as u32).is_err());
    }
}
