//! Functions that open one instance of each kernel resource kind the FD
//! registry's providers draw from. Each one goes through the sibling raw
//! syscall crate (`trinity-raw`) rather than `libc`'s own wrappers, the same
//! way the teacher's `linux-io` wraps `linux-unsafe` for everything instead
//! of depending on `libc` directly. The pooling and reuse policy itself
//! lives in the fuzzing engine, not here.

use crate::fd::Fd;
use crate::result::{Error, Result};

#[cfg(target_arch = "x86_64")]
fn raw_call(nr: i64, args: [u64; 6], argc: usize) -> i64 {
    unsafe { trinity_raw::raw::invoke(nr as u64, args, argc) as i64 }
}

#[cfg(not(target_arch = "x86_64"))]
fn raw_call(nr: i64, args: [u64; 6], argc: usize) -> i64 {
    type V = trinity_raw::raw::V;
    let packed: [V; 6] = std::array::from_fn(|i| args[i] as V);
    unsafe { trinity_raw::raw::invoke(nr as V, packed, argc) as i64 }
}

/// A raw syscall's `-errno`/success convention, converted into `Result`.
fn check(ret: i64, context: &'static str) -> Result<i64> {
    if ret < 0 {
        Err(Error::from_raw_errno(context, -ret as i32))
    } else {
        Ok(ret)
    }
}

/// Open (or create) a regular file, mirroring the `open` system call.
///
/// riscv64's Linux ABI dropped the direct `open` syscall in favour of
/// `openat`-only; every other supported architecture still has it.
#[cfg(not(target_arch = "riscv64"))]
pub fn open_file(path: &std::ffi::CStr, flags: libc::c_int, mode: libc::mode_t) -> Result<Fd> {
    let args = [path.as_ptr() as u64, flags as u64, mode as u64, 0, 0, 0];
    let fd = check(raw_call(libc::SYS_open, args, 3), "open")?;
    Ok(unsafe { Fd::from_raw_fd(fd as libc::c_int) })
}

#[cfg(target_arch = "riscv64")]
pub fn open_file(path: &std::ffi::CStr, flags: libc::c_int, mode: libc::mode_t) -> Result<Fd> {
    let args = [libc::AT_FDCWD as u64, path.as_ptr() as u64, flags as u64, mode as u64, 0, 0];
    let fd = check(raw_call(libc::SYS_openat, args, 4), "openat")?;
    Ok(unsafe { Fd::from_raw_fd(fd as libc::c_int) })
}

/// Create a pipe, returning `(read_end, write_end)`.
pub fn open_pipe() -> Result<(Fd, Fd)> {
    let mut fds: [libc::c_int; 2] = [0; 2];
    let args = [fds.as_mut_ptr() as u64, libc::O_NONBLOCK as u64, 0, 0, 0, 0];
    check(raw_call(libc::SYS_pipe2, args, 2), "pipe2")?;
    Ok(unsafe { (Fd::from_raw_fd(fds[0]), Fd::from_raw_fd(fds[1])) })
}

/// Create a socket of the given domain/type/protocol.
pub fn open_socket(domain: libc::c_int, ty: libc::c_int, protocol: libc::c_int) -> Result<Fd> {
    let args = [domain as u64, ty as u64, protocol as u64, 0, 0, 0];
    let fd = check(raw_call(libc::SYS_socket, args, 3), "socket")?;
    Ok(unsafe { Fd::from_raw_fd(fd as libc::c_int) })
}

/// Create an epoll instance.
pub fn open_epoll() -> Result<Fd> {
    let fd = check(raw_call(libc::SYS_epoll_create1, [0; 6], 1), "epoll_create1")?;
    Ok(unsafe { Fd::from_raw_fd(fd as libc::c_int) })
}

/// Create an eventfd with the given initial value.
pub fn open_eventfd(initval: libc::c_uint) -> Result<Fd> {
    let args = [initval as u64, libc::EFD_NONBLOCK as u64, 0, 0, 0, 0];
    let fd = check(raw_call(libc::SYS_eventfd2, args, 2), "eventfd2")?;
    Ok(unsafe { Fd::from_raw_fd(fd as libc::c_int) })
}

/// Open a perf event counting CPU cycles for the calling process.
pub fn open_perf_event() -> Result<Fd> {
    #[repr(C)]
    struct PerfEventAttr {
        ty: u32,
        size: u32,
        config: u64,
        sample_period_or_freq: u64,
        sample_type: u64,
        read_format: u64,
        flags: u64,
        wakeup_events_or_watermark: u32,
        bp_type: u32,
        config1_or_bp_addr: u64,
        config2_or_bp_len: u64,
        branch_sample_type: u64,
        sample_regs_user: u64,
        sample_stack_user: u32,
        clockid: i32,
        sample_regs_intr: u64,
        aux_watermark: u32,
        sample_max_stack: u16,
        reserved_2: u16,
    }

    const PERF_TYPE_HARDWARE: u32 = 0;
    const PERF_COUNT_HW_CPU_CYCLES: u64 = 0;

    let attr = PerfEventAttr {
        ty: PERF_TYPE_HARDWARE,
        size: std::mem::size_of::<PerfEventAttr>() as u32,
        config: PERF_COUNT_HW_CPU_CYCLES,
        sample_period_or_freq: 0,
        sample_type: 0,
        read_format: 0,
        flags: 0,
        wakeup_events_or_watermark: 0,
        bp_type: 0,
        config1_or_bp_addr: 0,
        config2_or_bp_len: 0,
        branch_sample_type: 0,
        sample_regs_user: 0,
        sample_stack_user: 0,
        clockid: 0,
        sample_regs_intr: 0,
        aux_watermark: 0,
        sample_max_stack: 0,
        reserved_2: 0,
    };

    // pid=0 (self), cpu=-1 (any), group_fd=-1, flags=0.
    let args = [
        &attr as *const PerfEventAttr as u64,
        0u64,
        (-1i32) as i64 as u64,
        (-1i32) as i64 as u64,
        0u64,
        0u64,
    ];
    let fd = check(raw_call(libc::SYS_perf_event_open, args, 5), "perf_event_open")?;
    Ok(unsafe { Fd::from_raw_fd(fd as libc::c_int) })
}
