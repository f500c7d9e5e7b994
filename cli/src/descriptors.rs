//! The representative syscall descriptor table (§1: "the core specifies the
//! registry and dispatch, not each leaf"). This is intentionally a sample —
//! a couple dozen syscalls spanning every argument-tag family and every
//! syscall group — not the hundreds a full port would carry; the engine
//! doesn't care how many descriptors it's handed, only that at least one is
//! active.
//!
//! Grounded on `examples/original_source/syscalls/connect.c` for the shape
//! of an entry (name, per-arg types, return semantics, flags, sanitise
//! hook) and on `examples/original_source/fds.c` for which resource kinds
//! get fuzzed against which syscalls.

use trinity_engine::table::{SyscallRecord, SyscallTable};
use trinity_engine::{ArgTag, ReturnSemantics, SyscallDescriptor, SyscallFlags};

use crate::arch::{x86, x86_64};

const NONE6: [Option<ArgTag>; 6] = [None, None, None, None, None, None];

fn args1(a: ArgTag) -> [Option<ArgTag>; 6] {
    [Some(a), None, None, None, None, None]
}
fn args2(a: ArgTag, b: ArgTag) -> [Option<ArgTag>; 6] {
    [Some(a), Some(b), None, None, None, None]
}
fn args3(a: ArgTag, b: ArgTag, c: ArgTag) -> [Option<ArgTag>; 6] {
    [Some(a), Some(b), Some(c), None, None, None]
}
fn args4(a: ArgTag, b: ArgTag, c: ArgTag, d: ArgTag) -> [Option<ArgTag>; 6] {
    [Some(a), Some(b), Some(c), Some(d), None, None]
}
fn args5(a: ArgTag, b: ArgTag, c: ArgTag, d: ArgTag, e: ArgTag) -> [Option<ArgTag>; 6] {
    [Some(a), Some(b), Some(c), Some(d), Some(e), None]
}
fn args6(a: ArgTag, b: ArgTag, c: ArgTag, d: ArgTag, e: ArgTag, f: ArgTag) -> [Option<ArgTag>; 6] {
    [Some(a), Some(b), Some(c), Some(d), Some(e), Some(f)]
}

/// Lowers a `SocketInfo`-tagged argument 0 down to the plain fd a real
/// socket syscall expects, mirroring `connect.c`'s `sanitise_connect`.
fn sanitise_socketinfo_arg0(rec: &mut SyscallRecord) {
    rec.args[0] = trinity_engine::generic_fd_from_socketinfo(rec.args[0]);
}

/// A handful of descriptors return a fresh fd as their success value; that
/// fd isn't tracked by any FD pool, so leaving it open would leak one real
/// descriptor per successful call over a long run. The pool itself doesn't
/// need it (pools are append-once), so we just close it again.
fn close_returned_fd(rec: &mut SyscallRecord) {
    if rec.retval >= 0 {
        unsafe {
            libc::close(rec.retval as i32);
        }
    }
}

const OPEN_FLAGS: &[u64] = &[libc::O_RDONLY as u64, libc::O_WRONLY as u64, libc::O_RDWR as u64, libc::O_CREAT as u64, libc::O_TRUNC as u64, libc::O_APPEND as u64, libc::O_NONBLOCK as u64];
const MMAP_PROT: &[u64] = &[libc::PROT_NONE as u64, libc::PROT_READ as u64, libc::PROT_WRITE as u64, (libc::PROT_READ | libc::PROT_WRITE) as u64, libc::PROT_EXEC as u64];
const MMAP_FLAGS: &[u64] = &[libc::MAP_PRIVATE as u64, libc::MAP_SHARED as u64, (libc::MAP_PRIVATE | libc::MAP_ANONYMOUS) as u64];
const MADVISE_ADVICE: &[u64] = &[libc::MADV_NORMAL as u64, libc::MADV_RANDOM as u64, libc::MADV_SEQUENTIAL as u64, libc::MADV_DONTNEED as u64, libc::MADV_FREE as u64];
const SOCK_DOMAINS: &[u64] = &[libc::AF_INET as u64, libc::AF_INET6 as u64, libc::AF_UNIX as u64];
const SOCK_TYPES: &[u64] = &[libc::SOCK_STREAM as u64, libc::SOCK_DGRAM as u64];
const CLONE_FLAGS: &[u64] = &[libc::CLONE_VM as u64, libc::CLONE_FS as u64, libc::CLONE_FILES as u64, (libc::CLONE_VM | libc::CLONE_THREAD) as u64, 0];
const PTRACE_REQUESTS: &[u64] = &[0, 1, 2, 3, 4, 7, 8, 16, 24];
const PRCTL_OPTIONS: &[u64] = &[1, 4, 15, 22, 38];
const MOUNT_FLAGS: &[u64] = &[0, libc::MS_RDONLY as u64, libc::MS_NOSUID as u64, libc::MS_BIND as u64];
const UMOUNT_FLAGS: &[u64] = &[0, libc::MNT_FORCE as u64, libc::MNT_DETACH as u64];
const SIGNALS: &[u64] = &[libc::SIGTERM as u64, libc::SIGKILL as u64, libc::SIGUSR1 as u64, libc::SIGSTOP as u64, libc::SIGCONT as u64, 0];
const IOCTL_REQUESTS: &[u64] = &[libc::FIONREAD as u64, libc::TCGETS as u64, 0x5401, 0x89f0];

/// Builds the representative table and returns it unactivated; the caller
/// (`main`) applies `--syscalls`/`--exclude`/`--group` on top.
pub fn build() -> SyscallTable {
    let descriptors = vec![
        SyscallDescriptor::new("read", Some(x86::READ), Some(x86_64::READ), args3(ArgTag::Fd, ArgTag::Addr, ArgTag::Len), 3, ReturnSemantics::Standard, SyscallFlags::NEED_ALARM | SyscallFlags::GROUP_FS),
        SyscallDescriptor::new("write", Some(x86::WRITE), Some(x86_64::WRITE), args3(ArgTag::Fd, ArgTag::Addr, ArgTag::Len), 3, ReturnSemantics::Standard, SyscallFlags::NEED_ALARM | SyscallFlags::GROUP_FS),
        SyscallDescriptor::new("open", Some(x86::OPEN), Some(x86_64::OPEN), args3(ArgTag::PathName, ArgTag::List(OPEN_FLAGS), ArgTag::ModeT), 3, ReturnSemantics::Fd, SyscallFlags::GROUP_FS)
            .with_post(close_returned_fd),
        SyscallDescriptor::new("openat", Some(x86::OPENAT), Some(x86_64::OPENAT), args4(ArgTag::Const(libc::AT_FDCWD as u64), ArgTag::PathName, ArgTag::List(OPEN_FLAGS), ArgTag::ModeT), 4, ReturnSemantics::Fd, SyscallFlags::GROUP_FS)
            .with_post(close_returned_fd),
        SyscallDescriptor::new("close", Some(x86::CLOSE), Some(x86_64::CLOSE), args1(ArgTag::Fd), 1, ReturnSemantics::Standard, SyscallFlags::GROUP_FS),
        SyscallDescriptor::new("fstat", Some(x86::FSTAT), Some(x86_64::FSTAT), args2(ArgTag::Fd, ArgTag::Addr), 2, ReturnSemantics::Standard, SyscallFlags::GROUP_FS),
        SyscallDescriptor::new("mmap", Some(x86::MMAP), Some(x86_64::MMAP), args6(ArgTag::Addr, ArgTag::Len, ArgTag::List(MMAP_PROT), ArgTag::List(MMAP_FLAGS), ArgTag::Fd, ArgTag::Range(0, 4096)), 6, ReturnSemantics::Standard, SyscallFlags::GROUP_VM),
        SyscallDescriptor::new("mprotect", Some(x86::MPROTECT), Some(x86_64::MPROTECT), args3(ArgTag::Addr, ArgTag::Len, ArgTag::List(MMAP_PROT)), 3, ReturnSemantics::Standard, SyscallFlags::GROUP_VM),
        SyscallDescriptor::new("munmap", Some(x86::MUNMAP), Some(x86_64::MUNMAP), args2(ArgTag::Addr, ArgTag::Len), 2, ReturnSemantics::Standard, SyscallFlags::GROUP_VM),
        SyscallDescriptor::new("madvise", Some(x86::MADVISE), Some(x86_64::MADVISE), args3(ArgTag::Addr, ArgTag::Len, ArgTag::Op(MADVISE_ADVICE)), 3, ReturnSemantics::Standard, SyscallFlags::GROUP_VM),
        SyscallDescriptor::new("ioctl", Some(x86::IOCTL), Some(x86_64::IOCTL), args3(ArgTag::Fd, ArgTag::Op(IOCTL_REQUESTS), ArgTag::Addr), 3, ReturnSemantics::Standard, SyscallFlags::NEED_ALARM | SyscallFlags::GROUP_FS),
        SyscallDescriptor::new("readv", Some(x86::READV), Some(x86_64::READV), args3(ArgTag::Fd, ArgTag::IoVec, ArgTag::IoVecLen), 3, ReturnSemantics::Standard, SyscallFlags::NEED_ALARM | SyscallFlags::GROUP_FS),
        SyscallDescriptor::new("writev", Some(x86::WRITEV), Some(x86_64::WRITEV), args3(ArgTag::Fd, ArgTag::IoVec, ArgTag::IoVecLen), 3, ReturnSemantics::Standard, SyscallFlags::NEED_ALARM | SyscallFlags::GROUP_FS),
        SyscallDescriptor::new("dup", Some(x86::DUP), Some(x86_64::DUP), args1(ArgTag::Fd), 1, ReturnSemantics::Fd, SyscallFlags::GROUP_FS)
            .with_post(close_returned_fd),
        SyscallDescriptor::new("dup2", Some(x86::DUP2), Some(x86_64::DUP2), args2(ArgTag::Fd, ArgTag::Range(0, 1024)), 2, ReturnSemantics::Fd, SyscallFlags::GROUP_FS),
        SyscallDescriptor::new("getpid", Some(x86::GETPID), Some(x86_64::GETPID), NONE6, 0, ReturnSemantics::Standard, SyscallFlags::GROUP_PROCESS),
        SyscallDescriptor::new("fork", Some(x86::FORK), Some(x86_64::FORK), NONE6, 0, ReturnSemantics::Standard, SyscallFlags::AVOID_CAPABILITY | SyscallFlags::GROUP_PROCESS),
        SyscallDescriptor::new("clone", Some(x86::CLONE), Some(x86_64::CLONE), args5(ArgTag::List(CLONE_FLAGS), ArgTag::Addr, ArgTag::Addr, ArgTag::Addr, ArgTag::Addr), 5, ReturnSemantics::Standard, SyscallFlags::AVOID_CAPABILITY | SyscallFlags::GROUP_PROCESS),
        SyscallDescriptor::new("kill", Some(x86::KILL), Some(x86_64::KILL), args2(ArgTag::Pid, ArgTag::List(SIGNALS)), 2, ReturnSemantics::Standard, SyscallFlags::GROUP_PROCESS),
        SyscallDescriptor::new("ptrace", Some(x86::PTRACE), Some(x86_64::PTRACE), args4(ArgTag::Op(PTRACE_REQUESTS), ArgTag::Pid, ArgTag::Addr, ArgTag::Addr), 4, ReturnSemantics::Standard, SyscallFlags::AVOID_CAPABILITY | SyscallFlags::GROUP_PROCESS),
        SyscallDescriptor::new("prctl", Some(x86::PRCTL), Some(x86_64::PRCTL), args5(ArgTag::Op(PRCTL_OPTIONS), ArgTag::Range(0, i64::MAX), ArgTag::Range(0, i64::MAX), ArgTag::Range(0, i64::MAX), ArgTag::Range(0, i64::MAX)), 5, ReturnSemantics::Standard, SyscallFlags::GROUP_PROCESS),
        SyscallDescriptor::new("mount", Some(x86::MOUNT), Some(x86_64::MOUNT), args5(ArgTag::PathName, ArgTag::PathName, ArgTag::PathName, ArgTag::List(MOUNT_FLAGS), ArgTag::Addr), 5, ReturnSemantics::Standard, SyscallFlags::AVOID_CAPABILITY | SyscallFlags::GROUP_FS),
        SyscallDescriptor::new("umount2", Some(x86::UMOUNT2), Some(x86_64::UMOUNT2), args2(ArgTag::PathName, ArgTag::List(UMOUNT_FLAGS)), 2, ReturnSemantics::Standard, SyscallFlags::AVOID_CAPABILITY | SyscallFlags::GROUP_FS),
        SyscallDescriptor::new("reboot", Some(x86::REBOOT), Some(x86_64::REBOOT), args4(ArgTag::Const(0xfee1dead), ArgTag::Const(672274793), ArgTag::Op(&[0x1234567, 0x4321fedc]), ArgTag::Addr), 4, ReturnSemantics::Standard, SyscallFlags::AVOID_CAPABILITY | SyscallFlags::GROUP_PROCESS),
        SyscallDescriptor::new("unshare", Some(x86::UNSHARE), Some(x86_64::UNSHARE), args1(ArgTag::List(CLONE_FLAGS)), 1, ReturnSemantics::Standard, SyscallFlags::AVOID_CAPABILITY | SyscallFlags::GROUP_PROCESS),
        SyscallDescriptor::new("setns", Some(x86::SETNS), Some(x86_64::SETNS), args2(ArgTag::Fd, ArgTag::List(CLONE_FLAGS)), 2, ReturnSemantics::Standard, SyscallFlags::AVOID_CAPABILITY | SyscallFlags::GROUP_PROCESS),
        SyscallDescriptor::new("eventfd2", Some(x86::EVENTFD2), Some(x86_64::EVENTFD2), args2(ArgTag::Range(0, 10), ArgTag::Const(0)), 2, ReturnSemantics::Fd, SyscallFlags::GROUP_IPC)
            .with_post(close_returned_fd),
        SyscallDescriptor::new("epoll_create1", Some(x86::EPOLL_CREATE1), Some(x86_64::EPOLL_CREATE1), args1(ArgTag::Const(0)), 1, ReturnSemantics::Fd, SyscallFlags::GROUP_IPC)
            .with_post(close_returned_fd),
        SyscallDescriptor::new("pipe2", Some(x86::PIPE2), Some(x86_64::PIPE2), args2(ArgTag::Addr, ArgTag::Const(0)), 2, ReturnSemantics::Standard, SyscallFlags::GROUP_IPC),
        SyscallDescriptor::new("socket", None, Some(x86_64::SOCKET), args3(ArgTag::List(SOCK_DOMAINS), ArgTag::List(SOCK_TYPES), ArgTag::Const(0)), 3, ReturnSemantics::Fd, SyscallFlags::GROUP_NET)
            .with_post(close_returned_fd),
        SyscallDescriptor::new("connect", None, Some(x86_64::CONNECT), args3(ArgTag::SocketInfo, ArgTag::SockAddr, ArgTag::SockAddrLen), 3, ReturnSemantics::Standard, SyscallFlags::NEED_ALARM | SyscallFlags::GROUP_NET)
            .with_sanitise(sanitise_socketinfo_arg0),
        SyscallDescriptor::new("bind", None, Some(x86_64::BIND), args3(ArgTag::SocketInfo, ArgTag::SockAddr, ArgTag::SockAddrLen), 3, ReturnSemantics::Standard, SyscallFlags::GROUP_NET)
            .with_sanitise(sanitise_socketinfo_arg0),
        SyscallDescriptor::new("listen", None, Some(x86_64::LISTEN), args2(ArgTag::Fd, ArgTag::Range(0, 128)), 2, ReturnSemantics::Standard, SyscallFlags::GROUP_NET),
        SyscallDescriptor::new("accept", None, Some(x86_64::ACCEPT), args3(ArgTag::Fd, ArgTag::Addr, ArgTag::Addr), 3, ReturnSemantics::Fd, SyscallFlags::NEED_ALARM | SyscallFlags::GROUP_NET)
            .with_post(close_returned_fd),
        SyscallDescriptor::new("sendto", None, Some(x86_64::SENDTO), args6(ArgTag::SocketInfo, ArgTag::Addr, ArgTag::Len, ArgTag::List(&[0, libc::MSG_DONTWAIT as u64]), ArgTag::SockAddr, ArgTag::SockAddrLen), 6, ReturnSemantics::Standard, SyscallFlags::NEED_ALARM | SyscallFlags::GROUP_NET)
            .with_sanitise(sanitise_socketinfo_arg0),
        SyscallDescriptor::new("recvfrom", None, Some(x86_64::RECVFROM), args6(ArgTag::Fd, ArgTag::Addr, ArgTag::Len, ArgTag::List(&[0, libc::MSG_DONTWAIT as u64]), ArgTag::Addr, ArgTag::Addr), 6, ReturnSemantics::Standard, SyscallFlags::NEED_ALARM | SyscallFlags::GROUP_NET),
        SyscallDescriptor::new("setsockopt", None, Some(x86_64::SETSOCKOPT), args5(ArgTag::Fd, ArgTag::Range(0, 6), ArgTag::Range(0, 32), ArgTag::Addr, ArgTag::Len), 5, ReturnSemantics::Standard, SyscallFlags::GROUP_NET),
    ];
    SyscallTable::new(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_at_least_one_descriptor_per_group() {
        let table = build();
        table.activate_all();
        assert!(table.active_count() >= 24);
    }

    #[test]
    fn activating_a_known_name_works() {
        let table = build();
        assert!(table.activate_by_name("connect"));
        assert_eq!(table.active_count(), 1);
    }

    #[test]
    fn net_group_picks_up_socket_family() {
        let table = build();
        assert!(table.activate_by_group(SyscallFlags::GROUP_NET));
        assert!(table.active_count() >= 8);
    }
}
