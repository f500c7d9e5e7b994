//! The FD registry (C3): a fixed set of pools opened once at startup, one
//! per kernel resource kind, and the `get_random_fd` protocol that children
//! draw from during argument synthesis.
//!
//! Pools are append-once and read-only after `FdRegistry::open_all`
//! returns. File descriptor *numbers* are ordinary process state, so each
//! forked child simply inherits its own copy of the same pools; there is
//! nothing here that needs to live in the shared control block.

use std::sync::atomic::Ordering;

use crate::control::SharedControl;
use crate::error::{Error, Result};
use crate::random::Rng;

const SOCKET_POOL_SIZE: usize = 8;
const PIPE_POOL_PAIRS: usize = 4;
const EPOLL_POOL_SIZE: usize = 4;
const EVENTFD_POOL_SIZE: usize = 4;
const PERF_POOL_SIZE: usize = 2;
const FILE_POOL_SIZE: usize = 8;

struct Pool {
    name: &'static str,
    fds: Vec<i32>,
}

impl Pool {
    fn draw(&self, rng: &mut Rng) -> i32 {
        if self.fds.is_empty() {
            return -1;
        }
        let idx = rng.range_usize(0, self.fds.len() - 1);
        self.fds[idx]
    }
}

pub struct FdRegistry {
    pools: Vec<Pool>,
}

fn open_socket_pool() -> std::io::Result<Vec<i32>> {
    let mut v = Vec::with_capacity(SOCKET_POOL_SIZE);
    for _ in 0..SOCKET_POOL_SIZE {
        let fd = trinity_io::open_socket(libc::AF_INET, libc::SOCK_STREAM, 0)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        v.push(fd.into_raw_fd());
    }
    Ok(v)
}

fn open_pipe_pool() -> std::io::Result<Vec<i32>> {
    let mut v = Vec::with_capacity(PIPE_POOL_PAIRS * 2);
    for _ in 0..PIPE_POOL_PAIRS {
        let (r, w) = trinity_io::open_pipe().map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        v.push(r.into_raw_fd());
        v.push(w.into_raw_fd());
    }
    Ok(v)
}

fn open_epoll_pool() -> std::io::Result<Vec<i32>> {
    (0..EPOLL_POOL_SIZE)
        .map(|_| trinity_io::open_epoll().map(|fd| fd.into_raw_fd()).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))
        .collect()
}

fn open_eventfd_pool() -> std::io::Result<Vec<i32>> {
    (0..EVENTFD_POOL_SIZE)
        .map(|_| trinity_io::open_eventfd(0).map(|fd| fd.into_raw_fd()).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))
        .collect()
}

fn open_perf_pool() -> std::io::Result<Vec<i32>> {
    // perf_event_open is refused under many container/seccomp profiles;
    // an empty pool here just means get_random_fd never draws PERF, not a
    // startup failure the way an empty socket/pipe/file pool would be.
    let mut v = Vec::with_capacity(PERF_POOL_SIZE);
    for _ in 0..PERF_POOL_SIZE {
        if let Ok(fd) = trinity_io::open_perf_event() {
            v.push(fd.into_raw_fd());
        }
    }
    Ok(v)
}

fn open_file_pool() -> std::io::Result<Vec<i32>> {
    let mut v = Vec::with_capacity(FILE_POOL_SIZE);
    for i in 0..FILE_POOL_SIZE {
        let path = std::env::temp_dir().join(format!("trinity-fuzz-fd-{}-{}", std::process::id(), i));
        let cpath = std::ffi::CString::new(path.to_string_lossy().as_bytes())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let fd = trinity_io::open_file(&cpath, libc::O_CREAT | libc::O_RDWR, 0o600)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        // Unlinked immediately: the pool only wants a live fd, never a name
        // on disk that would survive the process.
        let _ = std::fs::remove_file(&path);
        v.push(fd.into_raw_fd());
    }
    Ok(v)
}

type Opener = fn() -> std::io::Result<Vec<i32>>;

const PROVIDERS: &[(&str, Opener)] = &[
    ("socket", open_socket_pool as Opener),
    ("pipe", open_pipe_pool as Opener),
    ("epoll", open_epoll_pool as Opener),
    ("eventfd", open_eventfd_pool as Opener),
    ("perf_event", open_perf_pool as Opener),
    ("file", open_file_pool as Opener),
];

impl FdRegistry {
    /// Opens every provider's pool. A provider returning an empty pool is
    /// fine (it just never gets drawn); a provider erroring out is fatal,
    /// since that indicates something more fundamental than "this resource
    /// isn't supported here" (e.g. out of descriptors).
    pub fn open_all() -> Result<Self> {
        let mut pools = Vec::with_capacity(PROVIDERS.len());
        for (name, open) in PROVIDERS {
            let fds = open().map_err(|_| Error::NoFdPools)?;
            pools.push(Pool { name, fds });
        }
        if pools.iter().all(|p| p.fds.is_empty()) {
            return Err(Error::NoFdPools);
        }
        Ok(Self { pools })
    }

    /// Draws a descriptor from a uniformly-chosen non-empty pool. Never
    /// returns a non-positive value: a pool draw that lands on fd 0 (or an
    /// empty pool) is retried against a different pool.
    pub fn draw_fresh(&self, rng: &mut Rng) -> i32 {
        loop {
            let idx = rng.range_usize(0, self.pools.len() - 1);
            let fd = self.pools[idx].draw(rng);
            if fd > 0 {
                return fd;
            }
        }
    }

    pub fn pool_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.pools.iter().map(|p| p.name)
    }

    /// Draws from the named pool specifically (e.g. `"socket"` for
    /// `ArgTag::SocketInfo`), falling back to any pool if that one is
    /// missing or empty.
    pub fn draw_from_named_pool(&self, name: &str, rng: &mut Rng) -> i32 {
        if let Some(pool) = self.pools.iter().find(|p| p.name == name) {
            let fd = pool.draw(rng);
            if fd > 0 {
                return fd;
            }
        }
        self.draw_fresh(rng)
    }
}

/// Unpacks the plain fd a real syscall argument expects out of the
/// `(family << 32) | fd` encoding [`crate::synth::ArgTag::SocketInfo`]
/// produces. Grounded on the original fuzzer's `generic_fd_from_socketinfo`,
/// called from a descriptor's `sanitise` hook (e.g. `connect`'s).
pub fn generic_fd_from_socketinfo(encoded: u64) -> u64 {
    encoded & 0xffff_ffff
}

/// The shared "current fd" protocol (§4.3): most draws reuse the same fd
/// for a run of several syscalls in a row, rather than drawing fresh every
/// time, since kernel state built up by prior calls on a descriptor is part
/// of what makes later calls on it interesting.
pub fn get_random_fd(ctrl: &SharedControl, registry: &FdRegistry, rng: &mut Rng) -> i32 {
    if rng.one_in(4) {
        return registry.draw_fresh(rng);
    }
    loop {
        let lifetime = ctrl.fd_lifetime.load(Ordering::Acquire);
        if lifetime == 0 {
            let fresh = registry.draw_fresh(rng);
            ctrl.current_fd.store(fresh, Ordering::Release);
            let span = ctrl.max_children.load(Ordering::Relaxed).max(5) as u64;
            let new_lifetime = rng.range_u64(5, span) as u32;
            ctrl.fd_lifetime.store(new_lifetime, Ordering::Release);
        } else {
            ctrl.fd_lifetime.fetch_sub(1, Ordering::AcqRel);
        }
        let current = ctrl.current_fd.load(Ordering::Acquire);
        if current > 0 {
            return current;
        }
        // A stale or never-set current_fd: force a fresh draw next pass.
        ctrl.fd_lifetime.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::SharedMap;

    #[test]
    fn draw_fresh_never_returns_nonpositive() {
        let registry = FdRegistry::open_all().expect("open_all");
        let mut rng = Rng::new(1);
        for _ in 0..200 {
            assert!(registry.draw_fresh(&mut rng) > 0);
        }
    }

    #[test]
    fn get_random_fd_reuses_across_calls() {
        let map = SharedMap::create(1, 4).unwrap();
        let ctrl = map.get();
        let registry = FdRegistry::open_all().expect("open_all");
        let mut rng = Rng::new(2);
        let mut reused = false;
        let first = get_random_fd(ctrl, &registry, &mut rng);
        for _ in 0..64 {
            if get_random_fd(ctrl, &registry, &mut rng) == first {
                reused = true;
                break;
            }
        }
        assert!(reused, "expected at least one reuse of a previously drawn fd");
    }
}
