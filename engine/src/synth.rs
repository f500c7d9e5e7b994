//! The argument synthesiser (C4): turns a syscall descriptor's declared
//! per-argument tags into the actual register values a worker invokes the
//! syscall with.

use crate::fdreg::{get_random_fd, FdRegistry};
use crate::pages::{biased_pointer, Pages};
use crate::control::SharedControl;
use crate::random::Rng;

/// How one argument slot of a syscall descriptor should be produced.
#[derive(Clone, Copy, Debug)]
pub enum ArgTag {
    /// A file descriptor drawn from the registry's pools.
    Fd,
    /// A structured "which socket, of what family" descriptor: encodes a
    /// fd drawn specifically from the socket pool together with an
    /// address family, the way the original fuzzer carried a
    /// `struct socketinfo *` until a per-call sanitise hook lowered it to
    /// the plain fd a real syscall argument expects (see
    /// [`crate::fdreg::generic_fd_from_socketinfo`]). Synthesis alone never
    /// produces a valid raw argument for this tag — a descriptor using it
    /// must supply a `sanitise` hook.
    SocketInfo,
    /// A `struct sockaddr *`, paired with a `SockAddrLen` elsewhere in the
    /// same call.
    SockAddr,
    /// The length that goes with a preceding `SockAddr` argument.
    SockAddrLen,
    /// A size/length-shaped value: 0, 1, a power of two, `-1` as unsigned,
    /// or `INT_MAX`, biased toward the edges a length argument actually
    /// breaks on.
    Len,
    /// A process ID: self, init, or a small random value.
    Pid,
    /// A uniform value in an inclusive range fixed by the descriptor.
    Range(i64, i64),
    /// A uniform pick from a fixed, descriptor-supplied list of values
    /// (flag combinations, valid opcodes, ...).
    List(&'static [u64]),
    /// An operation selector (an `ioctl`/`futex`-style opcode): uniform
    /// pick from a fixed list, same as `List` but named for what the
    /// argument means rather than its shape.
    Op(&'static [u64]),
    /// A `mode_t`-shaped value.
    ModeT,
    /// A pointer: NULL, a sentinel page, a heap allocation, or a
    /// kernel-range address.
    Addr,
    /// Like `Addr` but never NULL.
    NonNullAddr,
    /// An `iovec` array, paired with `IoVecLen`.
    IoVec,
    /// The count that goes with a preceding `IoVec` argument.
    IoVecLen,
    /// A `NUL`-terminated path, usually nonexistent, under the fuzzer's
    /// scratch directory.
    PathName,
    /// A literal value fixed by the descriptor, not synthesised.
    Const(u64),
}

const IOVEC_MAX: usize = 4;
const IOVEC_DATA_LEN: usize = 256;

/// Per-call synthesis scratch space. One of these is built fresh for each
/// syscall a worker is about to invoke; the scratch buffers back whatever
/// pointer arguments that one call needs, and are kept alive only as long
/// as the descriptor's `PRE`/`DURING` stages need them.
pub struct SynthesisContext<'a> {
    rng: &'a mut Rng,
    pages: &'a Pages,
    registry: &'a FdRegistry,
    ctrl: &'a SharedControl,
    sockaddr_scratch: Box<[u8; 128]>,
    last_sockaddr_len: u32,
    iovec_scratch: Box<[libc::iovec; IOVEC_MAX]>,
    iovec_data: Box<[u8; IOVEC_DATA_LEN]>,
    last_iovec_count: u32,
    pathname_scratch: Box<[u8; 64]>,
}

impl<'a> SynthesisContext<'a> {
    pub fn new(rng: &'a mut Rng, pages: &'a Pages, registry: &'a FdRegistry, ctrl: &'a SharedControl) -> Self {
        Self {
            rng,
            pages,
            registry,
            ctrl,
            sockaddr_scratch: Box::new([0; 128]),
            last_sockaddr_len: 0,
            iovec_scratch: Box::new([libc::iovec { iov_base: std::ptr::null_mut(), iov_len: 0 }; IOVEC_MAX]),
            iovec_data: Box::new([0; IOVEC_DATA_LEN]),
            last_iovec_count: 0,
            pathname_scratch: Box::new([0; 64]),
        }
    }

    pub fn synthesize(&mut self, tag: ArgTag) -> u64 {
        match tag {
            ArgTag::Fd => get_random_fd(self.ctrl, self.registry, self.rng) as u64,
            ArgTag::SocketInfo => self.synth_socketinfo(),
            ArgTag::SockAddr => self.synth_sockaddr(),
            ArgTag::SockAddrLen => self.last_sockaddr_len as u64,
            ArgTag::Len => self.synth_len(),
            ArgTag::Pid => self.synth_pid(),
            ArgTag::Range(lo, hi) => self.rng.range_u64(lo as u64, hi as u64),
            ArgTag::List(values) | ArgTag::Op(values) => {
                let idx = self.rng.range_usize(0, values.len() - 1);
                values[idx]
            }
            ArgTag::ModeT => self.rng.range_u64(0, 0o7777),
            ArgTag::Addr => biased_pointer(self.rng, self.pages),
            ArgTag::NonNullAddr => loop {
                let p = biased_pointer(self.rng, self.pages);
                if p != 0 {
                    break p;
                }
            },
            ArgTag::IoVec => self.synth_iovec(),
            ArgTag::IoVecLen => self.last_iovec_count as u64,
            ArgTag::PathName => self.synth_pathname(),
            ArgTag::Const(v) => v,
        }
    }

    fn synth_len(&mut self) -> u64 {
        match self.rng.range_u64(0, 4) {
            0 => 0,
            1 => 1,
            2 => 1u64 << self.rng.range_u64(1, 31),
            3 => u64::MAX,
            _ => i32::MAX as u64,
        }
    }

    fn synth_pid(&mut self) -> u64 {
        match self.rng.range_u64(0, 2) {
            0 => std::process::id() as u64,
            1 => 1,
            _ => self.rng.range_u64(0, 1 << 20),
        }
    }

    /// Draws a fd specifically from the socket pool (falling back to any
    /// pool if the socket pool is empty) and packs it with a random address
    /// family into the upper 32 bits, mirroring `struct socketinfo` until a
    /// descriptor's `sanitise` hook unpacks it back down to a plain fd.
    fn synth_socketinfo(&mut self) -> u64 {
        let fd = self.registry.draw_from_named_pool("socket", self.rng);
        let family = match self.rng.range_u64(0, 2) {
            0 => libc::AF_INET as u64,
            1 => libc::AF_INET6 as u64,
            _ => libc::AF_UNIX as u64,
        };
        (family << 32) | (fd as u32 as u64)
    }

    fn synth_sockaddr(&mut self) -> u64 {
        let (family, len) = match self.rng.range_u64(0, 2) {
            0 => (libc::AF_INET as u16, std::mem::size_of::<libc::sockaddr_in>()),
            1 => (libc::AF_INET6 as u16, std::mem::size_of::<libc::sockaddr_in6>()),
            _ => (libc::AF_UNIX as u16, std::mem::size_of::<libc::sockaddr_un>()),
        };
        let len = len.min(self.sockaddr_scratch.len());
        self.sockaddr_scratch[0..2].copy_from_slice(&family.to_ne_bytes());
        for b in self.sockaddr_scratch[2..len].iter_mut() {
            *b = self.rng.next_u32() as u8;
        }
        self.last_sockaddr_len = len as u32;
        self.sockaddr_scratch.as_ptr() as u64
    }

    fn synth_iovec(&mut self) -> u64 {
        let count = self.rng.range_usize(1, IOVEC_MAX);
        let chunk_len = IOVEC_DATA_LEN / IOVEC_MAX;
        for (i, entry) in self.iovec_scratch.iter_mut().enumerate().take(count) {
            let base = unsafe { self.iovec_data.as_mut_ptr().add(i * chunk_len) };
            let len = self.rng.range_usize(0, chunk_len);
            entry.iov_base = base as *mut libc::c_void;
            entry.iov_len = len;
        }
        self.last_iovec_count = count as u32;
        self.iovec_scratch.as_ptr() as u64
    }

    fn synth_pathname(&mut self) -> u64 {
        if self.rng.one_in(8) {
            // Occasionally hand back a sentinel page instead of a real
            // path, to exercise the kernel's path-copy-in error handling.
            return self.pages.zeros_addr();
        }
        let mut name = format!("./tmp/fuzz{:08x}", self.rng.next_u32());
        name.push('\0');
        let bytes = name.as_bytes();
        let len = bytes.len().min(self.pathname_scratch.len());
        self.pathname_scratch[..len].copy_from_slice(&bytes[..len]);
        *self.pathname_scratch.last_mut().unwrap() = 0;
        self.pathname_scratch.as_ptr() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::SharedMap;

    #[test]
    fn const_tag_is_passthrough() {
        let map = SharedMap::create(1, 1).unwrap();
        let registry = FdRegistry::open_all().unwrap();
        let mut rng = Rng::new(5);
        let pages = Pages::new(&mut rng).unwrap();
        let mut ctx = SynthesisContext::new(&mut rng, &pages, &registry, map.get());
        assert_eq!(ctx.synthesize(ArgTag::Const(0xdead)), 0xdead);
    }

    #[test]
    fn sockaddr_then_len_are_paired() {
        let map = SharedMap::create(1, 1).unwrap();
        let registry = FdRegistry::open_all().unwrap();
        let mut rng = Rng::new(5);
        let pages = Pages::new(&mut rng).unwrap();
        let mut ctx = SynthesisContext::new(&mut rng, &pages, &registry, map.get());
        let ptr = ctx.synthesize(ArgTag::SockAddr);
        let len = ctx.synthesize(ArgTag::SockAddrLen);
        assert_ne!(ptr, 0);
        assert!(len > 0);
    }

    #[test]
    fn socketinfo_lowers_to_a_positive_fd() {
        let map = SharedMap::create(1, 1).unwrap();
        let registry = FdRegistry::open_all().unwrap();
        let mut rng = Rng::new(11);
        let pages = Pages::new(&mut rng).unwrap();
        let mut ctx = SynthesisContext::new(&mut rng, &pages, &registry, map.get());
        let encoded = ctx.synthesize(ArgTag::SocketInfo);
        let fd = crate::fdreg::generic_fd_from_socketinfo(encoded);
        assert!(fd > 0 && fd <= u32::MAX as u64);
    }

    #[test]
    fn non_null_addr_never_zero() {
        let map = SharedMap::create(1, 1).unwrap();
        let registry = FdRegistry::open_all().unwrap();
        let mut rng = Rng::new(9);
        let pages = Pages::new(&mut rng).unwrap();
        let mut ctx = SynthesisContext::new(&mut rng, &pages, &registry, map.get());
        for _ in 0..256 {
            assert_ne!(ctx.synthesize(ArgTag::NonNullAddr), 0);
        }
    }
}
