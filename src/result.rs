//! Types and constants for interpreting raw results from the kernel.

/// The result type used when a caller wants Rust-style error handling
/// around a raw syscall return value.
pub type Result<T> = core::result::Result<T, Error>;

/// Represents an error code directly from the kernel (a positive errno
/// value, with the kernel's own sign convention already removed).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(transparent)]
pub struct Error(pub i32);

impl Error {
    #[inline(always)]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }
}

/// Splits a raw return value from [`crate::raw::invoke`] into success/error,
/// following the kernel convention that negative values in `-4095..0`
/// represent `-errno`.
#[inline]
pub fn unpack_standard_result(raw: i64) -> Result<i64> {
    if (-4095..0).contains(&raw) {
        Err(Error::new(-raw as i32))
    } else {
        Ok(raw)
    }
}

pub const EPERM: i32 = 1;
pub const ENOENT: i32 = 2;
pub const EINTR: i32 = 4;
pub const EIO: i32 = 5;
pub const EBADF: i32 = 9;
pub const EAGAIN: i32 = 11;
pub const ENOMEM: i32 = 12;
pub const EACCES: i32 = 13;
pub const EFAULT: i32 = 14;
pub const EEXIST: i32 = 17;
pub const EINVAL: i32 = 22;
pub const EMFILE: i32 = 24;
pub const ENOSYS: i32 = 38;
