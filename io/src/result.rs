//! Result type for this crate, converting from `std::io::Error` so callers
//! don't need to know whether a given failure came from `libc` or from a
//! direct syscall.

pub type Result<T> = std::result::Result<T, Error>;

/// An error opening one of the kernel resources this crate wraps.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}: {1}")]
    Os(&'static str, std::io::Error),
}

impl Error {
    pub(crate) fn last(context: &'static str) -> Self {
        Self::Os(context, std::io::Error::last_os_error())
    }

    /// Builds an error from a raw `-errno` value, for callers going through
    /// a bare syscall rather than a `libc` wrapper that sets `errno` itself.
    pub(crate) fn from_raw_errno(context: &'static str, errno: i32) -> Self {
        Self::Os(context, std::io::Error::from_raw_os_error(errno))
    }
}
