//! Error type for the engine crate.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("mmap of the shared control block failed: {0}")]
    Mmap(std::io::Error),

    #[error("no file descriptor pools are available; every provider failed to open")]
    NoFdPools,

    #[error("fork failed: {0}")]
    Fork(#[from] nix::Error),

    #[error("no syscalls are active; every descriptor was excluded")]
    NoActiveSyscalls,

    #[error("child slot table only holds {0} slots")]
    TooManyChildren(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
