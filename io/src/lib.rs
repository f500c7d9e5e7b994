//! Lightweight, safe-ish abstractions around the handful of Linux system
//! calls the fuzzer's FD registry needs in order to stock its pools: opening
//! regular files, pipes, sockets, epoll instances, eventfds, and perf events.
//!
//! This is deliberately narrower than a general-purpose I/O crate: it
//! exists to get a live, valid file descriptor of each of those kinds into a
//! [`Fd`] wrapper, not to provide a full safe API over everything you can do
//! with one afterwards (that's the fuzzer's job, applied to descriptors it
//! drew from the pool).

mod fd;
mod pools;
pub mod result;

pub use fd::Fd;
pub use pools::{open_epoll, open_eventfd, open_file, open_perf_event, open_pipe, open_socket};

#[cfg(test)]
mod tests;
