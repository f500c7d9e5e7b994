//! A low-level, unsafe Rust interface to Linux system calls.
//!
//! The [`raw`] module provides functions wrapping platform-specific assembly
//! language stubs for making arbitrary system calls by providing a system
//! call number and arbitrary number of arguments. [`raw::invoke`] is the
//! generic entry point: it dispatches to the right `syscallN` stub purely
//! from an argument count, which is what lets a caller invoke a syscall that
//! is only known at runtime as `(number, arity)` pulled out of a data table,
//! rather than as a named wrapper function.
//!
//! This crate currently supports the following architectures:
//!
//! - x86_64
//! - x86 (32-bit)
//! - arm
//! - riscv64
//!
//! The types in the crate root describe the memory layout of objects the
//! kernel will interpret. For those which are aliases, calling code must
//! always use the aliases rather than their underlying types because their
//! exact definitions may vary on different platforms.
//!
//! # Be careful mixing with `std`
//!
//! The Rust `std` crate has lots of functionality that wraps the target's
//! libc functions. On Linux systems libc is a wrapper around the same system
//! call interface this crate is exposing, but also adds other state and
//! abstractions such as buffers and error codes. Making direct system calls
//! may violate the assumptions being made by libc.
#![no_std]

mod types;
pub use types::*;

pub mod result;

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
#[path = "raw/x86_64.rs"]
pub mod raw;

#[cfg(all(target_os = "linux", target_arch = "x86"))]
#[path = "raw/x86.rs"]
pub mod raw;

#[cfg(all(target_os = "linux", target_arch = "arm"))]
#[path = "raw/arm.rs"]
pub mod raw;

#[cfg(all(target_os = "linux", target_arch = "riscv64"))]
#[path = "raw/riscv64.rs"]
pub mod raw;

#[cfg(test)]
mod tests;
