//! The fuzzing engine core: the shared control block, FD registry, argument
//! synthesiser, syscall table, child worker state machine, supervisor, and
//! watchdog (components C1-C9 of the system this crate implements).
//!
//! Everything a caller needs to pick syscall descriptors, open FD pools, and
//! run the supervisor loop lives here. Argument-list parsing, log-file
//! formatting, and the concrete per-architecture syscall number tables are
//! the `cli` crate's job — this crate only specifies the registry and
//! dispatch those collaborators plug data into.

pub mod control;
pub mod error;
pub mod fdreg;
pub mod pages;
pub mod random;
pub mod signals;
pub mod supervisor;
pub mod synth;
pub mod table;
pub mod watchdog;
pub mod worker;

pub use control::{ChildSlot, ExitReason, SharedControl, SharedMap, SyscallState, MAX_CHILDREN};
pub use error::{Error, Result};
pub use fdreg::{generic_fd_from_socketinfo, FdRegistry};
pub use pages::Pages;
pub use random::Rng;
pub use supervisor::{SupervisorConfig};
pub use synth::ArgTag;
pub use table::{ReturnSemantics, SyscallDescriptor, SyscallFlags, SyscallTable};
pub use watchdog::WatchdogConfig;
