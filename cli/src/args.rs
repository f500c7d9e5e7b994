//! Command-line surface (§6 of the core spec). Parsing lives entirely in
//! this collaborator crate; the engine never sees a `clap` type, only the
//! plain values `main` derives from it (a [`trinity_engine::SupervisorConfig`],
//! a built and activated [`trinity_engine::SyscallTable`], a seed).

use clap::Parser;

/// A kernel system-call fuzzer.
#[derive(Parser, Debug)]
#[command(name = "trinity", version, about, long_about = None)]
pub struct Args {
    /// Number of child worker processes (defaults to the number of online CPUs).
    #[arg(long)]
    pub children: Option<u32>,

    /// Fuzz only these syscalls, or a named group (repeatable, comma-separated).
    #[arg(short = 'c', long = "syscalls", value_delimiter = ',')]
    pub syscalls: Vec<String>,

    /// Exclude these syscalls from the active set (repeatable, comma-separated).
    #[arg(short = 'x', long = "exclude", value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Activate every syscall in this named group (e.g. "net", "fs", "vm").
    #[arg(long)]
    pub group: Option<String>,

    /// Restrict synthesised socket syscalls to this protocol family (e.g. "inet", "unix").
    #[arg(long)]
    pub proto: Option<String>,

    /// Reproducible PRNG seed; a random one is drawn if omitted.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Acknowledge running as root. Without this, trinity refuses to start
    /// as root (it can wedge an unvirtualised machine).
    #[arg(long)]
    pub dangerous: bool,

    /// Suppress most stdout chatter; log files are still written.
    #[arg(long)]
    pub quiet: bool,

    /// Keep SIGSEGV at its default disposition so crashing children core dump.
    #[arg(long)]
    pub debug: bool,

    /// Disable ANSI colour in stdout/log output.
    #[arg(long)]
    pub monochrome: bool,

    /// Fuzz only the 32-bit syscall numbers.
    #[arg(long = "32")]
    pub bits32: bool,

    /// Fuzz only the 64-bit syscall numbers.
    #[arg(long = "64")]
    pub bits64: bool,

    /// Dump the syscall table (name, arity, flags) and exit without fuzzing.
    #[arg(long)]
    pub list: bool,

    /// Stop after this many total invocations across all children (default: unbounded).
    #[arg(long)]
    pub max_execs: Option<u64>,

    /// Stop after this many seconds (default: unbounded).
    #[arg(long)]
    pub max_runtime: Option<u64>,
}

/// Which syscall-number width(s) a run should dispatch against, derived
/// from `--32`/`--64`. Defaults to the host's native width when neither is
/// given, matching `trinity.c`'s behaviour of auto-detecting `biarch`
/// rather than requiring the user to say so explicitly every time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arch {
    Only32,
    Only64,
    Biarch,
}

impl Args {
    pub fn arch(&self) -> Arch {
        match (self.bits32, self.bits64) {
            (true, true) => Arch::Biarch,
            (true, false) => Arch::Only32,
            (false, true) => Arch::Only64,
            (false, false) => {
                if cfg!(target_pointer_width = "64") {
                    Arch::Only64
                } else {
                    Arch::Only32
                }
            }
        }
    }
}
