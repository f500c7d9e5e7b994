//! The syscall table (C5): the registry of what a worker is allowed to
//! call and how to build its arguments. The descriptors themselves are
//! data the `cli` crate owns (each one names a real syscall); this module
//! only knows the generic shape of an entry and how to pick, activate, and
//! validate them.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::synth::ArgTag;
use crate::random::Rng;

bitflags::bitflags! {
    /// Per-descriptor behavioural and grouping flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SyscallFlags: u32 {
        /// This syscall can block indefinitely; the worker arms an alarm
        /// before invoking it.
        const NEED_ALARM        = 1 << 0;
        /// Avoid unless running with elevated capabilities requested.
        const AVOID_CAPABILITY  = 1 << 1;
        const GROUP_VM           = 1 << 2;
        const GROUP_NET          = 1 << 3;
        const GROUP_FS           = 1 << 4;
        const GROUP_IPC          = 1 << 5;
        const GROUP_PROCESS      = 1 << 6;
    }
}

/// Classifies what a descriptor's raw return value represents on success.
/// `errno` accounting is identical for every variant (negative values in
/// `-4095..0` are `-errno`, anything else succeeded); this only documents
/// what the non-negative case *means*, for descriptors and callers that care
/// (e.g. telling a plain count apart from a newly-minted fd).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReturnSemantics {
    /// The success value carries no particular meaning beyond "it worked".
    Standard,
    /// A successful call returns a new file descriptor.
    Fd,
}

/// A single call's synthesised arguments and the outcome of invoking it,
/// passed to a descriptor's sanitise/post hooks.
pub struct SyscallRecord {
    pub args: [u64; 6],
    pub num_args: usize,
    pub retval: i64,
    pub errno_val: i32,
}

pub type SanitiseHook = fn(&mut SyscallRecord);
pub type PostHook = fn(&mut SyscallRecord);

pub struct SyscallDescriptor {
    pub name: &'static str,
    pub number_32: Option<u32>,
    pub number_64: Option<u32>,
    pub arg_types: [Option<ArgTag>; 6],
    pub num_args: usize,
    pub return_semantics: ReturnSemantics,
    pub flags: SyscallFlags,
    /// Runs after synthesis, before invocation: lets a descriptor correct
    /// an argument that depends on another (e.g. lowering a paired
    /// descriptor down to the concrete fd it resolved to).
    pub sanitise: Option<SanitiseHook>,
    /// Runs after invocation, before the result is recorded: lets a
    /// descriptor clean up a resource it opened as a side effect.
    pub post: Option<PostHook>,
    pub active: AtomicBool,
}

impl SyscallDescriptor {
    pub const fn new(
        name: &'static str,
        number_32: Option<u32>,
        number_64: Option<u32>,
        arg_types: [Option<ArgTag>; 6],
        num_args: usize,
        return_semantics: ReturnSemantics,
        flags: SyscallFlags,
    ) -> Self {
        Self {
            name,
            number_32,
            number_64,
            arg_types,
            num_args,
            return_semantics,
            flags,
            sanitise: None,
            post: None,
            active: AtomicBool::new(false),
        }
    }

    pub const fn with_sanitise(mut self, hook: SanitiseHook) -> Self {
        self.sanitise = Some(hook);
        self
    }

    pub const fn with_post(mut self, hook: PostHook) -> Self {
        self.post = Some(hook);
        self
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }
}

pub struct SyscallTable {
    descriptors: Vec<SyscallDescriptor>,
}

impl SyscallTable {
    pub fn new(descriptors: Vec<SyscallDescriptor>) -> Self {
        Self { descriptors }
    }

    pub fn activate_all(&self) {
        for d in &self.descriptors {
            d.active.store(true, Ordering::Relaxed);
        }
    }

    pub fn activate_by_name(&self, name: &str) -> bool {
        let mut found = false;
        for d in &self.descriptors {
            if d.name == name {
                d.active.store(true, Ordering::Relaxed);
                found = true;
            }
        }
        found
    }

    pub fn deactivate_by_name(&self, name: &str) -> bool {
        let mut found = false;
        for d in &self.descriptors {
            if d.name == name {
                d.active.store(false, Ordering::Relaxed);
                found = true;
            }
        }
        found
    }

    pub fn activate_by_group(&self, group: SyscallFlags) -> bool {
        let mut found = false;
        for d in &self.descriptors {
            if d.flags.contains(group) {
                d.active.store(true, Ordering::Relaxed);
                found = true;
            }
        }
        found
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.descriptors.iter().map(|d| d.name)
    }

    /// At least one descriptor must be active before a run can start.
    pub fn validate(&self) -> bool {
        self.descriptors.iter().any(SyscallDescriptor::is_active)
    }

    /// In a biarch build, every descriptor must carry both syscall numbers
    /// or it can't be dispatched correctly regardless of which bitness a
    /// given worker runs as.
    pub fn validate_biarch(&self) -> bool {
        self.descriptors
            .iter()
            .filter(|d| d.is_active())
            .all(|d| d.number_32.is_some() && d.number_64.is_some())
    }

    pub fn active_count(&self) -> usize {
        self.descriptors.iter().filter(|d| d.is_active()).count()
    }

    pub fn pick_active(&self, rng: &mut Rng) -> Option<(usize, &SyscallDescriptor)> {
        let active: Vec<(usize, &SyscallDescriptor)> = self
            .descriptors
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_active())
            .collect();
        if active.is_empty() {
            return None;
        }
        let idx = rng.range_usize(0, active.len() - 1);
        Some(active[idx])
    }

    pub fn number_for(&self, descriptor: &SyscallDescriptor, bits64: bool) -> Option<u32> {
        if bits64 {
            descriptor.number_64
        } else {
            descriptor.number_32
        }
    }

    pub fn get(&self, index: usize) -> Option<&SyscallDescriptor> {
        self.descriptors.get(index)
    }

    /// Deactivates every active descriptor missing a syscall number for the
    /// given width, returning the names dropped. A collaborator restricting
    /// a run to one width (`--32`/`--64`) calls this after applying its own
    /// name/group selection, so a descriptor that only makes sense on one
    /// arch never gets dispatched with a bogus number from the other.
    pub fn drop_unsupported_for_width(&self, bits64: bool) -> Vec<&'static str> {
        let mut dropped = Vec::new();
        for d in &self.descriptors {
            if !d.is_active() {
                continue;
            }
            let has_number = if bits64 { d.number_64.is_some() } else { d.number_32.is_some() };
            if !has_number {
                d.active.store(false, Ordering::Relaxed);
                dropped.push(d.name);
            }
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> SyscallTable {
        SyscallTable::new(vec![
            SyscallDescriptor::new(
                "getpid",
                Some(20),
                Some(39),
                [None; 6],
                0,
                ReturnSemantics::Standard,
                SyscallFlags::GROUP_PROCESS,
            ),
            SyscallDescriptor::new(
                "close",
                Some(6),
                Some(3),
                [Some(ArgTag::Fd), None, None, None, None, None],
                1,
                ReturnSemantics::Standard,
                SyscallFlags::GROUP_FS,
            ),
        ])
    }

    #[test]
    fn nothing_active_until_asked() {
        let table = sample_table();
        assert!(!table.validate());
        assert_eq!(table.active_count(), 0);
    }

    #[test]
    fn activate_by_name_is_exact() {
        let table = sample_table();
        assert!(table.activate_by_name("close"));
        assert!(table.validate());
        assert_eq!(table.active_count(), 1);
        assert!(!table.activate_by_name("does-not-exist"));
    }

    #[test]
    fn activate_by_group_matches_flags() {
        let table = sample_table();
        assert!(table.activate_by_group(SyscallFlags::GROUP_FS));
        assert_eq!(table.active_count(), 1);
    }

    #[test]
    fn biarch_validation_requires_both_numbers() {
        let table = sample_table();
        table.activate_all();
        assert!(table.validate_biarch());
    }
}
