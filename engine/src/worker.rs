//! The child worker (C6): the state machine a single forked process runs
//! to repeatedly choose, synthesise, invoke, and record one syscall at a
//! time.

use std::sync::atomic::Ordering;

use crate::control::{SharedControl, SyscallState};
use crate::fdreg::FdRegistry;
use crate::pages::Pages;
use crate::random::Rng;
use crate::signals::CANCEL_REQUESTED;
use crate::synth::SynthesisContext;
use crate::table::{SyscallRecord, SyscallTable};

/// How many syscalls a single worker process runs before the supervisor
/// recycles it for a fresh one. Bounds how much process-local state (heap
/// fragmentation, leaked kernel objects the syscalls under test created) a
/// single worker can accumulate.
pub const PER_CHILD_CAP: u64 = 50_000;

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub struct ChildWorker<'a> {
    pub slot_index: usize,
    pub ctrl: &'a SharedControl,
    pub table: &'a SyscallTable,
    pub registry: &'a FdRegistry,
    pub pages: &'a Pages,
    pub rng: Rng,
    pub local_epoch: u64,
    pub bits64: bool,
    /// `SIGALRM` deadline in seconds for a `NEED_ALARM` syscall.
    pub alarm_secs: u32,
}

impl<'a> ChildWorker<'a> {
    fn slot(&self) -> &crate::control::ChildSlot {
        &self.ctrl.children[self.slot_index]
    }

    fn check_regenerate(&mut self) {
        let epoch = self.ctrl.regenerate_epoch.load(Ordering::Relaxed);
        if epoch != self.local_epoch {
            self.local_epoch = epoch;
            self.pages.regenerate_random_page(&mut self.rng);
        }
    }

    /// Runs syscalls until the global exit reason stops being `Running` or
    /// this worker reaches its own call cap. Never returns early for any
    /// other reason; the caller is expected to `_exit` right after this.
    pub fn run(&mut self) {
        use crate::control::ExitReason;

        loop {
            if self.ctrl.exit_reason.get() != ExitReason::Running {
                break;
            }
            if self.slot().num_syscalls_done.load(Ordering::Relaxed) >= PER_CHILD_CAP {
                break;
            }

            self.check_regenerate();
            self.run_one();
        }
    }

    fn run_one(&mut self) {
        let slot = self.slot();
        slot.set_state(SyscallState::Chosen);

        let (descriptor_index, descriptor) = match self.table.pick_active(&mut self.rng) {
            Some(pair) => pair,
            None => return,
        };
        slot.last_syscall.store(descriptor_index as u32, Ordering::Relaxed);

        slot.set_state(SyscallState::Pre);
        CANCEL_REQUESTED.store(false, Ordering::Relaxed);

        let mut record = SyscallRecord {
            args: [0; 6],
            num_args: descriptor.num_args,
            retval: 0,
            errno_val: 0,
        };
        // `synth` must outlive the invoke/post below: SockAddr/IoVec/PathName
        // args are raw pointers into its scratch buffers, not copies.
        let mut synth = SynthesisContext::new(&mut self.rng, &self.pages, self.registry, self.ctrl);
        for i in 0..descriptor.num_args {
            let tag = descriptor.arg_types[i].expect("num_args entries must all carry a tag");
            record.args[i] = synth.synthesize(tag);
        }
        if let Some(sanitise) = descriptor.sanitise {
            sanitise(&mut record);
        }
        for (i, v) in record.args.iter().enumerate() {
            slot.args[i].store(*v, Ordering::Relaxed);
        }

        slot.set_state(SyscallState::During);
        if descriptor.flags.contains(crate::table::SyscallFlags::NEED_ALARM) {
            unsafe { libc::alarm(self.alarm_secs) };
        }
        slot.last_progress_secs.store(now_secs(), Ordering::Relaxed);

        let nr = self.table.number_for(descriptor, self.bits64).unwrap_or(0);
        let raw_ret = self.invoke(nr, &record);

        if descriptor.flags.contains(crate::table::SyscallFlags::NEED_ALARM) {
            unsafe { libc::alarm(0) };
        }

        if CANCEL_REQUESTED.swap(false, Ordering::AcqRel) {
            // The alarm fired mid-call; the kernel handed us -EINTR instead
            // of restarting. Treat the attempt as a failure and skip the
            // descriptor's POST hook, which may assume a real result.
            self.ctrl.failures.fetch_add(1, Ordering::Relaxed);
            self.ctrl.exec_count.fetch_add(1, Ordering::Relaxed);
            slot.num_syscalls_done.fetch_add(1, Ordering::Relaxed);
            slot.set_state(SyscallState::Idle);
            return;
        }

        record.retval = raw_ret;
        if (-4095..0).contains(&raw_ret) {
            record.errno_val = -raw_ret as i32;
        }

        slot.set_state(SyscallState::Post);
        slot.retval.store(record.retval, Ordering::Relaxed);
        slot.errno_val.store(record.errno_val, Ordering::Relaxed);
        if let Some(post) = descriptor.post {
            post(&mut record);
        }

        self.ctrl.exec_count.fetch_add(1, Ordering::Relaxed);
        if record.errno_val == 0 {
            self.ctrl.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.ctrl.failures.fetch_add(1, Ordering::Relaxed);
        }
        slot.num_syscalls_done.fetch_add(1, Ordering::Relaxed);
        slot.log_dirty.store(true, Ordering::Relaxed);
        slot.last_progress_secs.store(now_secs(), Ordering::Relaxed);
        slot.set_state(SyscallState::Idle);
    }

    #[cfg(target_arch = "x86_64")]
    fn invoke(&self, nr: u32, record: &SyscallRecord) -> i64 {
        let args: [u64; 6] = record.args;
        unsafe { trinity_raw::raw::invoke(nr as u64, args, record.num_args) as i64 }
    }

    #[cfg(not(target_arch = "x86_64"))]
    fn invoke(&self, nr: u32, record: &SyscallRecord) -> i64 {
        type V = trinity_raw::raw::V;
        let args: [V; 6] = std::array::from_fn(|i| record.args[i] as V);
        unsafe { trinity_raw::raw::invoke(nr as V, args, record.num_args) as i64 }
    }
}
