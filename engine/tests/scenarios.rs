//! End-to-end scenarios spanning more than one module: a single worker
//! driven to quiescence against a harmless, always-succeeding syscall, with
//! nothing mocked out.

use trinity_engine::control::{ExitReason, SharedMap, SyscallState};
use trinity_engine::table::{ReturnSemantics, SyscallDescriptor, SyscallFlags, SyscallTable};
use trinity_engine::worker::ChildWorker;
use trinity_engine::{FdRegistry, Pages, Rng};

const NONE6: [Option<trinity_engine::ArgTag>; 6] = [None, None, None, None, None, None];

fn getpid_only_table() -> SyscallTable {
    let table = SyscallTable::new(vec![SyscallDescriptor::new(
        "getpid",
        Some(libc::SYS_getpid as u32),
        Some(libc::SYS_getpid as u32),
        NONE6,
        0,
        ReturnSemantics::Standard,
        SyscallFlags::GROUP_PROCESS,
    )]);
    table.activate_all();
    table
}

#[test]
fn single_child_reaches_quiescence_cleanly() {
    let map = SharedMap::create(1, 1).unwrap();
    let ctrl = map.get();
    let table = getpid_only_table();
    let registry = FdRegistry::open_all().unwrap();
    let mut rng = Rng::new(1);
    let pages = Pages::new(&mut rng).unwrap();

    // A real, unmocked getpid() never fails, so this exercises the worker
    // loop's own bookkeeping rather than any particular kernel error path.
    let mut worker = ChildWorker {
        slot_index: 0,
        ctrl,
        table: &table,
        registry: &registry,
        pages: &pages,
        rng,
        local_epoch: 0,
        bits64: cfg!(target_pointer_width = "64"),
        alarm_secs: 3,
    };

    worker.run();

    let slot = &ctrl.children[0];
    assert_eq!(slot.state(), SyscallState::Idle);
    assert_eq!(ctrl.exec_count.load(std::sync::atomic::Ordering::Relaxed), trinity_engine::worker::PER_CHILD_CAP);
    assert_eq!(
        ctrl.successes.load(std::sync::atomic::Ordering::Relaxed),
        ctrl.exec_count.load(std::sync::atomic::Ordering::Relaxed)
    );
    assert_eq!(ctrl.failures.load(std::sync::atomic::Ordering::Relaxed), 0);
}

#[test]
fn a_shutdown_request_stops_a_worker_before_its_call_cap() {
    let map = SharedMap::create(2, 1).unwrap();
    let ctrl = map.get();
    ctrl.exit_reason.escalate(ExitReason::ShutdownRequested);

    let table = getpid_only_table();
    let registry = FdRegistry::open_all().unwrap();
    let mut rng = Rng::new(2);
    let pages = Pages::new(&mut rng).unwrap();

    let mut worker = ChildWorker {
        slot_index: 0,
        ctrl,
        table: &table,
        registry: &registry,
        pages: &pages,
        rng,
        local_epoch: 0,
        bits64: cfg!(target_pointer_width = "64"),
        alarm_secs: 3,
    };
    worker.run();

    // The exit reason was already set before the worker ever started, so
    // it must not have executed anything.
    assert_eq!(ctrl.exec_count.load(std::sync::atomic::Ordering::Relaxed), 0);
}
