//! `trinity`: the fuzzer binary. Everything §6 calls a collaborator (CLI
//! parsing, logging, the syscall number tables, the representative
//! descriptor table) lives in this crate; `main` wires those into
//! `trinity_engine`'s supervisor/watchdog/FD-registry/page/control-block
//! core.
//!
//! Grounded on `examples/original_source/trinity.c`'s `main()`: the
//! root-user guard with its countdown, the `chdir("tmp/")`, the
//! dump-table-and-exit `--list` path, and the final summary line all come
//! from there, translated into this crate's idiom rather than carried over
//! verbatim.

mod arch;
mod args;
mod descriptors;
mod logging;

use std::io::Write as _;
use std::sync::atomic::Ordering;
use std::time::Duration;

use clap::Parser;

use args::{Arch, Args};
use trinity_engine::control::ExitReason;
use trinity_engine::{FdRegistry, Pages, Rng, SharedMap, SupervisorConfig};

fn root_guard(dangerous: bool) {
    if unsafe { libc::getuid() } != 0 {
        return;
    }
    if !dangerous {
        println!("Don't run as root (or pass --dangerous if you know what you are doing).");
        std::process::exit(1);
    }
    println!("DANGER: RUNNING AS ROOT.");
    println!("Unless you are running in a virtual machine, this could cause serious problems such as overwriting CMOS");
    println!("or similar which could potentially make this machine unbootable without a firmware reset.\n");
    println!("ctrl-c now unless you really know what you are doing.");
    for i in (1..=10).rev() {
        print!("Continuing in {} seconds.\r", i);
        let _ = std::io::stdout().flush();
        std::thread::sleep(Duration::from_secs(1));
    }
    println!();
}

fn chdir_scratch() {
    let _ = std::fs::create_dir_all("tmp");
    unsafe {
        let path = std::ffi::CString::new("tmp").unwrap();
        libc::chmod(path.as_ptr(), 0o755);
    }
    if let Err(e) = std::env::set_current_dir("tmp") {
        tracing::warn!(error = %e, "couldn't chdir into ./tmp/, continuing in the current directory");
    }
}

fn draw_default_seed() -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    nanos ^ (std::process::id() as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn exit_code(ctrl: &trinity_engine::SharedControl) -> i32 {
    match ctrl.exit_reason.get() {
        ExitReason::Running | ExitReason::ChildReachedCount | ExitReason::ShutdownRequested => 0,
        ExitReason::SigInt => {
            if ctrl.exec_count.load(Ordering::Relaxed) > 0 {
                130
            } else {
                0
            }
        }
        ExitReason::KernelTainted | ExitReason::Fatal => 1,
    }
}

fn main() {
    let args = Args::parse();
    logging::init_tracing(args.debug, args.quiet);

    println!("trinity {}  (Rust fuzzing-engine rendition)", env!("CARGO_PKG_VERSION"));

    let table = descriptors::build();

    if !args.syscalls.is_empty() || args.group.is_some() {
        for name in &args.syscalls {
            if !table.activate_by_name(name) {
                eprintln!("## unknown syscall: {}", name);
            }
        }
        if let Some(group) = &args.group {
            if !activate_named_group(&table, group) {
                eprintln!("## unknown group: {}", group);
            }
        }
    } else {
        table.activate_all();
    }
    for name in &args.exclude {
        table.deactivate_by_name(name);
    }

    let dropped = match args.arch() {
        Arch::Only64 => table.drop_unsupported_for_width(true),
        Arch::Only32 => table.drop_unsupported_for_width(false),
        Arch::Biarch => {
            let mut d = table.drop_unsupported_for_width(true);
            d.extend(table.drop_unsupported_for_width(false));
            d
        }
    };
    if !dropped.is_empty() {
        tracing::debug!(?dropped, "dropped descriptors missing a syscall number for the requested width");
    }

    if args.list {
        for name in table.names() {
            println!("{}", name);
        }
        return;
    }

    if !table.validate() {
        eprintln!("No syscalls were enabled!");
        std::process::exit(1);
    }

    root_guard(args.dangerous);

    let max_children = args.children.unwrap_or_else(|| {
        let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
        if n > 0 {
            n as u32
        } else {
            1
        }
    });

    let map = match SharedMap::create(args.seed.unwrap_or_else(draw_default_seed), max_children) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("## fatal: {}", e);
            std::process::exit(1);
        }
    };
    let ctrl = map.get();

    let registry = match FdRegistry::open_all() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("## fatal: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(pools = ?registry.pool_names().collect::<Vec<_>>(), "opened FD pools");

    let mut seed_rng = Rng::new(ctrl.seed.load(Ordering::Relaxed));
    let pages = match Pages::new(&mut seed_rng) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("## fatal: couldn't allocate sentinel pages: {}", e);
            std::process::exit(1);
        }
    };

    chdir_scratch();

    if let Err(e) = trinity_engine::watchdog::spawn(
        ctrl,
        trinity_engine::WatchdogConfig {
            max_runtime: args.max_runtime.map(Duration::from_secs),
            max_exec_count: args.max_execs,
            ..Default::default()
        },
    ) {
        eprintln!("## fatal: couldn't start watchdog: {}", e);
        std::process::exit(1);
    }

    trinity_engine::signals::install_for_process(ctrl, args.debug);

    tracing::info!(children = max_children, seed = ctrl.seed.load(Ordering::Relaxed), "fuzzing starting");

    let mut log_files = match logging::LogFiles::open(max_children, args.monochrome) {
        Ok(lf) => lf,
        Err(e) => {
            eprintln!("## fatal: couldn't open log files: {}", e);
            std::process::exit(1);
        }
    };

    let sup_cfg = SupervisorConfig {
        max_children,
        bits64: cfg!(target_pointer_width = "64"),
        debug: args.debug,
        ..Default::default()
    };

    std::thread::scope(|scope| {
        scope.spawn(|| {
            while ctrl.exit_reason.get() == ExitReason::Running {
                log_files.sync_dirty(ctrl);
                std::thread::sleep(Duration::from_millis(500));
            }
            log_files.sync_dirty(ctrl);
        });
        trinity_engine::supervisor::run_main_loop(ctrl, &table, &registry, &pages, &sup_cfg);
    });

    println!(
        "\nRan {} syscalls. Successes: {}  Failures: {}",
        ctrl.exec_count.load(Ordering::Relaxed),
        ctrl.successes.load(Ordering::Relaxed),
        ctrl.failures.load(Ordering::Relaxed),
    );

    std::process::exit(exit_code(ctrl));
}

fn activate_named_group(table: &trinity_engine::SyscallTable, name: &str) -> bool {
    use trinity_engine::SyscallFlags;
    let flags = match name {
        "vm" => SyscallFlags::GROUP_VM,
        "net" => SyscallFlags::GROUP_NET,
        "fs" => SyscallFlags::GROUP_FS,
        "ipc" => SyscallFlags::GROUP_IPC,
        "process" => SyscallFlags::GROUP_PROCESS,
        _ => return false,
    };
    table.activate_by_group(flags)
}
