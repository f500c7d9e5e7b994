extern crate std;

use crate::raw;

#[test]
fn test_syscall_getpid() {
    let want = std::process::id();
    // 39 is __NR_getpid on x86_64; other architectures are not exercised by
    // this crate's own test suite (syscall numbers are a data input owned
    // by the fuzzer, not by this crate).
    #[cfg(target_arch = "x86_64")]
    let nr: raw::V = 39;
    #[cfg(target_arch = "x86")]
    let nr: raw::V = 20;
    #[cfg(target_arch = "arm")]
    let nr: raw::V = 20;
    #[cfg(target_arch = "riscv64")]
    let nr: raw::V = 172;

    let got = unsafe { raw::syscall0(nr) } as u32;
    assert_eq!(
        got, want,
        "result {} does not match actual pid {}",
        got, want,
    );
}

#[test]
fn test_invoke_dispatches_by_argc() {
    #[cfg(target_arch = "x86_64")]
    let nr: raw::V = 39;
    #[cfg(target_arch = "x86")]
    let nr: raw::V = 20;
    #[cfg(target_arch = "arm")]
    let nr: raw::V = 20;
    #[cfg(target_arch = "riscv64")]
    let nr: raw::V = 172;

    let want = std::process::id();
    let got = unsafe { raw::invoke(nr, [0; 6], 0) } as u32;
    assert_eq!(got, want);
}
