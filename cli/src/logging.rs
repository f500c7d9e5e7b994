//! The logging collaborator (§6: "belongs to the logging collaborator";
//! §9's Open Questions call out two quirks from the original to preserve
//! rather than silently fix). Two independent pieces:
//!
//! - `tracing`/`tracing-subscriber` for the usual structured stdout output
//!   every binary in this corpus uses.
//! - [`LogFiles`], a small hand-rolled per-child log-file writer mirroring
//!   `examples/original_source/log.c`'s `trinity.log` / `trinity-childN.log`
//!   pair and its `log_dirty`-gated flush-on-demand (`synclogs`).

use std::io::Write;
use std::sync::atomic::Ordering;

use trinity_engine::SharedControl;

/// Strips ANSI escape sequences out of a fixed-size, NUL-terminated byte
/// buffer in place, returning the new logical length.
///
/// This is a deliberately verbatim port of `log.c`'s `strip_ansi`,
/// byte-budget quirk included: a colour-introducing escape is always
/// assumed to be 6 bytes and a plain reset always 3, rather than the
/// function measuring the escape sequence it just matched. The core's
/// Open Questions call this out explicitly as behaviour to preserve, not
/// audit — the engine never depends on this function's correctness, only
/// whatever calls it for display purposes does.
pub fn strip_ansi(buf: &mut [u8], monochrome: bool) -> usize {
    let buflen = buf.len();
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buflen);
    if monochrome {
        return len;
    }
    let mut to = 0usize;
    let mut i = 0usize;
    while i < len && i + 2 < buflen {
        buf[to] = buf[i];
        if buf[i] == 0x1b {
            if buf[i + 2] == b'1' {
                i += 6;
            } else {
                i += 3;
            }
        } else {
            to += 1;
        }
        i += 1;
    }
    if to < buf.len() {
        buf[to] = 0;
    }
    to
}

fn open_fresh(path: &std::path::Path) -> std::io::Result<std::fs::File> {
    let _ = std::fs::remove_file(path);
    std::fs::OpenOptions::new().create(true).append(true).open(path)
}

/// Owns `trinity.log` and one `trinity-childN.log` per child slot.
pub struct LogFiles {
    main: std::fs::File,
    children: Vec<std::fs::File>,
    monochrome: bool,
}

impl LogFiles {
    pub fn open(max_children: u32, monochrome: bool) -> std::io::Result<Self> {
        let main = open_fresh(std::path::Path::new("trinity.log"))?;
        let mut children = Vec::with_capacity(max_children as usize);
        for i in 0..max_children {
            children.push(open_fresh(&std::path::PathBuf::from(format!("trinity-child{}.log", i)))?);
        }
        Ok(Self { main, children, monochrome })
    }

    /// Writes one line, stripping ANSI first, to either a child's own log
    /// or the main log if `child_index` is `None` or out of range.
    pub fn write_line(&mut self, child_index: Option<usize>, line: &str) {
        const BUFSIZE: usize = 1024;
        let mut buf = [0u8; BUFSIZE];
        let src = line.as_bytes();
        let n = src.len().min(BUFSIZE - 1);
        buf[..n].copy_from_slice(&src[..n]);
        let len = strip_ansi(&mut buf, self.monochrome);

        let handle = match child_index.and_then(|i| self.children.get_mut(i)) {
            Some(f) => f,
            None => &mut self.main,
        };
        let _ = handle.write_all(&buf[..len]);
        let _ = handle.write_all(b"\n");
        let _ = handle.flush();
    }

    /// Mirrors `synclogs()`: flushes and `fsync`s only the child logs whose
    /// `log_dirty` bit the engine set since the last call, plus the main
    /// log unconditionally. This is the core's only obligation to the
    /// logging collaborator — it sets `log_dirty`, never touches a file.
    pub fn sync_dirty(&mut self, ctrl: &SharedControl) {
        for (i, slot) in ctrl.children.iter().enumerate() {
            if slot.log_dirty.swap(false, Ordering::Relaxed) {
                if let Some(f) = self.children.get_mut(i) {
                    let _ = f.flush();
                    let _ = f.sync_data();
                }
            }
        }
        let _ = self.main.flush();
        let _ = self.main.sync_data();
    }
}

/// Initialises the `tracing` stdout subscriber. `--debug` widens the
/// default filter; `--quiet` narrows it to warnings and above.
pub fn init_tracing(debug: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monochrome_passthrough_stops_at_nul() {
        let mut buf = [0u8; 16];
        buf[..5].copy_from_slice(b"hello");
        assert_eq!(strip_ansi(&mut buf, true), 5);
    }

    #[test]
    fn colour_escape_is_skipped_per_the_quirky_budget() {
        // ESC '[' '1' ';' '3' '1' 'm'  "hi"  -> 6-byte skip leaves "hi".
        let mut buf = [0u8; 16];
        let src: &[u8] = &[0x1b, b'[', b'1', b';', b'3', b'1', b'm', b'h', b'i'];
        buf[..src.len()].copy_from_slice(src);
        let n = strip_ansi(&mut buf, false);
        assert_eq!(&buf[..n], b"hi");
    }

    #[test]
    fn write_line_only_marks_the_target_child_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let prev = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let map = trinity_engine::SharedMap::create(1, 2).unwrap();
        let ctrl = map.get();
        let mut logs = LogFiles::open(2, true).unwrap();
        logs.write_line(Some(0), "hello from child 0");
        ctrl.children[0].log_dirty.store(true, Ordering::Relaxed);

        logs.sync_dirty(ctrl);
        assert!(!ctrl.children[0].log_dirty.load(Ordering::Relaxed));
        assert!(!ctrl.children[1].log_dirty.load(Ordering::Relaxed));

        let contents = std::fs::read_to_string(dir.path().join("trinity-child0.log")).unwrap();
        assert_eq!(contents, "hello from child 0\n");

        std::env::set_current_dir(prev).unwrap();
    }
}
