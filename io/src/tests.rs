use super::*;

#[test]
fn pipe_roundtrip() {
    let (r, w) = open_pipe().expect("pipe2");
    w.write(b"hi").expect("write");
    let mut buf = [0u8; 2];
    // O_NONBLOCK pipes may need a moment, but a same-process write before
    // read is always immediately visible.
    let n = r.read(&mut buf).expect("read");
    assert_eq!(n, 2);
    assert_eq!(&buf, b"hi");
}

#[test]
fn epoll_open_succeeds() {
    let fd = open_epoll().expect("epoll_create1");
    assert!(fd.as_raw_fd() >= 0);
}

#[test]
fn eventfd_open_succeeds() {
    let fd = open_eventfd(0).expect("eventfd");
    assert!(fd.as_raw_fd() >= 0);
}

#[test]
fn socket_open_succeeds() {
    let fd = open_socket(libc::AF_UNIX, libc::SOCK_STREAM, 0).expect("socket");
    assert!(fd.as_raw_fd() >= 0);
}

#[test]
fn file_open_creates_and_closes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("probe");
    let cpath = std::ffi::CString::new(path.to_str().unwrap()).unwrap();
    let fd = open_file(&cpath, libc::O_CREAT | libc::O_RDWR, 0o600).expect("open");
    assert!(fd.as_raw_fd() >= 0);
}
