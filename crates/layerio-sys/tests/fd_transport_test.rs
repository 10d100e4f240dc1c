//! Integration test: streams over real file descriptors.
//!
//! Validates that:
//! 1. Files opened with fopen modes read, write, append and seek.
//! 2. OS pipes and socket pairs carry data and half-close correctly.
//! 3. Non-blocking reads surface WouldBlock and readiness waits time out.
//! 4. Child processes work as split duplex streams.
//!
//! Run: cargo test -p layerio-sys --test fd_transport_test

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use layerio_core::transport::FileKind;
use layerio_core::{DuplexState, Encoding, Io, LineOptions, Stream, StreamConfig, StreamError, Whence};
use layerio_sys::{open, pipe, popen, socketpair};

fn temp_path(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("layerio-{tag}-{}-{nanos}", std::process::id()))
}

#[test]
fn write_then_read_file() {
    let path = temp_path("rw");
    let mut out = open(&path, "w", StreamConfig::default()).unwrap();
    out.puts(&[b"first", b"second"]).unwrap();
    out.close().unwrap();

    let mut input = open(&path, "r", StreamConfig::default()).unwrap();
    let lines = input.readlines(&LineOptions::new().chomp(true)).unwrap();
    assert_eq!(lines, [b"first".to_vec(), b"second".to_vec()]);
    assert_eq!(input.stat().unwrap().kind, FileKind::Regular);
    assert_eq!(input.stat().unwrap().size, 13);
    input.close().unwrap();
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn append_and_update_modes() {
    let path = temp_path("append");
    std::fs::write(&path, b"abc").unwrap();

    let mut s = open(&path, "a", StreamConfig::default()).unwrap();
    s.write(b"def").unwrap();
    s.close().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"abcdef");

    let mut s = open(&path, "r+", StreamConfig::default()).unwrap();
    assert_eq!(s.read(Some(2)).unwrap().unwrap(), b"ab");
    s.write(b"XY").unwrap();
    s.seek(0, Whence::Set).unwrap();
    assert_eq!(s.read(None).unwrap().unwrap(), b"abXYef");
    assert_eq!(s.pread(2, 4).unwrap(), b"ef");
    s.close().unwrap();
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn binary_mode_flag_and_bad_modes() {
    let path = temp_path("bin");
    std::fs::write(&path, [0xEF, 0xBB, 0xBF, b'z']).unwrap();
    let mut s = open(&path, "rb", StreamConfig::default()).unwrap();
    assert!(s.is_binmode());
    assert!(s.set_encoding_by_bom().unwrap().is_some());
    assert_eq!(s.read(None).unwrap().unwrap(), b"z");
    drop(s);

    assert!(matches!(
        open(&path, "rw", StreamConfig::default()),
        Err(StreamError::InvalidArgument(_))
    ));
    assert!(matches!(
        open(&path, "wx", StreamConfig::default()),
        Err(StreamError::Os { op: "open", .. })
    ));
    std::fs::remove_file(&path).unwrap();
    assert!(open(&path, "r", StreamConfig::default()).is_err());
}

#[test]
fn pipe_streams_across_threads() {
    let (r, w) = pipe().unwrap();
    let writer = thread::spawn(move || {
        let mut out = Stream::open(w, StreamConfig::default()).unwrap();
        for i in 0..1000 {
            out.puts(&[format!("line {i}").as_bytes()]).unwrap();
        }
        out.close().unwrap();
    });
    let mut input = Stream::open(r, StreamConfig::default().with_buffer_size(100)).unwrap();
    let mut count = 0;
    for line in input.lines(LineOptions::new().chomp(true)) {
        assert_eq!(line.unwrap(), format!("line {count}").into_bytes());
        count += 1;
    }
    writer.join().unwrap();
    assert_eq!(count, 1000);
    assert_eq!(input.lineno(), 1000);
}

#[test]
fn pipe_is_not_seekable() {
    let (r, _w) = pipe().unwrap();
    let mut s = Stream::open(r, StreamConfig::default()).unwrap();
    assert!(matches!(s.seek(0, Whence::Set), Err(StreamError::NotSeekable)));
    assert_eq!(s.stat().unwrap().kind, FileKind::Fifo);
}

#[test]
fn nonblocking_reads_and_waits() {
    let (r, w) = pipe().unwrap();
    let mut input = Stream::open(r, StreamConfig::default()).unwrap();
    input.set_nonblocking(true).unwrap();
    assert!(input.is_nonblocking().unwrap());
    assert_eq!(input.read_nonblock(16).unwrap(), Io::WouldBlock);
    assert!(!input.wait_readable(Some(Duration::from_millis(10))).unwrap());

    let mut out = Stream::open(w, StreamConfig::default()).unwrap();
    out.write(b"now").unwrap();
    out.flush().unwrap();
    assert!(input.wait_readable(Some(Duration::from_secs(5))).unwrap());
    assert_eq!(input.read_nonblock(16).unwrap(), Io::Ready(b"now".to_vec()));
}

#[test]
fn blocking_read_times_out() {
    let (r, _w) = pipe().unwrap();
    let config = StreamConfig::default().with_timeout(Duration::from_millis(20));
    let mut input = Stream::open(r, config).unwrap();
    input.set_nonblocking(true).unwrap();
    assert!(matches!(input.read_partial(4), Err(StreamError::TimedOut)));
}

#[test]
fn mode_string_sets_encodings() {
    let path = temp_path("enc");
    std::fs::write(&path, [0xFF, 0xFE, b'h', 0, b'i', 0, b'\n', 0]).unwrap();

    let mut s = open(&path, "rb:BOM|utf-8:utf-8", StreamConfig::default()).unwrap();
    assert_eq!(s.external_encoding().unwrap(), Encoding::Utf16Le);
    assert_eq!(s.internal_encoding().unwrap(), Some(Encoding::Utf8));
    assert_eq!(s.gets_default().unwrap().unwrap(), b"hi\n");
    s.close().unwrap();

    let mut s = open(&path, "r:utf-16le:utf-8", StreamConfig::default()).unwrap();
    assert_eq!(s.gets_default().unwrap().unwrap(), "\u{feff}hi\n".as_bytes());
    s.close().unwrap();

    assert!(matches!(
        open(&path, "r:klingon", StreamConfig::default()),
        Err(StreamError::InvalidArgument(_))
    ));
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn update_file_refuses_half_close() {
    let path = temp_path("rplus");
    std::fs::write(&path, b"data\n").unwrap();
    let mut s = open(&path, "r+", StreamConfig::default()).unwrap();
    match s.close_read() {
        Err(StreamError::Closed(msg)) => assert_eq!(msg, "closing non-duplex IO for reading"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(s.state(), DuplexState::Open);
    assert_eq!(s.gets_default().unwrap().unwrap(), b"data\n");
    s.close().unwrap();
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn socketpair_half_close() {
    let (a, b) = socketpair().unwrap();
    let mut left = Stream::open(a, StreamConfig::default()).unwrap();
    let mut right = Stream::open(b, StreamConfig::default()).unwrap();
    assert!(left.duplex().is_duplex());

    left.write(b"hello\n").unwrap();
    left.close_write().unwrap();
    assert_eq!(left.state(), DuplexState::WriteClosed);
    assert_eq!(right.gets_default().unwrap().unwrap(), b"hello\n");
    assert_eq!(right.gets_default().unwrap(), None);

    right.puts(&[b"back"]).unwrap();
    right.flush().unwrap();
    assert_eq!(left.gets_default().unwrap().unwrap(), b"back\n");
}

#[test]
fn dropped_child_is_reaped() {
    let mut child = popen("cat", std::iter::empty::<&str>(), StreamConfig::default()).unwrap();
    let pid = child.pid();
    child.stream().puts(&[b"unread"]).unwrap();
    child.stream().close().unwrap();
    drop(child);
    assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());

    let child = popen("cat", std::iter::empty::<&str>(), StreamConfig::default()).unwrap();
    let pid = child.pid();
    drop(child);
    assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());
}

#[test]
fn popen_cat_round_trip() {
    let mut child = popen("cat", std::iter::empty::<&str>(), StreamConfig::default()).unwrap();
    let pid = child.pid();
    let stream = child.stream();
    assert_eq!(stream.pid(), Some(pid));
    stream.puts(&[b"echo me"]).unwrap();
    stream.close_write().unwrap();
    assert_eq!(stream.read(None).unwrap().unwrap(), b"echo me\n");
    assert!(child.wait().unwrap().success());
}
