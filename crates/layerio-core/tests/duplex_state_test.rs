//! Integration test: duplex lifecycle through the stream façade.
//!
//! Validates that:
//! 1. Split streams close each direction independently.
//! 2. State transitions serialize as snake_case labels.
//! 3. `reopen` swaps transports atomically and releases the old ones.
//!
//! Run: cargo test -p layerio-core --test duplex_state_test

use layerio_core::transport::{MemoryFile, memory_pipe};
use layerio_core::{Access, DuplexState, Stream, StreamConfig, StreamError, Transport};

#[test]
fn split_stream_half_closes() {
    let (from_child, mut child_out) = memory_pipe(64);
    let (mut child_in, to_child) = memory_pipe(64);
    let mut s = Stream::boxed_split(from_child, to_child, StreamConfig::default()).unwrap();
    assert_eq!(s.state(), DuplexState::Open);

    s.write(b"request\n").unwrap();
    s.close_write().unwrap();
    assert_eq!(s.state(), DuplexState::WriteClosed);
    assert!(matches!(s.write(b"x"), Err(StreamError::Closed("not opened for writing"))));
    s.close_write().unwrap();

    let mut buf = [0u8; 16];
    assert_eq!(child_in.read(&mut buf).unwrap().ready(), Some(8));
    assert!(child_in.read(&mut buf).unwrap().is_eof());

    child_out.write(b"reply\n").unwrap();
    child_out.close().unwrap();
    assert_eq!(s.gets_default().unwrap().unwrap(), b"reply\n");
    assert_eq!(s.gets_default().unwrap(), None);

    s.close_read().unwrap();
    assert_eq!(s.state(), DuplexState::Closed);
    assert!(matches!(s.close_read(), Err(StreamError::Closed("closed stream"))));
}

#[test]
fn states_serialize() {
    let labels: Vec<String> = [
        DuplexState::Open,
        DuplexState::ReadClosed,
        DuplexState::WriteClosed,
        DuplexState::Closed,
    ]
    .iter()
    .map(|s| serde_json::to_string(s).unwrap())
    .collect();
    assert_eq!(
        labels,
        ["\"open\"", "\"read_closed\"", "\"write_closed\"", "\"closed\""]
    );
}

#[test]
fn reopen_releases_old_transports() {
    let (mut peer_in, peer_out) = memory_pipe(8);
    let (from_peer, _keep) = memory_pipe(8);
    let mut s = Stream::boxed_split(from_peer, peer_out, StreamConfig::default()).unwrap();
    s.write(b"tail").unwrap();

    let file = MemoryFile::with_contents(b"fresh\n", Access::READ);
    s.reopen(Box::new(file)).unwrap();
    assert_eq!(s.state(), DuplexState::Open);
    assert_eq!(s.gets_default().unwrap().unwrap(), b"fresh\n");

    let mut buf = [0u8; 8];
    assert_eq!(peer_in.read(&mut buf).unwrap().ready(), Some(4));
    assert_eq!(&buf[..4], b"tail");
    assert!(peer_in.read(&mut buf).unwrap().is_eof());
}

#[test]
fn failed_reopen_keeps_the_stream() {
    let mut s = Stream::boxed(
        MemoryFile::with_contents(b"one\ntwo\n", Access::READ),
        StreamConfig::default(),
    )
    .unwrap();
    assert_eq!(s.gets_default().unwrap().unwrap(), b"one\n");

    let mut closed = MemoryFile::new(Access::READ);
    closed.close().unwrap();
    assert!(matches!(s.reopen(Box::new(closed)), Err(StreamError::Closed(_))));
    assert_eq!(s.lineno(), 1);
    assert_eq!(s.gets_default().unwrap().unwrap(), b"two\n");
}
