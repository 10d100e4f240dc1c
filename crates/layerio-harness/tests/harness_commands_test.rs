//! Integration test: harness commands over temporary files.
//!
//! Validates that:
//! 1. `lines` honors separator, paragraph, limit, chomp and encoding options.
//! 2. `bom` names the encoding of a byte-order mark, or none.
//! 3. `copy` reproduces the source and reports counter growth.
//! 4. Reports serialize to the documented JSON shape.
//!
//! Run: cargo test -p layerio-harness --test harness_commands_test

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use layerio_harness::report::to_json;
use layerio_harness::{HarnessError, LinesRequest, bom, copy, lines};

struct TempFile(PathBuf);

impl TempFile {
    fn new(tag: &str, contents: &[u8]) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "layerio-harness-{tag}-{}-{nanos}",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        Self(path)
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

fn texts(report: &layerio_harness::LinesReport) -> Vec<&str> {
    report.lines.iter().map(|l| l.text.as_str()).collect()
}

#[test]
fn lines_default_and_chomp() {
    let f = TempFile::new("lines", b"alpha\nbeta\r\ngamma");
    let report = lines(&f.0, &LinesRequest::default()).unwrap();
    assert_eq!(texts(&report), ["alpha\n", "beta\r\n", "gamma"]);
    assert_eq!(report.lines[2].lineno, 3);
    assert_eq!(report.external_encoding, "UTF-8");

    let req = LinesRequest {
        chomp: true,
        ..LinesRequest::default()
    };
    let report = lines(&f.0, &req).unwrap();
    assert_eq!(texts(&report), ["alpha", "beta", "gamma"]);
}

#[test]
fn lines_paragraph_and_limit() {
    let f = TempFile::new("para", b"a\n\n\nb");
    let req = LinesRequest {
        paragraph: true,
        ..LinesRequest::default()
    };
    assert_eq!(texts(&lines(&f.0, &req).unwrap()), ["a\n\n", "b"]);

    let f = TempFile::new("limit", b"abcdef\n");
    let req = LinesRequest {
        limit: Some(3),
        ..LinesRequest::default()
    };
    assert_eq!(texts(&lines(&f.0, &req).unwrap()), ["abc", "def", "\n"]);
}

#[test]
fn lines_custom_separator_and_conflicts() {
    let f = TempFile::new("sep", b"k1=v1&k2=v2");
    let req = LinesRequest {
        separator: Some("&".into()),
        chomp: true,
        ..LinesRequest::default()
    };
    assert_eq!(texts(&lines(&f.0, &req).unwrap()), ["k1=v1", "k2=v2"]);

    let req = LinesRequest {
        paragraph: true,
        whole: true,
        ..LinesRequest::default()
    };
    assert!(matches!(lines(&f.0, &req), Err(HarnessError::ConflictingOptions(_))));
}

#[test]
fn lines_with_bom_encoding() {
    let f = TempFile::new("utf16", &[0xFF, 0xFE, b'o', 0, b'k', 0, b'\n', 0]);
    let req = LinesRequest {
        encoding: Some("BOM|utf-8:utf-8".into()),
        ..LinesRequest::default()
    };
    let report = lines(&f.0, &req).unwrap();
    assert_eq!(report.external_encoding, "UTF-16LE");
    assert_eq!(report.internal_encoding.as_deref(), Some("UTF-8"));
    assert_eq!(texts(&report), ["ok\n"]);
}

#[test]
fn bom_detection() {
    let f = TempFile::new("bom8", &[0xEF, 0xBB, 0xBF, b'x']);
    assert_eq!(bom(&f.0).unwrap().encoding.as_deref(), Some("UTF-8"));

    let f = TempFile::new("nobom", b"plain");
    assert_eq!(bom(&f.0).unwrap().encoding, None);
}

#[test]
fn copy_reproduces_source() {
    let data: Vec<u8> = (0..50_000u32).map(|i| (i * 7 % 256) as u8).collect();
    let src = TempFile::new("src", &data);
    let dst = TempFile::new("dst", b"stale contents to truncate");
    let report = copy(&src.0, &dst.0, 1024, false).unwrap();
    assert_eq!(report.bytes, data.len() as u64);
    assert_eq!(std::fs::read(&dst.0).unwrap(), data);
    assert!(report.metrics.fills >= 49);
    assert!(report.metrics.bytes_written >= data.len() as u64);

    let json: serde_json::Value = serde_json::from_str(&to_json(&report).unwrap()).unwrap();
    assert_eq!(json["bytes"], 50_000);
    assert!(json["metrics"]["flushes"].is_number());
}

#[test]
fn missing_file_is_a_stream_error() {
    let err = bom(std::path::Path::new("/nonexistent/layerio/file")).unwrap_err();
    assert!(matches!(err, HarnessError::Stream(_)));
}
