use std::io::Write;
use std::sync::atomic::AtomicBool;

use core_text::{
    Encoding, IndexError, IndexEvent, IndexOptions, IndexWorker, LineIndex, MappedFile,
};

fn write_tmp(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(bytes).unwrap();
    tmp.flush().unwrap();
    tmp
}

#[test]
fn build_maps_file_and_reads_lines() {
    let tmp = write_tmp(b"alpha\r\nbeta\ngamma");
    let idx = LineIndex::build(tmp.path()).unwrap();
    assert_eq!(idx.total_lines(), 3);
    assert_eq!(idx.path(), Some(tmp.path()));
    assert_eq!(idx.get_line(0), "alpha");
    assert_eq!(idx.get_line(1), "beta");
    assert_eq!(idx.get_line(2), "gamma");
    assert_eq!(idx.offsets().last().copied(), Some(idx.byte_len()));
}

#[test]
fn empty_file_needs_no_mapping() {
    let tmp = write_tmp(b"");
    let idx = LineIndex::build(tmp.path()).unwrap();
    assert_eq!(idx.total_lines(), 0);
    assert_eq!(idx.byte_len(), 0);
}

#[test]
fn utf16be_file_with_bom() {
    let mut bytes = vec![0xFE, 0xFF];
    bytes.extend("one\ntwo\n".encode_utf16().flat_map(|u| u.to_be_bytes()));
    let tmp = write_tmp(&bytes);
    let idx = LineIndex::build(tmp.path()).unwrap();
    assert_eq!(idx.encoding(), Encoding::Utf16Be);
    assert_eq!(idx.total_lines(), 2);
    assert_eq!(idx.get_line(1), "two");
}

#[test]
fn mapped_file_reports_progress() {
    let tmp = write_tmp(&b"0123456789\n".repeat(50));
    let file = MappedFile::open(tmp.path()).unwrap();
    assert_eq!(file.byte_len(), 550);
    let cancel = AtomicBool::new(false);
    let mut reports = Vec::new();
    let idx = file
        .index(
            &IndexOptions {
                progress_interval: 128,
            },
            |p| reports.push(p),
            &cancel,
        )
        .unwrap();
    assert_eq!(idx.total_lines(), 50);
    // 550 bytes in 128-byte windows: four intermediate reports plus the final one.
    assert_eq!(reports.len(), 5);
    assert_eq!(reports.last().copied(), Some(1.0));
}

#[test]
fn worker_streams_progress_events() {
    let tmp = write_tmp(&b"row\n".repeat(1000));
    let worker = IndexWorker::spawn(
        tmp.path(),
        IndexOptions {
            progress_interval: 500,
        },
    )
    .unwrap();
    let mut progress = 0;
    let result = loop {
        match worker.events().recv().unwrap() {
            IndexEvent::Progress(_) => progress += 1,
            IndexEvent::Finished(result) => break result,
        }
    };
    assert_eq!(result.unwrap().total_lines(), 1000);
    assert_eq!(progress, 8);
}

#[test]
fn open_error_names_path() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.txt");
    let err = LineIndex::build(&missing).unwrap_err();
    assert!(matches!(err, IndexError::Open { .. }));
    assert!(err.to_string().contains("nope.txt"));
}
