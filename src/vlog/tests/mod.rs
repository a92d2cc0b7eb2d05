use std::time::Duration;

use tempfile::tempdir;

use crate::config::IoMode;
use crate::vlog::{VLogEntry, VLogOptions, ValueLog};

fn opts(path: std::path::PathBuf, segment_size: u64) -> VLogOptions {
    VLogOptions {
        path,
        segment_size,
        io_mode: IoMode::Buffered,
        gc_ratio: 0.5,
        gc_interval: Duration::from_secs(300),
    }
}

fn opts_mmap(path: std::path::PathBuf, segment_size: u64) -> VLogOptions {
    VLogOptions {
        io_mode: IoMode::Mmap,
        ..opts(path, segment_size)
    }
}

fn entry(key: &[u8], value: &[u8]) -> VLogEntry {
    VLogEntry {
        key: key.to_vec(),
        value: value.to_vec(),
        expiry: 0,
        tombstone: false,
    }
}

#[test]
fn write_then_read_roundtrip() {
    let dir = tempdir().unwrap();
    let vlog = ValueLog::open(opts(dir.path().to_path_buf(), 1 << 20)).unwrap();

    let (fid, offset, _size) = vlog.write(&entry(b"k", b"big-value")).unwrap();
    let read = vlog.read(fid, offset).unwrap();
    assert_eq!(read.key, b"k");
    assert_eq!(read.value, b"big-value");
}

#[test]
fn rejects_invalid_gc_ratio() {
    let dir = tempdir().unwrap();
    let mut bad = opts(dir.path().to_path_buf(), 1 << 20);
    bad.gc_ratio = 1.5;
    assert!(ValueLog::open(bad).is_err());
}

#[test]
fn rotates_segment_when_full() {
    let dir = tempdir().unwrap();
    // Small enough that a second write can't fit in the first segment.
    let vlog = ValueLog::open(opts(dir.path().to_path_buf(), 64)).unwrap();

    let (fid1, _, _) = vlog.write(&entry(b"a", &vec![0u8; 40])).unwrap();
    let (fid2, _, _) = vlog.write(&entry(b"b", &vec![0u8; 40])).unwrap();
    assert_eq!(fid1, 1);
    assert_eq!(fid2, 2);
}

#[test]
fn read_missing_segment_errors() {
    let dir = tempdir().unwrap();
    let vlog = ValueLog::open(opts(dir.path().to_path_buf(), 1 << 20)).unwrap();
    assert!(vlog.read(99, 0).is_err());
}

#[test]
fn discard_ratio_tracks_drained_notices() {
    let dir = tempdir().unwrap();
    let vlog = ValueLog::open(opts(dir.path().to_path_buf(), 1 << 20)).unwrap();

    let (fid, _, size) = vlog.write(&entry(b"a", b"value")).unwrap();
    vlog.discard_sender().send((fid, size as u64)).unwrap();
    vlog.drain_discards().unwrap();

    assert!(vlog.discard_ratio(fid) >= 1.0);
}

#[test]
fn gc_candidate_excludes_active_segment() {
    let dir = tempdir().unwrap();
    let vlog = ValueLog::open(opts(dir.path().to_path_buf(), 1 << 20)).unwrap();

    let (fid, _, size) = vlog.write(&entry(b"a", b"value")).unwrap();
    vlog.discard_sender().send((fid, size as u64)).unwrap();
    vlog.drain_discards().unwrap();

    // Only segment written so far is also the active one; it must never
    // be offered up for GC no matter its discard ratio.
    assert_eq!(vlog.gc_candidate(0.1).unwrap(), None);
}

#[test]
fn gc_candidate_picks_fully_discarded_sealed_segment() {
    let dir = tempdir().unwrap();
    let vlog = ValueLog::open(opts(dir.path().to_path_buf(), 64)).unwrap();

    let (fid1, _, size1) = vlog.write(&entry(b"a", &vec![0u8; 40])).unwrap();
    // Force rotation so fid1 is sealed.
    let (fid2, _, _) = vlog.write(&entry(b"b", &vec![0u8; 40])).unwrap();
    assert_ne!(fid1, fid2);

    vlog.discard_sender().send((fid1, size1 as u64)).unwrap();
    vlog.drain_discards().unwrap();

    assert_eq!(vlog.gc_candidate(0.5).unwrap(), Some(fid1));
}

#[test]
fn rewrite_segment_relocates_live_entries_and_skips_dead() {
    let dir = tempdir().unwrap();
    let vlog = ValueLog::open(opts(dir.path().to_path_buf(), 64)).unwrap();

    let (fid1, off_live, _) = vlog.write(&entry(b"live", &vec![1u8; 40])).unwrap();
    let (_, off_dead, _) = vlog.write(&entry(b"dead", &vec![2u8; 40])).unwrap();
    assert_eq!(vlog.write(&entry(b"dead", &vec![2u8; 40])).unwrap().0, fid1 + 1);

    // `off_dead`'s key is considered superseded; only `live` at `off_live`
    // should relocate.
    let relocations = vlog
        .rewrite_segment(fid1, |_key, f, o| f == fid1 && o == off_live)
        .unwrap();

    assert_eq!(relocations.len(), 1);
    assert_eq!(relocations[0].0, b"live");
    let _ = off_dead;
}

#[test]
fn remove_segment_deletes_file_and_forgets_tracking() {
    let dir = tempdir().unwrap();
    let vlog = ValueLog::open(opts(dir.path().to_path_buf(), 64)).unwrap();

    let (fid1, _, _) = vlog.write(&entry(b"a", &vec![0u8; 40])).unwrap();
    vlog.write(&entry(b"b", &vec![0u8; 40])).unwrap();

    vlog.remove_segment(fid1).unwrap();
    assert!(!dir.path().join(format!("{fid1:08}.vlog")).exists());
    assert_eq!(vlog.discard_ratio(fid1), 0.0);
}

#[test]
fn mmap_mode_reads_sealed_segment() {
    let dir = tempdir().unwrap();
    // Small segment size so the first write's segment is sealed by the
    // second, forcing `read` to go through the mmap'd sealed-segment path.
    let vlog = ValueLog::open(opts_mmap(dir.path().to_path_buf(), 64)).unwrap();

    let (fid1, off1, _) = vlog.write(&entry(b"a", &vec![7u8; 40])).unwrap();
    let (fid2, _, _) = vlog.write(&entry(b"b", &vec![8u8; 40])).unwrap();
    assert_ne!(fid1, fid2);

    let read = vlog.read(fid1, off1).unwrap();
    assert_eq!(read.key, b"a");
    assert_eq!(read.value, vec![7u8; 40]);

    // A second read reuses the cached mmap handle.
    let read_again = vlog.read(fid1, off1).unwrap();
    assert_eq!(read_again.value, vec![7u8; 40]);
}

#[test]
fn mmap_mode_gc_rewrite_reads_sealed_segment_via_iter() {
    let dir = tempdir().unwrap();
    let vlog = ValueLog::open(opts_mmap(dir.path().to_path_buf(), 64)).unwrap();

    let (fid1, off_live, _) = vlog.write(&entry(b"live", &vec![1u8; 40])).unwrap();
    vlog.write(&entry(b"dead", &vec![2u8; 40])).unwrap();

    let relocations = vlog
        .rewrite_segment(fid1, |_key, f, o| f == fid1 && o == off_live)
        .unwrap();

    assert_eq!(relocations.len(), 1);
    assert_eq!(relocations[0].0, b"live");
}

#[test]
fn reopen_recovers_active_segment_and_offset() {
    let dir = tempdir().unwrap();
    let fid_and_offset = {
        let vlog = ValueLog::open(opts(dir.path().to_path_buf(), 1 << 20)).unwrap();
        let (fid, offset, size) = vlog.write(&entry(b"a", b"value")).unwrap();
        vlog.close().unwrap();
        (fid, offset + size as u64)
    };

    let reopened = ValueLog::open(opts(dir.path().to_path_buf(), 1 << 20)).unwrap();
    let (fid, offset, _) = reopened.write(&entry(b"b", b"value2")).unwrap();
    assert_eq!(fid, fid_and_offset.0);
    assert_eq!(offset, fid_and_offset.1);
}
