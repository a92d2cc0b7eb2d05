use crossbeam::channel;
use tempfile::tempdir;

use crate::indexer::{IndexEntry, Indexer};

fn inline_entry(value: &[u8]) -> IndexEntry {
    IndexEntry {
        value: value.to_vec(),
        fid: 0,
        offset: 0,
        entry_size: 0,
        expiry: 0,
    }
}

fn out_of_line_entry(fid: u32, offset: u64, entry_size: u32) -> IndexEntry {
    IndexEntry {
        value: Vec::new(),
        fid,
        offset,
        entry_size,
        expiry: 0,
    }
}

#[test]
fn put_batch_then_get_roundtrip() {
    let dir = tempdir().unwrap();
    let (tx, _rx) = channel::unbounded();
    let indexer = Indexer::open(dir.path(), tx).unwrap();

    indexer
        .put_batch(vec![
            (b"a".to_vec(), inline_entry(b"1")),
            (b"b".to_vec(), inline_entry(b"2")),
        ])
        .unwrap();

    assert_eq!(indexer.get(b"a").unwrap(), Some(inline_entry(b"1")));
    assert_eq!(indexer.get(b"b").unwrap(), Some(inline_entry(b"2")));
    assert_eq!(indexer.get(b"missing").unwrap(), None);
}

#[test]
fn delete_removes_entry_and_returns_prior() {
    let dir = tempdir().unwrap();
    let (tx, _rx) = channel::unbounded();
    let indexer = Indexer::open(dir.path(), tx).unwrap();

    indexer
        .put_batch(vec![(b"k".to_vec(), inline_entry(b"v"))])
        .unwrap();
    let prior = indexer.delete(b"k").unwrap();
    assert_eq!(prior, Some(inline_entry(b"v")));
    assert_eq!(indexer.get(b"k").unwrap(), None);
    assert_eq!(indexer.delete(b"k").unwrap(), None);
}

#[test]
fn overwriting_out_of_line_entry_emits_discard_notice() {
    let dir = tempdir().unwrap();
    let (tx, rx) = channel::unbounded();
    let indexer = Indexer::open(dir.path(), tx).unwrap();

    indexer
        .put_batch(vec![(b"k".to_vec(), out_of_line_entry(3, 100, 42))])
        .unwrap();
    // Overwrite with an inline value; the prior out-of-line pointer must be
    // reported as discardable.
    indexer
        .put_batch(vec![(b"k".to_vec(), inline_entry(b"small"))])
        .unwrap();

    let (fid, size) = rx.try_recv().unwrap();
    assert_eq!(fid, 3);
    assert_eq!(size, 42);
}

#[test]
fn deleting_out_of_line_entry_emits_discard_notice() {
    let dir = tempdir().unwrap();
    let (tx, rx) = channel::unbounded();
    let indexer = Indexer::open(dir.path(), tx).unwrap();

    indexer
        .put_batch(vec![(b"k".to_vec(), out_of_line_entry(7, 0, 99))])
        .unwrap();
    indexer.delete(b"k").unwrap();

    let (fid, size) = rx.try_recv().unwrap();
    assert_eq!(fid, 7);
    assert_eq!(size, 99);
}

#[test]
fn overwriting_inline_entry_emits_no_discard_notice() {
    let dir = tempdir().unwrap();
    let (tx, rx) = channel::unbounded();
    let indexer = Indexer::open(dir.path(), tx).unwrap();

    indexer
        .put_batch(vec![(b"k".to_vec(), inline_entry(b"v1"))])
        .unwrap();
    indexer
        .put_batch(vec![(b"k".to_vec(), inline_entry(b"v2"))])
        .unwrap();

    assert!(rx.try_recv().is_err());
}

#[test]
fn checkpoint_survives_reopen() {
    let dir = tempdir().unwrap();
    {
        let (tx, _rx) = channel::unbounded();
        let indexer = Indexer::open(dir.path(), tx).unwrap();
        indexer
            .put_batch(vec![
                (b"a".to_vec(), inline_entry(b"1")),
                (b"b".to_vec(), out_of_line_entry(2, 10, 20)),
            ])
            .unwrap();
        indexer.close().unwrap();
    }

    let (tx, _rx) = channel::unbounded();
    let reopened = Indexer::open(dir.path(), tx).unwrap();
    assert_eq!(reopened.get(b"a").unwrap(), Some(inline_entry(b"1")));
    assert_eq!(reopened.get(b"b").unwrap(), Some(out_of_line_entry(2, 10, 20)));
}

#[test]
fn wal_replay_recovers_uncheckpointed_writes() {
    let dir = tempdir().unwrap();
    {
        let (tx, _rx) = channel::unbounded();
        let indexer = Indexer::open(dir.path(), tx).unwrap();
        indexer
            .put_batch(vec![(b"a".to_vec(), inline_entry(b"1"))])
            .unwrap();
        indexer.delete(b"a").unwrap();
        indexer
            .put_batch(vec![(b"b".to_vec(), inline_entry(b"2"))])
            .unwrap();
        // No close()/checkpoint(): recovery must replay the WAL from scratch.
    }

    let (tx, _rx) = channel::unbounded();
    let reopened = Indexer::open(dir.path(), tx).unwrap();
    assert_eq!(reopened.get(b"a").unwrap(), None);
    assert_eq!(reopened.get(b"b").unwrap(), Some(inline_entry(b"2")));
}
