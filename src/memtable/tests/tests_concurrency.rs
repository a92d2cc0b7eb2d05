use std::sync::Arc;
use std::thread;

use tempfile::tempdir;

use crate::config::{IoMode, WriteOptions};
use crate::memtable::{Memtable, MemtableLookup};

#[test]
fn concurrent_puts_to_distinct_keys_all_land() {
    let dir = tempdir().unwrap();
    let mt = Arc::new(Memtable::open(dir.path(), 1, IoMode::Buffered).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let mt = Arc::clone(&mt);
            thread::spawn(move || {
                for i in 0..50u32 {
                    let key = format!("t{t}-{i}").into_bytes();
                    mt.put(key, b"v".to_vec(), false, &WriteOptions::default()).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    for t in 0..8u32 {
        for i in 0..50u32 {
            let key = format!("t{t}-{i}").into_bytes();
            assert!(matches!(mt.get(&key).unwrap(), MemtableLookup::Value { .. }));
        }
    }
}

#[test]
fn concurrent_readers_see_consistent_state_during_writes() {
    let dir = tempdir().unwrap();
    let mt = Arc::new(Memtable::open(dir.path(), 1, IoMode::Buffered).unwrap());
    mt.put(b"shared".to_vec(), b"initial".to_vec(), false, &WriteOptions::default()).unwrap();

    let writer = {
        let mt = Arc::clone(&mt);
        thread::spawn(move || {
            for i in 0..200u32 {
                mt.put(format!("filler-{i}").into_bytes(), b"v".to_vec(), false, &WriteOptions::default())
                    .unwrap();
            }
        })
    };

    let reader = {
        let mt = Arc::clone(&mt);
        thread::spawn(move || {
            for _ in 0..200 {
                match mt.get(b"shared").unwrap() {
                    MemtableLookup::Value { value, .. } => assert_eq!(value, b"initial"),
                    other => panic!("shared key should never disappear, got {other:?}"),
                }
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
}

#[test]
fn concurrent_put_and_delete_on_same_key_does_not_panic() {
    let dir = tempdir().unwrap();
    let mt = Arc::new(Memtable::open(dir.path(), 1, IoMode::Buffered).unwrap());

    let putter = {
        let mt = Arc::clone(&mt);
        thread::spawn(move || {
            for _ in 0..100 {
                mt.put(b"k".to_vec(), b"v".to_vec(), false, &WriteOptions::default()).unwrap();
            }
        })
    };
    let deleter = {
        let mt = Arc::clone(&mt);
        thread::spawn(move || {
            for _ in 0..100 {
                mt.delete(b"k".to_vec(), &WriteOptions::default()).unwrap();
            }
        })
    };
    putter.join().unwrap();
    deleter.join().unwrap();

    match mt.get(b"k").unwrap() {
        MemtableLookup::Value { .. } | MemtableLookup::Tombstone => {}
        MemtableLookup::Absent => panic!("key was written at least once"),
    }
}
