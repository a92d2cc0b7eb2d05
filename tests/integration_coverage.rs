//! Extra integration tests targeting configuration validation and error
//! handling, exercised only through the public `cfstore` API.

use std::time::Duration;

use cfstore::{CfError, ColumnFamily, ColumnFamilyOptions, WriteOptions};
use tempfile::TempDir;

fn base_opts(path: &std::path::Path) -> ColumnFamilyOptions {
    ColumnFamilyOptions::new("cf", path)
}

// ================================================================================================
// Config validation
// ================================================================================================

#[test]
fn empty_cf_name_is_rejected() {
    let dir = TempDir::new().unwrap();
    let opts = ColumnFamilyOptions::new("", dir.path());
    assert!(matches!(ColumnFamily::open(opts), Err(CfError::ColumnFamilyNil)));
}

#[test]
fn gc_ratio_of_zero_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut opts = base_opts(dir.path());
    opts.value_log_gc_ratio = 0.0;
    assert!(matches!(ColumnFamily::open(opts), Err(CfError::InvalidVLogGCRatio(_))));
}

#[test]
fn gc_ratio_of_one_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut opts = base_opts(dir.path());
    opts.value_log_gc_ratio = 1.0;
    assert!(matches!(ColumnFamily::open(opts), Err(CfError::InvalidVLogGCRatio(_))));
}

#[test]
fn negative_gc_ratio_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut opts = base_opts(dir.path());
    opts.value_log_gc_ratio = -0.1;
    assert!(matches!(ColumnFamily::open(opts), Err(CfError::InvalidVLogGCRatio(_))));
}

#[test]
fn single_memtable_slot_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut opts = base_opts(dir.path());
    opts.memtable_nums = 1;
    assert!(matches!(ColumnFamily::open(opts), Err(CfError::Internal(_))));
}

#[test]
fn two_memtable_slots_is_the_minimum_accepted() {
    let dir = TempDir::new().unwrap();
    let mut opts = base_opts(dir.path());
    opts.memtable_nums = 2;
    ColumnFamily::open(opts).unwrap().close().unwrap();
}

#[test]
fn custom_indexer_and_value_log_directories_are_honored() {
    let dir = TempDir::new().unwrap();
    let mut opts = base_opts(dir.path());
    opts.indexer_dir = Some(dir.path().join("idx"));
    opts.value_log_dir = Some(dir.path().join("vlog"));
    let cf = ColumnFamily::open(opts).unwrap();

    cf.put(b"k".to_vec(), b"v".to_vec(), WriteOptions::default()).unwrap();
    assert_eq!(cf.get(b"k").unwrap(), Some(b"v".to_vec()));
    assert!(dir.path().join("idx").exists());
    assert!(dir.path().join("vlog").exists());

    cf.close().unwrap();
}

// ================================================================================================
// Error handling
// ================================================================================================

#[test]
fn empty_key_rejected_on_put_get_and_delete() {
    let dir = TempDir::new().unwrap();
    let cf = ColumnFamily::open(base_opts(dir.path())).unwrap();

    assert!(matches!(
        cf.put(Vec::new(), b"v".to_vec(), WriteOptions::default()),
        Err(CfError::EmptyKey)
    ));
    assert!(matches!(cf.get(&[]), Err(CfError::EmptyKey)));
    assert!(matches!(
        cf.delete(Vec::new(), WriteOptions::default()),
        Err(CfError::EmptyKey)
    ));

    cf.close().unwrap();
}

#[test]
fn oversized_record_is_rejected_before_touching_disk() {
    let dir = TempDir::new().unwrap();
    let mut opts = base_opts(dir.path());
    opts.memtable_size = 16;
    let cf = ColumnFamily::open(opts).unwrap();

    let err = cf.put(b"key".to_vec(), vec![0u8; 64], WriteOptions::default());
    assert!(matches!(err, Err(CfError::ValueTooBig { .. })));

    cf.close().unwrap();
}

#[test]
fn operations_on_a_closed_column_family_return_closed_error() {
    let dir = TempDir::new().unwrap();
    let cf = ColumnFamily::open(base_opts(dir.path())).unwrap();
    cf.close().unwrap();

    assert!(matches!(
        cf.put(b"k".to_vec(), b"v".to_vec(), WriteOptions::default()),
        Err(CfError::Closed)
    ));
    assert!(matches!(cf.get(b"k"), Err(CfError::Closed)));
    assert!(matches!(
        cf.delete(b"k".to_vec(), WriteOptions::default()),
        Err(CfError::Closed)
    ));
    assert!(matches!(cf.sync(), Err(CfError::Closed)));
}

#[test]
fn disable_wal_write_is_visible_immediately_but_lost_on_crash() {
    let dir = TempDir::new().unwrap();
    {
        let cf = ColumnFamily::open(base_opts(dir.path())).unwrap();
        cf.put(
            b"k".to_vec(),
            b"v".to_vec(),
            WriteOptions { disable_wal: true, ..Default::default() },
        )
        .unwrap();
        assert_eq!(cf.get(b"k").unwrap(), Some(b"v".to_vec()));
        // No close(): simulates a crash before anything durable exists.
    }

    let cf = ColumnFamily::open(base_opts(dir.path())).unwrap();
    assert_eq!(cf.get(b"k").unwrap(), None);
    cf.close().unwrap();
}

#[test]
fn expired_entries_read_as_absent() {
    let dir = TempDir::new().unwrap();
    let cf = ColumnFamily::open(base_opts(dir.path())).unwrap();

    cf.put(
        b"k".to_vec(),
        b"v".to_vec(),
        WriteOptions { expiry: 1, ..Default::default() }, // epoch second 1: already past
    )
    .unwrap();
    assert_eq!(cf.get(b"k").unwrap(), None);

    cf.close().unwrap();
}

#[test]
fn admission_control_times_out_when_flush_cannot_keep_the_frozen_queue_drained() {
    let dir = TempDir::new().unwrap();
    let mut opts = base_opts(dir.path());
    opts.memtable_size = 256;
    opts.memtable_nums = 2;
    opts.mem_space_wait_timeout = Duration::from_millis(50);
    let cf = ColumnFamily::open(opts).unwrap();

    // Saturate the memtable/frozen pipeline faster than a single flush
    // worker can realistically drain many large records; eventually one
    // of these puts should observe a full frozen queue past its deadline,
    // or all succeed because flush kept up — both are acceptable, but the
    // call must never hang indefinitely.
    let mut saw_timeout = false;
    for i in 0..200u32 {
        match cf.put(format!("k{i}").into_bytes(), vec![0u8; 200], WriteOptions::default()) {
            Ok(()) => {}
            Err(CfError::WaitMemSpaceTimeout) => {
                saw_timeout = true;
                break;
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    let _ = saw_timeout; // either outcome is a pass; absence of a hang is what's verified.

    cf.close().unwrap();
}
