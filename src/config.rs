//! Configuration for a [`ColumnFamily`](crate::column_family::ColumnFamily).
//!
//! A plain struct of thresholds and sizes passed to `ColumnFamily::open`,
//! plus a `validate()` step that rejects nonsensical combinations up
//! front rather than failing partway through directory setup.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::CfError;

/// I/O strategy for a WAL or value-log segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoMode {
    /// Standard buffered reads/writes through the OS page cache.
    Buffered,
    /// Memory-map the file for reads.
    Mmap,
}

/// Configuration for a [`ColumnFamily`](crate::column_family::ColumnFamily) instance.
///
/// Passed to [`ColumnFamily::open`](crate::column_family::ColumnFamily::open).
#[derive(Debug, Clone)]
pub struct ColumnFamilyOptions {
    /// Required, non-empty. Errors [`CfError::ColumnFamilyNil`] otherwise.
    pub cf_name: String,

    /// Root directory the column family is mounted under. The effective
    /// on-disk directory is `<dir_path>/<cf_name>`.
    pub dir_path: PathBuf,

    /// Directory for indexer files. Defaults to the cf directory.
    pub indexer_dir: Option<PathBuf>,

    /// Directory for value log segments. Defaults to the cf directory.
    pub value_log_dir: Option<PathBuf>,

    /// Byte budget per memtable before rotation is required.
    pub memtable_size: u64,

    /// Total memtables (active + frozen). Frozen queue capacity is this
    /// value minus one; minimum 2 (one active, at least one frozen slot).
    pub memtable_nums: usize,

    /// Memory-map WAL segments for reads if true.
    pub wal_mmap: bool,

    /// Bytes written between background WAL flushes (advisory; full
    /// fsync-on-write is still controlled per-call via `WriteOptions::sync`).
    pub wal_bytes_flush: u64,

    /// Batch size for indexer `put_batch` calls during flush.
    pub flush_batch_size: usize,

    /// Value log segment size in bytes before rotating to a new fid.
    pub value_log_file_size: u64,

    /// Memory-map value log segments for reads if true.
    pub value_log_mmap: bool,

    /// Discard ratio that triggers value-log GC. Must be in `(0.0, 1.0)`
    /// exclusive; validated by [`ColumnFamilyOptions::validate`].
    pub value_log_gc_ratio: f64,

    /// Scheduling period for the value-log GC loop.
    pub value_log_gc_interval: Duration,

    /// Values no longer than this many bytes are inlined into the index;
    /// larger values are written to the value log.
    pub value_threshold: usize,

    /// Deadline for the write path's "wait for memtable space" loop before
    /// returning [`CfError::WaitMemSpaceTimeout`].
    pub mem_space_wait_timeout: Duration,
}

impl ColumnFamilyOptions {
    /// Constructs options with reasonable defaults: a 4 MiB memtable, 4
    /// memtables total, 64 MiB value log segments, and a 1 KiB inline
    /// threshold.
    pub fn new(cf_name: impl Into<String>, dir_path: impl Into<PathBuf>) -> Self {
        Self {
            cf_name: cf_name.into(),
            dir_path: dir_path.into(),
            indexer_dir: None,
            value_log_dir: None,
            memtable_size: 4 * 1024 * 1024,
            memtable_nums: 4,
            wal_mmap: false,
            wal_bytes_flush: 4 * 1024 * 1024,
            flush_batch_size: 1000,
            value_log_file_size: 64 * 1024 * 1024,
            value_log_mmap: false,
            value_log_gc_ratio: 0.5,
            value_log_gc_interval: Duration::from_secs(300),
            value_threshold: 1024,
            mem_space_wait_timeout: Duration::from_secs(30),
        }
    }

    /// Resolves the effective on-disk directory for the column family:
    /// `<dir_path>/<cf_name>`.
    pub fn resolved_cf_dir(&self) -> PathBuf {
        self.dir_path.join(&self.cf_name)
    }

    /// Resolves the effective indexer directory, defaulting to the cf dir.
    pub fn resolved_indexer_dir(&self) -> PathBuf {
        self.indexer_dir
            .clone()
            .unwrap_or_else(|| self.resolved_cf_dir())
    }

    /// Resolves the effective value log directory, defaulting to the cf dir.
    pub fn resolved_vlog_dir(&self) -> PathBuf {
        self.value_log_dir
            .clone()
            .unwrap_or_else(|| self.resolved_cf_dir())
    }

    /// Validates option invariants that `open` relies on.
    ///
    /// Checked here rather than in `open` itself so construction-time
    /// mistakes (e.g. a GC ratio of `0.0`) are caught before any directory
    /// I/O happens.
    pub fn validate(&self) -> Result<(), CfError> {
        if self.cf_name.is_empty() {
            return Err(CfError::ColumnFamilyNil);
        }
        if !(0.0 < self.value_log_gc_ratio && self.value_log_gc_ratio < 1.0) {
            return Err(CfError::InvalidVLogGCRatio(self.value_log_gc_ratio));
        }
        if self.memtable_nums < 2 {
            return Err(CfError::Internal(
                "memtable_nums must be at least 2 (one active, one frozen slot)".into(),
            ));
        }
        Ok(())
    }
}

/// Per-write options recognized by `put`/`delete`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Force a WAL fsync before returning.
    pub sync: bool,

    /// Skip the WAL append entirely (crash-unsafe fast path).
    pub disable_wal: bool,

    /// Absolute expiry, seconds since epoch. `0` means never.
    pub expiry: u64,
}
