//! Top-level error type for the column family storage engine.
//!
//! Each collaborator (WAL, memtable, indexer, value log) defines its own
//! error type with `thiserror`; [`CfError`] folds them into a single enum
//! via `#[from]`, the same way a storage engine's top-level error type
//! aggregates its component errors.

use std::io;

use thiserror::Error;

use crate::indexer::IndexerError;
use crate::memtable::MemtableError;
use crate::vlog::VLogError;
use crate::wal::WalError;

/// Errors returned by [`crate::column_family::ColumnFamily`] operations.
#[derive(Debug, Error)]
pub enum CfError {
    /// `cf_name` was empty on open.
    #[error("column family name must not be empty")]
    ColumnFamilyNil,

    /// Another process (or another `ColumnFamily` instance in this process)
    /// already holds an exclusive lock on one of the cf/index/vlog
    /// directories.
    #[error("another process holds the directory lock for {0}")]
    AnotherProcessHoldsDir(String),

    /// `value_log_gc_ratio` was not in `(0.0, 1.0)` exclusive.
    #[error("value log GC ratio must be in (0.0, 1.0), got {0}")]
    InvalidVLogGCRatio(f64),

    /// An empty key was passed to `put`/`delete` ("Empty key is
    /// invalid").
    #[error("key must not be empty")]
    EmptyKey,

    /// `len(key) + len(value) > memtable_size`.
    #[error("value too big: key+value size {size} exceeds memtable size {limit}")]
    ValueTooBig {
        /// Combined key+value size that was rejected.
        size: usize,
        /// The configured memtable byte budget.
        limit: usize,
    },

    /// The frozen queue stayed full past `mem_space_wait_timeout`; the
    /// caller should retry.
    #[error("timed out waiting for memtable space")]
    WaitMemSpaceTimeout,

    /// The column family has been closed; all public operations fail with
    /// this error afterwards.
    #[error("column family is closed")]
    Closed,

    /// Error originating from the memtable/WAL subsystem.
    #[error("memtable error: {0}")]
    Memtable(#[from] MemtableError),

    /// Error originating from the indexer subsystem.
    #[error("indexer error: {0}")]
    Indexer(#[from] IndexerError),

    /// Error originating from the value log subsystem.
    #[error("value log error: {0}")]
    VLog(#[from] VLogError),

    /// Error originating from the raw WAL layer (directory scanning,
    /// recovery of fids not yet wrapped in a memtable).
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    /// Underlying filesystem I/O failure not otherwise classified.
    #[error("I/O failure: {0}")]
    IoFailure(#[from] io::Error),

    /// Internal invariant violation (poisoned lock, unexpected state).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the crate's public API.
pub type Result<T> = std::result::Result<T, CfError>;
