//! # Memtable Module
//!
//! The in-memory, WAL-backed write buffer for a single column family
//! memtable generation (one fid). Holds exactly one version per key —
//! there is no MVCC, no LSN, and no range-tombstone machinery, since the
//! column family serializes all writes through a single exclusive lock
//! before they ever reach a memtable (see `column_family`).
//!
//! ## Record shape
//!
//! Every mutation — `put` or `delete` — is represented by a
//! [`MemtableRecord`] carrying `{key, value, tombstone, expiry}`. A delete
//! is simply a put with `tombstone = true` and an empty `value`, matching
//! the shadowing semantics required by the read path: a tombstone present
//! in a memtable stops the lookup there, the same way a live value does.
//!
//! ## Flush
//!
//! `iter_sorted` returns every record in key order, tombstones included,
//! for the flush pipeline to drain into the indexer and value log. It does
//! not mutate or clear the memtable.

#[cfg(test)]
mod tests;

use std::{
    collections::BTreeMap,
    path::Path,
    sync::RwLock,
};

use thiserror::Error;
use tracing::{error, info, trace};

use crate::config::IoMode;
use crate::encoding::{self, EncodingError};
use crate::wal::{Wal, WalError};

/// Errors returned by [`Memtable`] operations.
#[derive(Debug, Error)]
pub enum MemtableError {
    /// Underlying WAL I/O or framing failure.
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    /// Internal invariant violation or poisoned lock.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A single WAL-persisted mutation: a put (`tombstone = false`) or a
/// delete (`tombstone = true`, `value` empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemtableRecord {
    /// The mutated key.
    pub key: Vec<u8>,
    /// The stored value. Empty when `tombstone` is set.
    pub value: Vec<u8>,
    /// Whether this record deletes `key`.
    pub tombstone: bool,
    /// Absolute expiry, seconds since epoch. `0` means never.
    pub expiry: u64,
}

impl encoding::Encode for MemtableRecord {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.key.encode_to(buf)?;
        self.value.encode_to(buf)?;
        self.tombstone.encode_to(buf)?;
        self.expiry.encode_to(buf)?;
        Ok(())
    }
}

impl encoding::Decode for MemtableRecord {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut offset = 0;
        let (key, n) = Vec::<u8>::decode_from(&buf[offset..])?;
        offset += n;
        let (value, n) = Vec::<u8>::decode_from(&buf[offset..])?;
        offset += n;
        let (tombstone, n) = bool::decode_from(&buf[offset..])?;
        offset += n;
        let (expiry, n) = u64::decode_from(&buf[offset..])?;
        offset += n;
        Ok((
            Self {
                key,
                value,
                tombstone,
                expiry,
            },
            offset,
        ))
    }
}

/// In-memory entry for a key, the resident form of a [`MemtableRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
struct MemtableEntry {
    value: Vec<u8>,
    tombstone: bool,
    expiry: u64,
}

/// Result of a memtable lookup, per the collaborator contract
/// (`get(key) -> (tombstoned: bool, value: bytes)`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemtableLookup {
    /// Key present, carrying a live value.
    Value { value: Vec<u8>, expiry: u64 },
    /// Key present, shadowed by a tombstone — the read path must stop
    /// here and report absence, not fall through to the indexer.
    Tombstone,
    /// Key not present in this memtable.
    Absent,
}

/// Per-write options recognized by `put`/`delete`; re-exported at the
/// crate root as `crate::WriteOptions`.
pub use crate::config::WriteOptions;

struct MemtableInner {
    tree: BTreeMap<Vec<u8>, MemtableEntry>,
    approximate_size: u64,
}

/// A single memtable generation: the active writable table, or one of the
/// frozen, read-only tables awaiting flush.
///
/// Identified by its `fid`, which also names its backing WAL segment
/// (`<fid:08>.wal`). See the [module docs](self) for the record shape.
pub struct Memtable {
    inner: RwLock<MemtableInner>,
    wal: Wal<MemtableRecord>,
    fid: u32,
}

impl Memtable {
    /// Opens (or creates) the memtable for `fid` inside `dir`, replaying
    /// its WAL to reconstruct in-memory state.
    ///
    /// `max_bytes` is advisory only — admission control against the
    /// memtable byte budget is the write path's responsibility; the
    /// memtable itself never refuses a `put`.
    pub fn open(dir: &Path, fid: u32, io_mode: IoMode) -> Result<Self, MemtableError> {
        let wal = Wal::open(dir, fid, io_mode)?;

        let mut tree = BTreeMap::new();
        let mut approximate_size = 0u64;

        for record in wal.replay_iter()? {
            let record = record?;
            approximate_size += record.key.len() as u64 + record.value.len() as u64;
            tree.insert(
                record.key,
                MemtableEntry {
                    value: record.value,
                    tombstone: record.tombstone,
                    expiry: record.expiry,
                },
            );
        }

        info!(fid, entries = tree.len(), "memtable recovered from WAL");

        Ok(Self {
            inner: RwLock::new(MemtableInner {
                tree,
                approximate_size,
            }),
            wal,
            fid,
        })
    }

    /// The fid identifying this memtable and its WAL segment.
    pub fn fid(&self) -> u32 {
        self.fid
    }

    /// Inserts or updates `key`. A delete is `put` with `tombstone = true`
    /// and an empty value.
    ///
    /// The WAL record is appended before the in-memory map is updated, so
    /// a WAL failure leaves no partial in-memory state.
    pub fn put(
        &self,
        key: Vec<u8>,
        value: Vec<u8>,
        tombstone: bool,
        write_opts: &WriteOptions,
    ) -> Result<(), MemtableError> {
        trace!(tombstone, key_len = key.len(), "memtable put");

        let record_size = key.len() as u64 + value.len() as u64;
        let record = MemtableRecord {
            key: key.clone(),
            value: value.clone(),
            tombstone,
            expiry: write_opts.expiry,
        };

        if !write_opts.disable_wal {
            self.wal.append(&record, write_opts.sync)?;
        }

        let mut guard = self.inner.write().map_err(|_| {
            error!("memtable lock poisoned during put");
            MemtableError::Internal("RwLock poisoned".into())
        })?;

        guard.tree.insert(
            key,
            MemtableEntry {
                value,
                tombstone,
                expiry: write_opts.expiry,
            },
        );
        guard.approximate_size += record_size;

        Ok(())
    }

    /// Deletes `key` by inserting a tombstone record.
    pub fn delete(&self, key: Vec<u8>, write_opts: &WriteOptions) -> Result<(), MemtableError> {
        self.put(key, Vec::new(), true, write_opts)
    }

    /// Looks up `key`: a tombstone here must short-circuit the
    /// read path just as a live value does.
    pub fn get(&self, key: &[u8]) -> Result<MemtableLookup, MemtableError> {
        let guard = self.inner.read().map_err(|_| {
            error!("memtable lock poisoned during get");
            MemtableError::Internal("RwLock poisoned".into())
        })?;

        Ok(match guard.tree.get(key) {
            None => MemtableLookup::Absent,
            Some(entry) if entry.tombstone => MemtableLookup::Tombstone,
            Some(entry) => MemtableLookup::Value {
                value: entry.value.clone(),
                expiry: entry.expiry,
            },
        })
    }

    /// Returns every record in key order, for the flush pipeline to drain.
    /// Does not mutate or clear the memtable.
    pub fn iter_sorted(&self) -> Result<Vec<MemtableRecord>, MemtableError> {
        let guard = self.inner.read().map_err(|_| {
            error!("memtable lock poisoned during iter_sorted");
            MemtableError::Internal("RwLock poisoned".into())
        })?;

        Ok(guard
            .tree
            .iter()
            .map(|(key, entry)| MemtableRecord {
                key: key.clone(),
                value: entry.value.clone(),
                tombstone: entry.tombstone,
                expiry: entry.expiry,
            })
            .collect())
    }

    /// Approximate in-memory footprint in bytes (sum of key+value lengths
    /// across all resident records, tombstones included).
    pub fn size(&self) -> Result<u64, MemtableError> {
        let guard = self.inner.read().map_err(|_| {
            MemtableError::Internal("RwLock poisoned".into())
        })?;
        Ok(guard.approximate_size)
    }

    /// Fsyncs the backing WAL without closing it.
    pub fn sync_wal(&self) -> Result<(), MemtableError> {
        self.wal.sync()?;
        Ok(())
    }

    /// Syncs and closes the backing WAL, consuming this memtable. Used at
    /// shutdown for memtables whose contents have not (yet) been flushed.
    pub fn close_wal(self) -> Result<(), MemtableError> {
        self.wal.close()?;
        Ok(())
    }

    /// Syncs, closes, and removes the backing WAL file, consuming this
    /// memtable. Called once the flush pipeline has durably transferred
    /// every record into the indexer and value log.
    pub fn delete_wal(self) -> Result<(), MemtableError> {
        self.wal.delete()?;
        Ok(())
    }
}

/// A read-only view over a memtable that has been rotated out of the
/// active slot and is awaiting flush.
///
/// Exists purely to make "no more writes accepted" a type-level fact at
/// the call site, via a `FrozenMemtable` wrapper around
/// `Memtable`.
pub struct FrozenMemtable(Memtable);

impl FrozenMemtable {
    /// Freezes `memtable`, preventing any further writes through this
    /// handle.
    pub fn new(memtable: Memtable) -> Self {
        Self(memtable)
    }

    /// The fid identifying this memtable generation.
    pub fn fid(&self) -> u32 {
        self.0.fid()
    }

    /// Looks up `key`; see [`Memtable::get`].
    pub fn get(&self, key: &[u8]) -> Result<MemtableLookup, MemtableError> {
        self.0.get(key)
    }

    /// Returns every record in key order; see [`Memtable::iter_sorted`].
    pub fn iter_sorted(&self) -> Result<Vec<MemtableRecord>, MemtableError> {
        self.0.iter_sorted()
    }

    /// Approximate in-memory footprint in bytes.
    pub fn size(&self) -> Result<u64, MemtableError> {
        self.0.size()
    }

    /// Syncs, closes, and removes the backing WAL file, consuming the
    /// frozen memtable. Called after a successful flush.
    pub fn delete_wal(self) -> Result<(), MemtableError> {
        self.0.delete_wal()
    }

    /// Syncs and closes the backing WAL, consuming the frozen memtable.
    /// Called during shutdown if the memtable was never flushed.
    pub fn close_wal(self) -> Result<(), MemtableError> {
        self.0.close_wal()
    }
}
