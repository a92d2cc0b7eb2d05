//! # Indexer
//!
//! Persistent ordered map from key to [`IndexEntry`], playing the role of
//! a B+tree without committing to one: the internal node/page layout is
//! left unspecified, so this module instead persists the index with a
//! **WAL + periodic snapshot** model, the same shape a manifest component
//! uses elsewhere in this crate. An in-memory `BTreeMap<Vec<u8>,
//! IndexEntry>` is the live structure; every mutation is appended to an
//! indexer WAL first, and `close` (and `sync`, via an explicit
//! `checkpoint`) compacts that WAL into a checksummed snapshot.
//!
//! ## Discard notices
//!
//! Whenever a `put_batch`/`delete` overwrites an index entry that pointed
//! into the value log (`fid != 0`), a `(fid, entry_size)` discard notice is
//! sent on the channel supplied to [`Indexer::open`] — the value log's GC
//! uses these to find segments worth reclaiming.

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crc32fast::Hasher as Crc32;
use crossbeam::channel::Sender;
use thiserror::Error;
use tracing::{info, warn};

use crate::encoding::{self, Decode, Encode, EncodingError};
use crate::wal::{Wal, WalError};

const SNAPSHOT_FILENAME: &str = "INDEX-SNAPSHOT";
const SNAPSHOT_TMP_SUFFIX: &str = ".tmp";
/// The indexer's own WAL, distinct from any memtable's `<fid>.wal`. Fixed,
/// single-segment; truncated on every checkpoint.
const INDEXER_WAL_FID: u32 = 0;

/// Errors returned by [`Indexer`] operations.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Underlying WAL I/O or framing failure.
    #[error("indexer WAL error: {0}")]
    Wal(#[from] WalError),

    /// Underlying filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Encoding/decoding failure.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// Snapshot checksum did not match its contents.
    #[error("index snapshot checksum mismatch")]
    SnapshotChecksumMismatch,

    /// Internal invariant violation or poisoned lock.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A durable index entry: either an inline small value, or a pointer into
/// the value log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Non-empty for the inline small-value fast path; empty when the
    /// value lives in the value log at `(fid, offset)`.
    pub value: Vec<u8>,
    /// Value-log segment id. `0` when `value` is inline.
    pub fid: u32,
    /// Byte offset into the value-log segment. Meaningless when inline.
    pub offset: u64,
    /// Byte length of the value-log entry at `(fid, offset)`. Used to
    /// build discard notices when this pointer is superseded.
    pub entry_size: u32,
    /// Absolute expiry, seconds since epoch. `0` means never.
    pub expiry: u64,
}

impl IndexEntry {
    /// True when this entry points into the value log rather than
    /// carrying its value inline.
    pub fn is_out_of_line(&self) -> bool {
        self.value.is_empty() && self.fid != 0
    }
}

impl Encode for IndexEntry {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.value.encode_to(buf)?;
        self.fid.encode_to(buf)?;
        self.offset.encode_to(buf)?;
        self.entry_size.encode_to(buf)?;
        self.expiry.encode_to(buf)?;
        Ok(())
    }
}

impl Decode for IndexEntry {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut offset = 0;
        let (value, n) = Vec::<u8>::decode_from(&buf[offset..])?;
        offset += n;
        let (fid, n) = u32::decode_from(&buf[offset..])?;
        offset += n;
        let (voffset, n) = u64::decode_from(&buf[offset..])?;
        offset += n;
        let (entry_size, n) = u32::decode_from(&buf[offset..])?;
        offset += n;
        let (expiry, n) = u64::decode_from(&buf[offset..])?;
        offset += n;
        Ok((
            Self {
                value,
                fid,
                offset: voffset,
                entry_size,
                expiry,
            },
            offset,
        ))
    }
}

/// A single durable mutation to the index: a put or a delete. Appended to
/// the indexer WAL before the in-memory map is updated.
#[derive(Debug)]
enum IndexRecord {
    Put { key: Vec<u8>, entry: IndexEntry },
    Delete { key: Vec<u8> },
}

impl Encode for IndexRecord {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        match self {
            IndexRecord::Put { key, entry } => {
                0u32.encode_to(buf)?;
                key.encode_to(buf)?;
                entry.encode_to(buf)?;
            }
            IndexRecord::Delete { key } => {
                1u32.encode_to(buf)?;
                key.encode_to(buf)?;
            }
        }
        Ok(())
    }
}

impl Decode for IndexRecord {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut offset = 0;
        let (tag, n) = u32::decode_from(&buf[offset..])?;
        offset += n;
        match tag {
            0 => {
                let (key, n) = Vec::<u8>::decode_from(&buf[offset..])?;
                offset += n;
                let (entry, n) = IndexEntry::decode_from(&buf[offset..])?;
                offset += n;
                Ok((IndexRecord::Put { key, entry }, offset))
            }
            1 => {
                let (key, n) = Vec::<u8>::decode_from(&buf[offset..])?;
                offset += n;
                Ok((IndexRecord::Delete { key }, offset))
            }
            _ => Err(EncodingError::InvalidTag {
                tag,
                type_name: "IndexRecord",
            }),
        }
    }
}

/// Checksummed full-state snapshot written to `INDEX-SNAPSHOT`.
#[derive(Debug)]
struct IndexSnapshot {
    entries: Vec<(Vec<u8>, IndexEntry)>,
    checksum: u32,
}

impl Encode for IndexSnapshot {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        encoding::encode_vec(&self.entries, buf)?;
        self.checksum.encode_to(buf)?;
        Ok(())
    }
}

impl Decode for IndexSnapshot {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut offset = 0;
        let (entries, n) = encoding::decode_vec::<(Vec<u8>, IndexEntry)>(&buf[offset..])?;
        offset += n;
        let (checksum, n) = u32::decode_from(&buf[offset..])?;
        offset += n;
        Ok((Self { entries, checksum }, offset))
    }
}

impl Encode for (Vec<u8>, IndexEntry) {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.0.encode_to(buf)?;
        self.1.encode_to(buf)?;
        Ok(())
    }
}

impl Decode for (Vec<u8>, IndexEntry) {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut offset = 0;
        let (key, n) = Vec::<u8>::decode_from(&buf[offset..])?;
        offset += n;
        let (entry, n) = IndexEntry::decode_from(&buf[offset..])?;
        offset += n;
        Ok(((key, entry), offset))
    }
}

/// Persistent ordered map from key to [`IndexEntry`]. Single writer (the
/// flush pipeline), many concurrent readers.
pub struct Indexer {
    dir: PathBuf,
    wal: Wal<IndexRecord>,
    tree: Mutex<BTreeMap<Vec<u8>, IndexEntry>>,
    discard_tx: Sender<(u32, u64)>,
}

impl Indexer {
    /// Opens (or creates and recovers) the indexer rooted at `dir`.
    ///
    /// `discard_tx` is the value log's discard-channel endpoint: every time
    /// a put/delete here supersedes an out-of-line entry, `(fid,
    /// entry_size)` is sent on it.
    pub fn open(dir: &Path, discard_tx: Sender<(u32, u64)>) -> Result<Self, IndexerError> {
        fs::create_dir_all(dir)?;

        let mut tree = BTreeMap::new();
        let snapshot_path = dir.join(SNAPSHOT_FILENAME);
        if snapshot_path.exists() {
            match Self::read_snapshot(&snapshot_path) {
                Ok(entries) => {
                    tree.extend(entries);
                    info!(entries = tree.len(), "index snapshot loaded");
                }
                Err(e) => {
                    warn!(%e, "index snapshot unreadable; falling back to WAL replay");
                }
            }
        }

        let wal = Wal::open(dir, INDEXER_WAL_FID, crate::config::IoMode::Buffered)?;
        let mut replayed = 0u64;
        for record in wal.replay_iter()? {
            let record = record?;
            Self::apply(&mut tree, record);
            replayed += 1;
        }
        info!(replayed, "index WAL replayed");

        Ok(Self {
            dir: dir.to_path_buf(),
            wal,
            tree: Mutex::new(tree),
            discard_tx,
        })
    }

    fn apply(tree: &mut BTreeMap<Vec<u8>, IndexEntry>, record: IndexRecord) {
        match record {
            IndexRecord::Put { key, entry } => {
                tree.insert(key, entry);
            }
            IndexRecord::Delete { key } => {
                tree.remove(&key);
            }
        }
    }

    fn notify_discard(&self, prior: &IndexEntry) {
        if prior.is_out_of_line() {
            if self
                .discard_tx
                .try_send((prior.fid, prior.entry_size as u64))
                .is_err()
            {
                warn!(fid = prior.fid, "discard channel full or closed; notice dropped");
            }
        }
    }

    /// Applies a batch of puts atomically with respect to WAL durability:
    /// every entry in `entries` is appended to the WAL before any is
    /// applied to the in-memory map ("batch index updates in groups
    /// of `FlushBatchSize`").
    pub fn put_batch(&self, entries: Vec<(Vec<u8>, IndexEntry)>) -> Result<(), IndexerError> {
        let mut guard = self
            .tree
            .lock()
            .map_err(|_| IndexerError::Internal("index lock poisoned".into()))?;

        for (key, entry) in entries {
            self.wal.append(
                &IndexRecord::Put {
                    key: key.clone(),
                    entry: entry.clone(),
                },
                false,
            )?;
            if let Some(prior) = guard.insert(key, entry) {
                self.notify_discard(&prior);
            }
        }
        Ok(())
    }

    /// Looks up `key`.
    pub fn get(&self, key: &[u8]) -> Result<Option<IndexEntry>, IndexerError> {
        let guard = self
            .tree
            .lock()
            .map_err(|_| IndexerError::Internal("index lock poisoned".into()))?;
        Ok(guard.get(key).cloned())
    }

    /// Removes `key`, returning the entry that was present (if any) so the
    /// flush pipeline can emit a discard notice when it pointed out of
    /// line.
    pub fn delete(&self, key: &[u8]) -> Result<Option<IndexEntry>, IndexerError> {
        let mut guard = self
            .tree
            .lock()
            .map_err(|_| IndexerError::Internal("index lock poisoned".into()))?;

        self.wal.append(
            &IndexRecord::Delete {
                key: key.to_vec(),
            },
            false,
        )?;
        let prior = guard.remove(key);
        if let Some(prior) = &prior {
            self.notify_discard(prior);
        }
        Ok(prior)
    }

    /// Fsyncs the indexer WAL.
    pub fn sync(&self) -> Result<(), IndexerError> {
        self.wal.sync()?;
        Ok(())
    }

    /// Compacts the live tree into a checksummed snapshot and truncates
    /// the WAL, the same way a manifest checkpoint compacts its own log.
    pub fn checkpoint(&self) -> Result<(), IndexerError> {
        let entries: Vec<(Vec<u8>, IndexEntry)> = {
            let guard = self
                .tree
                .lock()
                .map_err(|_| IndexerError::Internal("index lock poisoned".into()))?;
            guard.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };

        let mut snapshot = IndexSnapshot {
            entries,
            checksum: 0,
        };
        let mut bytes = encoding::encode_to_vec(&snapshot)?;
        let mut hasher = Crc32::new();
        hasher.update(&bytes);
        let checksum = hasher.finalize();
        snapshot.checksum = checksum;
        let len = bytes.len();
        bytes[len - 4..].copy_from_slice(&checksum.to_le_bytes());

        let tmp_path = self.dir.join(format!("{SNAPSHOT_FILENAME}{SNAPSHOT_TMP_SUFFIX}"));
        {
            let mut f = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            f.write_all(&bytes)?;
            f.sync_all()?;
        }
        fs::rename(&tmp_path, self.dir.join(SNAPSHOT_FILENAME))?;
        if let Ok(dir_file) = File::open(&self.dir) {
            let _ = dir_file.sync_all();
        }

        self.wal.truncate()?;
        info!("index snapshot checkpointed");
        Ok(())
    }

    fn read_snapshot(path: &Path) -> Result<Vec<(Vec<u8>, IndexEntry)>, IndexerError> {
        let mut f = File::open(path)?;
        let mut buf = Vec::new();
        f.read_to_end(&mut buf)?;

        let (snap, _) = encoding::decode_from_slice::<IndexSnapshot>(&buf)?;
        let verify = IndexSnapshot {
            entries: snap.entries.clone(),
            checksum: 0,
        };
        let verify_bytes = encoding::encode_to_vec(&verify)?;
        let mut hasher = Crc32::new();
        hasher.update(&verify_bytes);
        if hasher.finalize() != snap.checksum {
            return Err(IndexerError::SnapshotChecksumMismatch);
        }
        Ok(snap.entries)
    }

    /// Checkpoints and syncs the indexer WAL. Takes `&self` — like a
    /// manifest, the indexer is a long-lived handle shared behind an
    /// `Arc`, not a value consumed on close.
    pub fn close(&self) -> Result<(), IndexerError> {
        self.checkpoint()?;
        self.wal.sync()?;
        Ok(())
    }
}
