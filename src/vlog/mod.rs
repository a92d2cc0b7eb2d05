//! # Value Log
//!
//! Segmented, append-only store for values too large to inline in the
//! index. Its on-disk record layout is this module's own concern: a
//! length-prefixed, CRC-protected framing that generalizes this crate's
//! WAL record framing (`wal/mod.rs`) to carry `{key, value, expiry,
//! tombstone}` directly instead of an opaque encoded blob.
//!
//! ## Segments
//!
//! Entries are appended to the active segment (`<fid:08>.vlog`) until it
//! would exceed `segment_size`, at which point a new segment is opened and
//! becomes active. Older segments are read-only, and — when
//! `io_mode` is `IoMode::Mmap` — read through a memory map instead of a
//! buffered `File`, cached per fid the first time it's touched. The active
//! segment is never mmapped, since it keeps growing.
//!
//! ## Garbage collection
//!
//! The value log does not run its own background GC thread. GC
//! must be coordinated with the column family's `flush_lock` — a lock this
//! module has no access to — so the GC *loop* (scheduling on
//! `gc_interval`) lives in `column_family`, which drains discard notices
//! via [`ValueLog::drain_discards`], picks a candidate segment via
//! [`ValueLog::gc_candidate`], and relocates its still-live entries via
//! [`ValueLog::rewrite_segment`], updating the indexer's pointers itself
//! (the value log has no indexer handle of its own).

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crc32fast::Hasher as Crc32;
use crossbeam::channel::{self, Receiver, Sender};
use memmap2::Mmap;
use thiserror::Error;
use tracing::{info, trace, warn};

use crate::config::IoMode;
use crate::encoding::{self, Decode, Encode, EncodingError};

const VLOG_EXT: &str = "vlog";
const INITIAL_VLOG_FID: u32 = 1;
/// Length-prefix + trailing CRC32 overhead per on-disk record.
const RECORD_FRAMING_OVERHEAD: usize = 4 + 4;

/// Errors returned by [`ValueLog`] operations.
#[derive(Debug, Error)]
pub enum VLogError {
    /// Underlying filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Encoding/decoding failure.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// A read targeted a segment fid with no corresponding file.
    #[error("value log segment {0} not found")]
    SegmentNotFound(u32),

    /// A read's CRC did not match its record bytes.
    #[error("value log entry at segment {fid} offset {offset} failed checksum")]
    ChecksumMismatch { fid: u32, offset: u64 },

    /// `gc_ratio` was not in `(0.0, 1.0)` exclusive.
    #[error("value log GC ratio must be in (0.0, 1.0), got {0}")]
    InvalidGcRatio(f64),

    /// Internal invariant violation or poisoned lock.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Options for [`ValueLog::open`].
#[derive(Debug, Clone)]
pub struct VLogOptions {
    pub path: PathBuf,
    pub segment_size: u64,
    pub io_mode: IoMode,
    pub gc_ratio: f64,
    pub gc_interval: Duration,
}

impl VLogOptions {
    /// Validates `gc_ratio`. Called by [`ValueLog::open`].
    pub fn validate(&self) -> Result<(), VLogError> {
        if !(0.0 < self.gc_ratio && self.gc_ratio < 1.0) {
            return Err(VLogError::InvalidGcRatio(self.gc_ratio));
        }
        Ok(())
    }
}

/// A single value-log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VLogEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub expiry: u64,
    pub tombstone: bool,
}

impl Encode for VLogEntry {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.key.encode_to(buf)?;
        self.value.encode_to(buf)?;
        self.expiry.encode_to(buf)?;
        self.tombstone.encode_to(buf)?;
        Ok(())
    }
}

impl Decode for VLogEntry {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut offset = 0;
        let (key, n) = Vec::<u8>::decode_from(&buf[offset..])?;
        offset += n;
        let (value, n) = Vec::<u8>::decode_from(&buf[offset..])?;
        offset += n;
        let (expiry, n) = u64::decode_from(&buf[offset..])?;
        offset += n;
        let (tombstone, n) = bool::decode_from(&buf[offset..])?;
        offset += n;
        Ok((
            Self {
                key,
                value,
                expiry,
                tombstone,
            },
            offset,
        ))
    }
}

struct ActiveSegment {
    fid: u32,
    file: File,
    offset: u64,
}

/// A read-only handle onto a sealed (non-active) segment: either a shared
/// buffered file or a memory map, depending on `io_mode`.
enum SegmentHandle {
    File(Arc<File>),
    Mmap(Arc<Mmap>),
}

impl SegmentHandle {
    /// Reads exactly `buf.len()` bytes starting at `offset`. For the `File`
    /// variant this seeks the shared handle first, relying on the same
    /// per-call `Seek`-then-`read_exact` pattern the WAL uses for random
    /// access; for `Mmap` it's a bounds-checked slice copy.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), VLogError> {
        match self {
            SegmentHandle::File(file) => {
                let mut f = &**file;
                f.seek(SeekFrom::Start(offset))?;
                f.read_exact(buf)?;
                Ok(())
            }
            SegmentHandle::Mmap(mmap) => {
                let start = usize::try_from(offset)
                    .map_err(|_| VLogError::Internal("offset overflow".into()))?;
                let end = start
                    .checked_add(buf.len())
                    .ok_or_else(|| VLogError::Internal("offset overflow".into()))?;
                let slice = mmap
                    .get(start..end)
                    .ok_or(VLogError::Internal("mmap read past end of segment".into()))?;
                buf.copy_from_slice(slice);
                Ok(())
            }
        }
    }

    /// Total size of the underlying segment in bytes.
    fn len(&self) -> Result<u64, VLogError> {
        match self {
            SegmentHandle::File(file) => Ok(file.metadata()?.len()),
            SegmentHandle::Mmap(mmap) => Ok(mmap.len() as u64),
        }
    }
}

fn segment_path(dir: &Path, fid: u32) -> PathBuf {
    dir.join(format!("{fid:08}.{VLOG_EXT}"))
}

fn parse_fid(path: &Path) -> Option<u32> {
    if path.extension().and_then(|e| e.to_str()) != Some(VLOG_EXT) {
        return None;
    }
    path.file_stem()?.to_str()?.parse::<u32>().ok()
}

/// Segmented append-only store holding large values out of the index.
pub struct ValueLog {
    dir: PathBuf,
    segment_size: u64,
    io_mode: IoMode,
    active: Mutex<ActiveSegment>,
    /// Read-only handles for non-active segments, opened lazily and cached
    /// as either a buffered file or a memory map depending on `io_mode`.
    readers: Mutex<HashMap<u32, Arc<SegmentHandle>>>,
    /// Total bytes ever appended to each segment (active included).
    segment_bytes: Mutex<HashMap<u32, u64>>,
    /// Bytes known-discarded per segment, accumulated from the discard
    /// channel via [`ValueLog::drain_discards`].
    discard_bytes: Mutex<HashMap<u32, u64>>,
    discard_tx: Sender<(u32, u64)>,
    discard_rx: Receiver<(u32, u64)>,
}

impl ValueLog {
    /// Opens (or creates) the value log at `opts.path`, recovering the
    /// set of existing segments and selecting the highest fid as active.
    pub fn open(opts: VLogOptions) -> Result<Self, VLogError> {
        opts.validate()?;
        fs::create_dir_all(&opts.path)?;

        let mut fids: Vec<u32> = fs::read_dir(&opts.path)?
            .filter_map(|e| e.ok())
            .filter_map(|e| parse_fid(&e.path()))
            .collect();
        fids.sort_unstable();

        let mut segment_bytes = HashMap::new();
        for &fid in &fids {
            let len = fs::metadata(segment_path(&opts.path, fid))?.len();
            segment_bytes.insert(fid, len);
        }

        let active_fid = fids.last().copied().unwrap_or(INITIAL_VLOG_FID);
        let active_path = segment_path(&opts.path, active_fid);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&active_path)?;
        let offset = file.metadata()?.len();
        segment_bytes.entry(active_fid).or_insert(offset);

        let (discard_tx, discard_rx) = channel::bounded(4096);

        info!(segments = fids.len(), active_fid, "value log opened");

        Ok(Self {
            dir: opts.path,
            segment_size: opts.segment_size,
            io_mode: opts.io_mode,
            active: Mutex::new(ActiveSegment {
                fid: active_fid,
                file,
                offset,
            }),
            readers: Mutex::new(HashMap::new()),
            segment_bytes: Mutex::new(segment_bytes),
            discard_bytes: Mutex::new(HashMap::new()),
            discard_tx,
            discard_rx,
        })
    }

    /// Returns a cloneable handle to this value log's discard channel, to
    /// be handed to the indexer on construction and used directly
    /// by the flush pipeline.
    pub fn discard_sender(&self) -> Sender<(u32, u64)> {
        self.discard_tx.clone()
    }

    /// Appends `entry`, rotating to a new segment first if it would not
    /// fit within `segment_size`. Returns `(fid, offset, entry_size)`.
    pub fn write(&self, entry: &VLogEntry) -> Result<(u32, u64, u32), VLogError> {
        let payload = encoding::encode_to_vec(entry)?;
        let record_len = u32::try_from(payload.len())
            .map_err(|_| VLogError::Internal("value log entry too large".into()))?;
        let total_len = (RECORD_FRAMING_OVERHEAD + payload.len()) as u64;

        let mut guard = self
            .active
            .lock()
            .map_err(|_| VLogError::Internal("active segment lock poisoned".into()))?;

        if guard.offset > 0 && guard.offset + total_len > self.segment_size {
            self.rotate_active(&mut guard)?;
        }

        let fid = guard.fid;
        let offset = guard.offset;

        let checksum = {
            let mut hasher = Crc32::new();
            hasher.update(&record_len.to_le_bytes());
            hasher.update(&payload);
            hasher.finalize()
        };

        guard.file.write_all(&record_len.to_le_bytes())?;
        guard.file.write_all(&payload)?;
        guard.file.write_all(&checksum.to_le_bytes())?;
        guard.offset += total_len;

        let mut bytes_guard = self
            .segment_bytes
            .lock()
            .map_err(|_| VLogError::Internal("segment byte map lock poisoned".into()))?;
        *bytes_guard.entry(fid).or_insert(0) += total_len;

        trace!(fid, offset, len = total_len, "value log entry appended");
        Ok((fid, offset, total_len as u32))
    }

    fn rotate_active(&self, guard: &mut ActiveSegment) -> Result<(), VLogError> {
        guard.file.sync_all()?;
        let new_fid = guard.fid + 1;
        let new_path = segment_path(&self.dir, new_fid);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&new_path)?;
        info!(old_fid = guard.fid, new_fid, "value log segment rotated");
        guard.fid = new_fid;
        guard.file = file;
        guard.offset = 0;
        Ok(())
    }

    /// Returns a handle for reading segment `fid`. The active segment is
    /// always read through a fresh buffered `File::open` — it is still
    /// being appended to, and a memory map taken before a later append
    /// would not grow to see the new bytes. Sealed segments are opened
    /// once (as buffered file or mmap, depending on `io_mode`) and cached.
    fn segment_handle(&self, fid: u32) -> Result<Arc<SegmentHandle>, VLogError> {
        let active_guard = self
            .active
            .lock()
            .map_err(|_| VLogError::Internal("active segment lock poisoned".into()))?;
        if active_guard.fid == fid {
            let path = segment_path(&self.dir, fid);
            let f = File::open(&path)?;
            return Ok(Arc::new(SegmentHandle::File(Arc::new(f))));
        }
        drop(active_guard);

        let mut readers = self
            .readers
            .lock()
            .map_err(|_| VLogError::Internal("reader cache lock poisoned".into()))?;
        if let Some(handle) = readers.get(&fid) {
            return Ok(Arc::clone(handle));
        }
        let path = segment_path(&self.dir, fid);
        if !path.exists() {
            return Err(VLogError::SegmentNotFound(fid));
        }

        let handle = match self.io_mode {
            IoMode::Buffered => SegmentHandle::File(Arc::new(File::open(&path)?)),
            IoMode::Mmap => {
                let file = File::open(&path)?;
                if file.metadata()?.len() == 0 {
                    SegmentHandle::File(Arc::new(file))
                } else {
                    // SAFETY: sealed segments are never written to again;
                    // only the active segment (handled above) is appended.
                    let mmap = unsafe { Mmap::map(&file)? };
                    SegmentHandle::Mmap(Arc::new(mmap))
                }
            }
        };

        let handle = Arc::new(handle);
        readers.insert(fid, Arc::clone(&handle));
        Ok(handle)
    }

    /// Reads the entry at `(fid, offset)`.
    pub fn read(&self, fid: u32, offset: u64) -> Result<VLogEntry, VLogError> {
        let handle = self.segment_handle(fid)?;

        let mut len_buf = [0u8; 4];
        handle.read_exact_at(offset, &mut len_buf)?;
        let record_len = u32::from_le_bytes(len_buf) as usize;

        let mut payload = vec![0u8; record_len];
        handle.read_exact_at(offset + 4, &mut payload)?;

        let mut crc_buf = [0u8; 4];
        handle.read_exact_at(offset + 4 + record_len as u64, &mut crc_buf)?;
        let expected_crc = u32::from_le_bytes(crc_buf);

        let mut hasher = Crc32::new();
        hasher.update(&len_buf);
        hasher.update(&payload);
        if hasher.finalize() != expected_crc {
            return Err(VLogError::ChecksumMismatch { fid, offset });
        }

        let (entry, _) = encoding::decode_from_slice::<VLogEntry>(&payload)?;
        Ok(entry)
    }

    /// Iterates every valid record in segment `fid` from the start,
    /// stopping at the first corrupt or truncated record (the expected
    /// tail of a partially-written segment). Used by GC to find live
    /// entries to relocate.
    fn iter_segment(&self, fid: u32) -> Result<Vec<(u64, VLogEntry)>, VLogError> {
        let handle = self.segment_handle(fid)?;
        let segment_len = handle.len()?;

        let mut out = Vec::new();
        let mut offset = 0u64;
        loop {
            if offset + 4 > segment_len {
                break;
            }
            let mut len_buf = [0u8; 4];
            if handle.read_exact_at(offset, &mut len_buf).is_err() {
                break;
            }
            let record_len = u32::from_le_bytes(len_buf) as usize;

            if offset + 4 + record_len as u64 + 4 > segment_len {
                break;
            }
            let mut payload = vec![0u8; record_len];
            if handle.read_exact_at(offset + 4, &mut payload).is_err() {
                break;
            }
            let mut crc_buf = [0u8; 4];
            if handle
                .read_exact_at(offset + 4 + record_len as u64, &mut crc_buf)
                .is_err()
            {
                break;
            }
            let expected_crc = u32::from_le_bytes(crc_buf);
            let mut hasher = Crc32::new();
            hasher.update(&len_buf);
            hasher.update(&payload);
            if hasher.finalize() != expected_crc {
                warn!(fid, offset, "value log record failed checksum during scan; stopping");
                break;
            }

            let (entry, _) = encoding::decode_from_slice::<VLogEntry>(&payload)?;
            out.push((offset, entry));
            offset += (RECORD_FRAMING_OVERHEAD + record_len) as u64;
        }
        Ok(out)
    }

    /// Drains pending discard notices into the per-segment accumulator.
    /// Returns the number of notices drained. Non-blocking.
    pub fn drain_discards(&self) -> Result<usize, VLogError> {
        let mut guard = self
            .discard_bytes
            .lock()
            .map_err(|_| VLogError::Internal("discard map lock poisoned".into()))?;
        let mut drained = 0;
        while let Ok((fid, size)) = self.discard_rx.try_recv() {
            *guard.entry(fid).or_insert(0) += size;
            drained += 1;
        }
        Ok(drained)
    }

    /// The discard ratio for `fid`: discarded bytes over total bytes ever
    /// written to that segment. `0.0` for an unknown segment.
    pub fn discard_ratio(&self, fid: u32) -> f64 {
        let total = self
            .segment_bytes
            .lock()
            .ok()
            .and_then(|m| m.get(&fid).copied())
            .unwrap_or(0);
        if total == 0 {
            return 0.0;
        }
        let discarded = self
            .discard_bytes
            .lock()
            .ok()
            .and_then(|m| m.get(&fid).copied())
            .unwrap_or(0);
        discarded as f64 / total as f64
    }

    /// Picks the non-active segment with the highest discard ratio, if it
    /// exceeds `gc_ratio`. The active segment is never a candidate — it is
    /// still being written to.
    pub fn gc_candidate(&self, gc_ratio: f64) -> Result<Option<u32>, VLogError> {
        let active_fid = self
            .active
            .lock()
            .map_err(|_| VLogError::Internal("active segment lock poisoned".into()))?
            .fid;

        let totals = self
            .segment_bytes
            .lock()
            .map_err(|_| VLogError::Internal("segment byte map lock poisoned".into()))?;

        let mut best: Option<(u32, f64)> = None;
        for &fid in totals.keys() {
            if fid == active_fid {
                continue;
            }
            let ratio = self.discard_ratio(fid);
            if ratio > gc_ratio && best.map(|(_, b)| ratio > b).unwrap_or(true) {
                best = Some((fid, ratio));
            }
        }
        Ok(best.map(|(fid, _)| fid))
    }

    /// Relocates every entry in segment `fid` for which `is_live` returns
    /// `true` to the active segment, returning `(key, expiry, new_fid,
    /// new_offset, new_size)` for each. Does not remove the old segment —
    /// the caller must apply the relocations to the indexer first, then
    /// call [`ValueLog::remove_segment`].
    pub fn rewrite_segment(
        &self,
        fid: u32,
        mut is_live: impl FnMut(&[u8], u32, u64) -> bool,
    ) -> Result<Vec<(Vec<u8>, u64, u32, u64, u32)>, VLogError> {
        let entries = self.iter_segment(fid)?;
        let mut relocated = Vec::new();
        for (offset, entry) in entries {
            if entry.tombstone || !is_live(&entry.key, fid, offset) {
                continue;
            }
            let expiry = entry.expiry;
            let (new_fid, new_offset, new_size) = self.write(&entry)?;
            relocated.push((entry.key, expiry, new_fid, new_offset, new_size));
        }
        info!(fid, relocated = relocated.len(), "value log segment compacted");
        Ok(relocated)
    }

    /// Removes segment `fid` from disk and clears its byte-tracking
    /// entries. Only valid once its live entries have been relocated.
    pub fn remove_segment(&self, fid: u32) -> Result<(), VLogError> {
        {
            let mut readers = self
                .readers
                .lock()
                .map_err(|_| VLogError::Internal("reader cache lock poisoned".into()))?;
            readers.remove(&fid);
        }
        fs::remove_file(segment_path(&self.dir, fid))?;
        self.segment_bytes
            .lock()
            .map_err(|_| VLogError::Internal("segment byte map lock poisoned".into()))?
            .remove(&fid);
        self.discard_bytes
            .lock()
            .map_err(|_| VLogError::Internal("discard map lock poisoned".into()))?
            .remove(&fid);
        info!(fid, "value log segment removed");
        Ok(())
    }

    /// Fsyncs the active segment.
    pub fn sync(&self) -> Result<(), VLogError> {
        let guard = self
            .active
            .lock()
            .map_err(|_| VLogError::Internal("active segment lock poisoned".into()))?;
        guard.file.sync_all()?;
        Ok(())
    }

    /// Syncs the value log. Closing drops all open file handles.
    pub fn close(&self) -> Result<(), VLogError> {
        self.sync()
    }

    /// The I/O mode this value log was opened with. Governs how sealed
    /// segments are read (see [`ValueLog::segment_handle`]); the active
    /// segment is always read through a plain `File` regardless.
    pub fn io_mode(&self) -> IoMode {
        self.io_mode
    }
}
