//! Write-Ahead Logging (WAL) Module
//!
//! This module implements a **durable**, **append-only**, and **generic** Write-Ahead Log (WAL)
//! suitable for embedded databases and key-value storage engines.
//! It provides **type-safe**, **CRC-protected**, and **thread-safe** persistence of arbitrary records
//! that implement the [`WalData`] trait, shared by the memtable, the indexer, and the value log.
//!
//! ## Design Overview
//!
//! The WAL ensures crash recovery and corruption detection for any serializable record type.
//! It uses [`crate::encoding`] for compact serialization and [`crc32fast`] for data integrity.
//!
//! Each record is appended sequentially to disk. Whether the append is followed by an
//! `fsync()` is controlled per-call, so higher layers can honor a `WriteOptions::sync` flag
//! instead of paying for a sync on every write.
//!
//! # On-disk layout
//!
//! ```text
//! [HEADER_BYTES][HEADER_CRC32_LE]
//! [REC_LEN_LE][REC_BYTES][REC_CRC32_LE]
//! [REC_LEN_LE][REC_BYTES][REC_CRC32_LE]
//! ...
//! ```
//!
//! - **Header** — a [`WalHeader`] structure followed by a 4-byte CRC32 checksum.
//! - **Record** — consists of:
//!   - 4-byte little-endian length prefix
//!   - serialized record bytes (custom encoding format)
//!   - 4-byte CRC32 checksum computed over `len || record_bytes`
//!
//! Files are named `<fid:08>.wal` — an 8-digit, zero-padded fid — inside whichever directory
//! the caller (memtable, indexer, or value log) manages.
//!
//! # Concurrency model
//!
//! - WAL access is **synchronized** via `Arc<Mutex<File>>`, ensuring consistent reads and writes.
//! - [`WalIter`] tracks its own logical offset, seeking before each read to avoid race conditions
//!   with concurrent appenders (or reading straight from a memory map when `io_mode` is
//!   [`IoMode::Mmap`]).
//!
//! # Guarantees
//!
//! - **Durability:** `append(record, sync: true)` is followed by an `fsync()` via [`File::sync_all`].
//! - **Integrity:** Both header and record checksums are verified during replay.
//! - **Corruption detection:** Replay stops at first failed checksum or truncated write; the
//!   caller decides whether that is fatal (aborting `open`) or the expected tail of a
//!   partially-written record.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::{
    ffi::OsStr,
    fs::{self, File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use crate::config::IoMode;
use crate::encoding::{self, EncodingError};
use crc32fast::Hasher as Crc32;
use memmap2::Mmap;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

const U32_SIZE: usize = std::mem::size_of::<u32>();

/// File extension used for all WAL segments.
pub const WAL_EXT: &str = "wal";

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors returned by WAL operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WalError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Encoding / decoding error.
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// Data integrity failure — checksum did not match.
    #[error("Checksum mismatch")]
    ChecksumMismatch,

    /// Record exceeds the configured maximum size.
    #[error("Record size exceeds limit ({0} bytes)")]
    RecordTooLarge(usize),

    /// Unexpected end-of-file during read.
    #[error("Unexpected end of file")]
    UnexpectedEof,

    /// WAL header failed integrity validation.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Internal consistency or locking error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// ------------------------------------------------------------------------------------------------
// Header / Record structures
// ------------------------------------------------------------------------------------------------

/// Metadata written at the start of the WAL file.
///
/// This section validates the WAL's identity and constraints.
/// It is followed by a CRC32 checksum to protect against corruption.
#[derive(Debug, Clone, Copy)]
pub struct WalHeader {
    /// Magic constant to identify WAL files (`b"CFWL"`).
    magic: [u8; 4],

    /// WAL format version.
    version: u32,

    /// Maximum record size (in bytes).
    max_record_size: u32,

    /// File id this WAL segment belongs to.
    fid: u32,
}

impl WalHeader {
    /// Expected 4-byte magic constant.
    pub const MAGIC: [u8; 4] = *b"CFWL";

    /// Current supported version number.
    pub const VERSION: u32 = 1;

    /// Default maximum record size (64 MiB).
    pub const DEFAULT_MAX_RECORD_SIZE: u32 = 64 * 1024 * 1024;

    /// Creates a new [`WalHeader`] instance.
    pub fn new(max_record_size: u32, fid: u32) -> Self {
        Self {
            magic: Self::MAGIC,
            version: Self::VERSION,
            max_record_size,
            fid,
        }
    }

    /// Encoded size of the header in bytes (without the trailing CRC).
    ///
    /// Layout: `magic(4) + version(4) + max_record_size(4) + fid(4)` = 16.
    pub const ENCODED_SIZE: usize = 4 + 4 + 4 + 4;

    /// Total on-disk size of the header *including* its trailing CRC32.
    pub const HEADER_DISK_SIZE: usize = Self::ENCODED_SIZE + U32_SIZE;

    /// Returns the fid this header identifies.
    pub fn fid(&self) -> u32 {
        self.fid
    }

    /// Returns the maximum record size (in bytes).
    pub fn max_record_size(&self) -> u32 {
        self.max_record_size
    }

    /// Returns the WAL format version.
    pub fn version(&self) -> u32 {
        self.version
    }
}

impl encoding::Encode for WalHeader {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        encoding::Encode::encode_to(&self.magic, buf)?;
        encoding::Encode::encode_to(&self.version, buf)?;
        encoding::Encode::encode_to(&self.max_record_size, buf)?;
        encoding::Encode::encode_to(&self.fid, buf)?;
        Ok(())
    }
}

impl encoding::Decode for WalHeader {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut offset = 0;
        let (magic, n) = <[u8; 4]>::decode_from(&buf[offset..])?;
        offset += n;
        let (version, n) = u32::decode_from(&buf[offset..])?;
        offset += n;
        let (max_record_size, n) = u32::decode_from(&buf[offset..])?;
        offset += n;
        let (fid, n) = u32::decode_from(&buf[offset..])?;
        offset += n;
        Ok((
            Self {
                magic,
                version,
                max_record_size,
                fid,
            },
            offset,
        ))
    }
}

// ------------------------------------------------------------------------------------------------
// Traits
// ------------------------------------------------------------------------------------------------

/// Trait for data types that can be written to and read from the WAL.
pub trait WalData: encoding::Encode + encoding::Decode + std::fmt::Debug + Send + Sync {}
impl<T> WalData for T where T: encoding::Encode + encoding::Decode + std::fmt::Debug + Send + Sync {}

// ------------------------------------------------------------------------------------------------
// WAL Core
// ------------------------------------------------------------------------------------------------

/// A generic, thread-safe Write-Ahead Log for durable record storage,
/// identified by a monotonically increasing `fid`.
///
/// See the [module-level documentation](self) for more details on format,
/// concurrency, and guarantees.
#[derive(Debug)]
pub struct Wal<T: WalData> {
    /// Thread-safe file handle for WAL operations.
    inner_file: Arc<Mutex<File>>,

    /// Path to the WAL file on disk.
    path: PathBuf,

    /// Persistent header with metadata and integrity info.
    header: WalHeader,

    /// I/O strategy used by [`Wal::replay_iter`].
    io_mode: IoMode,

    /// Marker field to associate this WAL with the generic record type `T`.
    _phantom: std::marker::PhantomData<T>,
}

impl<T: WalData> Wal<T> {
    /// Formats the canonical WAL filename for a given directory and fid,
    /// e.g. `<dir>/00000001.wal`.
    pub fn path_for(dir: &Path, fid: u32) -> PathBuf {
        dir.join(format!("{fid:08}.{WAL_EXT}"))
    }

    /// Parses the fid out of a WAL filename. Returns `None` if `path` does
    /// not match `<8+ digits>.wal`.
    pub fn parse_fid_from_path(path: &Path) -> Option<u32> {
        if path.extension().and_then(OsStr::to_str) != Some(WAL_EXT) {
            return None;
        }
        let stem = path.file_stem().and_then(OsStr::to_str)?;
        stem.parse::<u32>().ok()
    }

    /// Opens or creates a WAL file for `fid` inside `dir`, using
    /// [`WalHeader::DEFAULT_MAX_RECORD_SIZE`] as the per-record cap.
    pub fn open(dir: &Path, fid: u32, io_mode: IoMode) -> Result<Self, WalError> {
        Self::open_with_max_record(dir, fid, io_mode, WalHeader::DEFAULT_MAX_RECORD_SIZE)
    }

    /// Opens or creates a WAL file for `fid` inside `dir` with an explicit
    /// maximum record size.
    pub fn open_with_max_record(
        dir: &Path,
        fid: u32,
        io_mode: IoMode,
        max_record_size: u32,
    ) -> Result<Self, WalError> {
        let path_ref = Self::path_for(dir, fid);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path_ref)?;

        let header = if file.metadata()?.len() == 0 {
            let header = WalHeader::new(max_record_size, fid);

            write_header(&mut file, &header)?;
            file.sync_all()?;

            info!(path = %path_ref.display(), fid, "WAL created with new header");

            header
        } else {
            file.seek(SeekFrom::Start(0))?;

            let header = read_and_validate_header(&mut file)?;

            if header.fid != fid {
                return Err(WalError::InvalidHeader("fid mismatch".into()));
            }

            debug!(
                path = %path_ref.display(),
                max_record_size = header.max_record_size,
                fid = header.fid,
                "WAL header validated"
            );

            header
        };

        info!(path = %path_ref.display(), fid = header.fid, "WAL opened");

        Ok(Self {
            inner_file: Arc::new(Mutex::new(file)),
            path: path_ref,
            header,
            io_mode,
            _phantom: std::marker::PhantomData,
        })
    }

    /// Appends a single record to the WAL, fsyncing first if `sync` is set.
    ///
    /// The record is serialized using [`crate::encoding`] and written as:
    /// `[u32 len LE][record_bytes][u32 crc32 LE]`,
    /// where the CRC is computed over `len || record_bytes`.
    pub fn append(&self, record: &T, sync: bool) -> Result<(), WalError> {
        let record_bytes = encoding::encode_to_vec(record)?;
        let record_len = u32::try_from(record_bytes.len())
            .map_err(|_| WalError::RecordTooLarge(record_bytes.len()))?;

        if record_len > self.header.max_record_size {
            return Err(WalError::RecordTooLarge(record_len as usize));
        }

        let len_bytes = record_len.to_le_bytes();
        let checksum = compute_crc(&[&len_bytes, &record_bytes]);

        let mut guard = self
            .inner_file
            .lock()
            .map_err(|_| WalError::Internal("Mutex poisoned".into()))?;

        guard.write_all(&len_bytes)?;
        guard.write_all(&record_bytes)?;
        guard.write_all(&checksum.to_le_bytes())?;
        if sync {
            guard.sync_all()?;
        }

        trace!(
            len = record_len,
            crc = format_args!("{checksum:08x}"),
            sync,
            "WAL record appended"
        );
        Ok(())
    }

    /// Returns an iterator that replays all valid records from the WAL, in
    /// the file-or-mmap mode this WAL was opened with.
    pub fn replay_iter(&self) -> Result<WalIter<T>, WalError> {
        debug!(path = %self.path.display(), "WAL replay started");

        let start_offset = WalHeader::HEADER_DISK_SIZE as u64;

        let source = match self.io_mode {
            IoMode::Buffered => IterSource::File(Arc::clone(&self.inner_file)),
            IoMode::Mmap => {
                let guard = self
                    .inner_file
                    .lock()
                    .map_err(|_| WalError::Internal("Mutex poisoned".into()))?;
                if guard.metadata()?.len() == 0 {
                    IterSource::Mmap(None)
                } else {
                    // SAFETY: the file is only ever appended to for the
                    // lifetime of this map; concurrent truncation of a WAL
                    // under active replay is not supported.
                    let mmap = unsafe { Mmap::map(&*guard)? };
                    IterSource::Mmap(Some(Arc::new(mmap)))
                }
            }
        };

        Ok(WalIter {
            source,
            offset: start_offset,
            max_record_size: self.header.max_record_size as usize,
            _phantom: std::marker::PhantomData,
        })
    }

    /// Truncate (clear) the WAL and rewrite the header.
    ///
    /// After truncation, WAL contains only the header and its checksum.
    pub fn truncate(&self) -> Result<(), WalError> {
        let mut guard = self
            .inner_file
            .lock()
            .map_err(|_| WalError::Internal("Mutex poisoned".into()))?;

        guard.set_len(0)?;
        guard.seek(SeekFrom::Start(0))?;

        write_header(&mut *guard, &self.header)?;
        guard.sync_all()?;

        info!(path = %self.path.display(), "WAL truncated");
        Ok(())
    }

    /// Fsyncs the WAL file without closing it.
    pub fn sync(&self) -> Result<(), WalError> {
        let guard = self
            .inner_file
            .lock()
            .map_err(|_| WalError::Internal("Mutex poisoned".into()))?;
        guard.sync_all()?;
        Ok(())
    }

    /// Syncs and closes the WAL, consuming it.
    pub fn close(self) -> Result<(), WalError> {
        self.sync()
    }

    /// Syncs, closes, and removes the WAL file from disk. Used once a
    /// memtable (or indexer/value-log segment) this WAL backs has been
    /// durably superseded.
    pub fn delete(self) -> Result<(), WalError> {
        let path = self.path.clone();
        self.sync()?;
        fs::remove_file(&path)?;
        info!(path = %path.display(), "WAL deleted");
        Ok(())
    }

    /// Get the path of the underlying WAL file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the fid of this WAL segment.
    pub fn fid(&self) -> u32 {
        self.header.fid
    }

    /// Returns the configured maximum record size.
    pub fn max_record_size(&self) -> u32 {
        self.header.max_record_size
    }

    /// Returns the current on-disk file size in bytes.
    pub fn file_size(&self) -> Result<u64, WalError> {
        let guard = self
            .inner_file
            .lock()
            .map_err(|_| WalError::Internal("Mutex poisoned".into()))?;
        Ok(guard.metadata()?.len())
    }

    /// Reads and decodes a single record starting at the given byte offset,
    /// without disturbing any in-progress [`WalIter`] replay.
    ///
    /// Used by random-access readers (the value log) that stored `offset`
    /// at write time rather than replaying the whole segment. `offset` must
    /// point at the start of a record frame (`len` field), not at the
    /// header.
    pub fn read_at(&self, offset: u64) -> Result<T, WalError> {
        let mut guard = self
            .inner_file
            .lock()
            .map_err(|_| WalError::Internal("Mutex poisoned".into()))?;

        guard.seek(SeekFrom::Start(offset))?;

        let mut len_bytes = [0u8; U32_SIZE];
        guard.read_exact(&mut len_bytes)?;
        let record_len = u32::from_le_bytes(len_bytes) as usize;
        if record_len > self.header.max_record_size as usize {
            return Err(WalError::RecordTooLarge(record_len));
        }

        let mut record_bytes = vec![0u8; record_len];
        guard.read_exact(&mut record_bytes)?;

        let mut checksum_bytes = [0u8; U32_SIZE];
        guard.read_exact(&mut checksum_bytes)?;
        let stored_checksum = u32::from_le_bytes(checksum_bytes);
        drop(guard);

        verify_crc(&[&len_bytes, &record_bytes], stored_checksum)?;

        let (record, _) = encoding::decode_from_slice::<T>(&record_bytes)?;
        Ok(record)
    }
}

impl<T: WalData> Drop for Wal<T> {
    fn drop(&mut self) {
        match self.inner_file.lock() {
            Ok(guard) => {
                if let Err(e) = guard.sync_all() {
                    error!(path = %self.path.display(), error = %e, "WAL sync failed on drop");
                }
            }
            Err(poisoned) => {
                let file = poisoned.into_inner();
                if let Err(e) = file.sync_all() {
                    error!(path = %self.path.display(), error = %e, "WAL sync failed on drop (poisoned lock)");
                } else {
                    warn!(path = %self.path.display(), "WAL recovered and synced after poisoned lock");
                }
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// WalIter
// ------------------------------------------------------------------------------------------------

#[derive(Debug)]
enum IterSource {
    File(Arc<Mutex<File>>),
    Mmap(Option<Arc<Mmap>>),
}

/// Streaming WAL replay iterator.
///
/// Reads records sequentially — either by seeking through the shared file
/// handle, or by walking a memory map, depending on the `io_mode` the
/// owning [`Wal`] was opened with — verifying CRC checksums and decoding
/// each entry into `T`.
pub struct WalIter<T: WalData> {
    source: IterSource,
    offset: u64,
    max_record_size: usize,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: WalData> std::fmt::Debug for WalIter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalIter")
            .field("offset", &self.offset)
            .field("max_record_size", &self.max_record_size)
            .finish_non_exhaustive()
    }
}

impl<T: WalData> Iterator for WalIter<T> {
    type Item = Result<T, WalError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &self.source {
            IterSource::File(file) => {
                let file = file.clone();
                self.next_from_file(&file)
            }
            IterSource::Mmap(None) => None,
            IterSource::Mmap(Some(mmap)) => {
                let mmap = mmap.clone();
                self.next_from_slice(&mmap)
            }
        }
    }
}

impl<T: WalData> WalIter<T> {
    fn next_from_file(&mut self, file: &Arc<Mutex<File>>) -> Option<Result<T, WalError>> {
        let mut guard = match file.lock() {
            Ok(g) => g,
            Err(_) => return Some(Err(WalError::Internal("Mutex poisoned".into()))),
        };

        if let Err(e) = guard.seek(SeekFrom::Start(self.offset)) {
            return Some(Err(WalError::Io(e)));
        }

        let mut len_bytes = [0u8; U32_SIZE];
        match guard.read_exact(&mut len_bytes) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                trace!(offset = self.offset, "WAL replay reached end of file");
                return None;
            }
            Err(e) => return Some(Err(WalError::Io(e))),
        }

        let record_len = u32::from_le_bytes(len_bytes) as usize;
        if record_len > self.max_record_size {
            return Some(Err(WalError::RecordTooLarge(record_len)));
        }

        trace!(offset = self.offset, len = record_len, "WAL reading record");

        let mut record_bytes = vec![0u8; record_len];
        if let Err(e) = guard.read_exact(&mut record_bytes) {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                warn!(
                    offset = self.offset,
                    len = record_len,
                    "WAL truncated record (partial payload)"
                );
                return Some(Err(WalError::UnexpectedEof));
            }
            return Some(Err(WalError::Io(e)));
        }

        let mut checksum_bytes = [0u8; U32_SIZE];
        if let Err(e) = guard.read_exact(&mut checksum_bytes) {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                warn!(
                    offset = self.offset,
                    len = record_len,
                    "WAL truncated record (partial checksum)"
                );
                return Some(Err(WalError::UnexpectedEof));
            }
            return Some(Err(WalError::Io(e)));
        }
        let stored_checksum = u32::from_le_bytes(checksum_bytes);

        if let Ok(pos) = guard.stream_position() {
            self.offset = pos;
        }
        drop(guard);

        if let Err(e) = verify_crc(&[&len_bytes, &record_bytes], stored_checksum) {
            warn!(
                offset = self.offset,
                len = record_len,
                "WAL record checksum mismatch"
            );
            return Some(Err(e));
        }

        match encoding::decode_from_slice::<T>(&record_bytes) {
            Ok((record, _)) => Some(Ok(record)),
            Err(e) => Some(Err(WalError::Encoding(e))),
        }
    }

    fn next_from_slice(&mut self, mmap: &Mmap) -> Option<Result<T, WalError>> {
        let data: &[u8] = mmap;
        let start = self.offset as usize;
        if start + U32_SIZE > data.len() {
            return None;
        }

        let len_bytes = &data[start..start + U32_SIZE];
        let record_len = u32::from_le_bytes(len_bytes.try_into().ok()?) as usize;
        if record_len > self.max_record_size {
            return Some(Err(WalError::RecordTooLarge(record_len)));
        }

        let rec_start = start + U32_SIZE;
        let rec_end = rec_start + record_len;
        let crc_end = rec_end + U32_SIZE;
        if crc_end > data.len() {
            warn!(
                offset = self.offset,
                len = record_len,
                "WAL truncated record at end of map"
            );
            return Some(Err(WalError::UnexpectedEof));
        }

        let record_bytes = &data[rec_start..rec_end];
        let stored_checksum = u32::from_le_bytes(data[rec_end..crc_end].try_into().ok()?);
        self.offset = crc_end as u64;

        if let Err(e) = verify_crc(&[len_bytes, record_bytes], stored_checksum) {
            warn!(
                offset = self.offset,
                len = record_len,
                "WAL record checksum mismatch"
            );
            return Some(Err(e));
        }

        match encoding::decode_from_slice::<T>(record_bytes) {
            Ok((record, _)) => Some(Ok(record)),
            Err(e) => Some(Err(WalError::Encoding(e))),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Header I/O helpers
// ------------------------------------------------------------------------------------------------

/// Writes a [`WalHeader`] followed by its CRC32 checksum.
fn write_header<W: Write>(writer: &mut W, header: &WalHeader) -> Result<(), WalError> {
    let header_bytes = encoding::encode_to_vec(header)?;
    let checksum = compute_crc(&[&header_bytes]);

    writer.write_all(&header_bytes)?;
    writer.write_all(&checksum.to_le_bytes())?;

    Ok(())
}

/// Reads and validates a [`WalHeader`] from the current file position.
///
/// Checks CRC, magic, and version. Does **not** validate `fid` (the caller
/// must do that, since the expected fid depends on context).
fn read_and_validate_header<R: Read>(reader: &mut R) -> Result<WalHeader, WalError> {
    let mut header_bytes = vec![0u8; WalHeader::ENCODED_SIZE];
    reader.read_exact(&mut header_bytes)?;

    let mut checksum_bytes = [0u8; U32_SIZE];
    reader.read_exact(&mut checksum_bytes)?;
    let stored_checksum = u32::from_le_bytes(checksum_bytes);

    verify_crc(&[&header_bytes], stored_checksum)
        .map_err(|_| WalError::InvalidHeader("header checksum mismatch".into()))?;

    let (header, _) = encoding::decode_from_slice::<WalHeader>(&header_bytes)?;

    if header.magic != WalHeader::MAGIC {
        return Err(WalError::InvalidHeader("bad magic".into()));
    }
    if header.version != WalHeader::VERSION {
        return Err(WalError::InvalidHeader(format!(
            "unsupported version {}",
            header.version
        )));
    }

    Ok(header)
}

// ------------------------------------------------------------------------------------------------
// CRC helpers
// ------------------------------------------------------------------------------------------------

/// Computes a CRC32 checksum over one or more byte slices.
fn compute_crc(parts: &[&[u8]]) -> u32 {
    let mut hasher = Crc32::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize()
}

/// Verifies that the CRC32 over the given byte slices matches `expected`.
fn verify_crc(parts: &[&[u8]], expected: u32) -> Result<(), WalError> {
    let computed = compute_crc(parts);
    if computed != expected {
        return Err(WalError::ChecksumMismatch);
    }
    Ok(())
}
