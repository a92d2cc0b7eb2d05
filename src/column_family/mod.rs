//! # Column Family
//!
//! The engine's core: an independent keyspace with its own memtables, WAL,
//! indexer, and value log. This module owns the concurrency
//! protocol and lifecycle that make the collaborators in
//! [`crate::memtable`], [`crate::indexer`], and [`crate::vlog`] safe to use
//! from many client threads plus one background flush worker and one
//! background value-log GC worker.
//!
//! ## Layering
//!
//! ```text
//! client put/delete ──► active memtable + WAL ──(rotation)──► frozen queue ──► flusher ──► indexer + value log
//! client get         ◄── active, then frozen (newest-first) ──────────────────────────◄── indexer ◄── value log
//! ```
//!
//! Generalizes a single `Arc<RwLock<EngineInner>>` critical section into a
//! dual-lock protocol: `mu` (here, `ColumnFamily::state`) guards the
//! memtable pointers, while a separate `flush_lock` excludes the flush
//! pipeline from the value log's GC loop without forcing flush's
//! I/O-heavy work to hold `mu`.

#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, error, info, warn};

use crate::config::{ColumnFamilyOptions, IoMode, WriteOptions};
use crate::dirlock::DirLockSet;
use crate::error::{CfError, Result};
use crate::indexer::{IndexEntry, Indexer};
use crate::memtable::{FrozenMemtable, Memtable, MemtableLookup};
use crate::vlog::{VLogEntry, VLogOptions, ValueLog};

/// Implementation-defined seed fid used when a column family directory is
/// empty at open (`InitialLogFileId`).
const INITIAL_LOG_FILE_ID: u32 = 1;

/// Snapshot of byte usage returned by [`ColumnFamily::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// Sum of the approximate byte sizes of the active and every frozen
    /// memtable.
    pub memtable_size: i64,
    /// Number of immutable memtables currently queued for flush.
    pub frozen_count: usize,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn is_expired(expiry: u64) -> bool {
    expiry != 0 && expiry <= now_secs()
}

fn io_mode_for(mmap: bool) -> IoMode {
    if mmap { IoMode::Mmap } else { IoMode::Buffered }
}

/// Memtable pointers guarded by [`ColumnFamily`]'s `mu` lock: exactly one
/// active memtable plus the frozen queue.
struct MemtableState {
    /// `None` only transiently, during [`ColumnFamily::close`], so the
    /// active memtable can be consumed by value to close its WAL.
    active: Option<Memtable>,
    /// Oldest at the front, newest at the back. Capacity is
    /// `memtable_nums - 1`.
    frozen: VecDeque<FrozenMemtable>,
}

impl MemtableState {
    fn active(&self) -> &Memtable {
        self.active
            .as_ref()
            .expect("active memtable missing while column family open")
    }
}

/// A one-shot, waiter-waking close signal: an atomic boolean guarded by a
/// single-use latch. Used to interrupt the GC worker's sleep and the
/// write path's admission wait without polling.
#[derive(Default)]
struct CloseSignal {
    mutex: Mutex<bool>,
    cv: Condvar,
}

impl CloseSignal {
    fn fire(&self) {
        let mut fired = self.mutex.lock().unwrap_or_else(|e| e.into_inner());
        *fired = true;
        self.cv.notify_all();
    }

    /// Sleeps up to `timeout`, waking early once [`fire`](Self::fire) is
    /// called. Returns `true` if the signal fired.
    fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.mutex.lock().unwrap_or_else(|e| e.into_inner());
        let (guard, _) = self
            .cv
            .wait_timeout_while(guard, timeout, |fired| !*fired)
            .unwrap_or_else(|e| e.into_inner());
        *guard
    }
}

/// A column family: an independent keyspace within the engine.
///
/// Construct with [`ColumnFamily::open`]. All public operations return
/// [`CfError::Closed`] once [`ColumnFamily::close`] has run.
pub struct ColumnFamily {
    opts: ColumnFamilyOptions,
    cf_dir: PathBuf,

    /// `mu`: guards the memtable pointers.
    state: RwLock<MemtableState>,
    /// Wakes writers blocked waiting for a frozen-queue slot, notified
    /// whenever the flusher dequeues one.
    space_cv: Condvar,
    space_mutex: Mutex<()>,

    indexer: Indexer,
    vlog: ValueLog,
    /// `flush_lock`: excludes the flush pipeline from value-log GC
    /// ("dual locks", below).
    flush_lock: RwLock<()>,

    /// Rotation-triggered handoff to the flush worker: carries the fid of
    /// a newly-frozen memtable. Capacity `memtable_nums - 1`.
    flush_tx: Mutex<Option<Sender<u32>>>,
    flush_handle: Mutex<Option<JoinHandle<()>>>,
    gc_handle: Mutex<Option<JoinHandle<()>>>,

    shutdown: Arc<CloseSignal>,
    closed: AtomicBool,

    /// Released on close, in reverse acquisition order.
    dirlock: Mutex<Option<DirLockSet>>,
}

impl ColumnFamily {
    /// Opens a column family, recovering any existing memtables, indexer,
    /// and value log, and starting the background flush and GC workers.
    ///
    /// Any failure during open unwinds previously acquired resources
    /// (directory locks, recovered memtables) before returning.
    pub fn open(opts: ColumnFamilyOptions) -> Result<Arc<Self>> {
        opts.validate()?;

        let cf_dir = opts.resolved_cf_dir();
        let indexer_dir = opts.resolved_indexer_dir();
        let vlog_dir = opts.resolved_vlog_dir();

        std::fs::create_dir_all(&cf_dir).map_err(CfError::IoFailure)?;

        let lock_dirs = [cf_dir.clone(), indexer_dir.clone(), vlog_dir.clone()];
        let dirlock = DirLockSet::acquire(&lock_dirs).map_err(|e| {
            warn!(%e, "directory lock acquisition failed");
            CfError::AnotherProcessHoldsDir(format!("{e}"))
        })?;

        let (active, frozen) = match Self::open_memtables(&cf_dir, io_mode_for(opts.wal_mmap)) {
            Ok(pair) => pair,
            Err(e) => {
                let _ = dirlock.release();
                return Err(e);
            }
        };

        let vlog_opts = VLogOptions {
            path: vlog_dir,
            segment_size: opts.value_log_file_size,
            io_mode: io_mode_for(opts.value_log_mmap),
            gc_ratio: opts.value_log_gc_ratio,
            gc_interval: opts.value_log_gc_interval,
        };
        let vlog = match ValueLog::open(vlog_opts) {
            Ok(v) => v,
            Err(e) => {
                let _ = dirlock.release();
                return Err(CfError::VLog(e));
            }
        };

        let indexer = match Indexer::open(&indexer_dir, vlog.discard_sender()) {
            Ok(i) => i,
            Err(e) => {
                let _ = vlog.close();
                let _ = dirlock.release();
                return Err(CfError::Indexer(e));
            }
        };

        let frozen_capacity = opts.memtable_nums - 1;
        let (flush_tx, flush_rx) = channel::bounded::<u32>(frozen_capacity.max(1));

        let recovered_frozen_fids: Vec<u32> = frozen.iter().map(|m| m.fid()).collect();

        let cf = Arc::new(Self {
            opts,
            cf_dir,
            state: RwLock::new(MemtableState { active: Some(active), frozen }),
            space_cv: Condvar::new(),
            space_mutex: Mutex::new(()),
            indexer,
            vlog,
            flush_lock: RwLock::new(()),
            flush_tx: Mutex::new(Some(flush_tx)),
            flush_handle: Mutex::new(None),
            gc_handle: Mutex::new(None),
            shutdown: Arc::new(CloseSignal::default()),
            closed: AtomicBool::new(false),
            dirlock: Mutex::new(Some(dirlock)),
        });

        let flush_worker_cf = Arc::clone(&cf);
        let flush_handle = thread::Builder::new()
            .name("cf-flush".into())
            .spawn(move || flush_worker_cf.flush_worker_loop(flush_rx))
            .map_err(CfError::IoFailure)?;
        *cf.flush_handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(flush_handle);

        let gc_worker_cf = Arc::clone(&cf);
        let gc_handle = thread::Builder::new()
            .name("cf-vlog-gc".into())
            .spawn(move || gc_worker_cf.gc_worker_loop())
            .map_err(CfError::IoFailure)?;
        *cf.gc_handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(gc_handle);

        // Memtables recovered already-frozen (crash, or a clean close that
        // only closed their WALs without flushing) were never drained by
        // any prior flush worker. Schedule them now so they don't occupy
        // frozen-queue slots indefinitely.
        if !recovered_frozen_fids.is_empty() {
            let tx_guard = cf.flush_tx.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(tx) = tx_guard.as_ref() {
                for fid in recovered_frozen_fids {
                    if tx.send(fid).is_err() {
                        warn!(fid, "flush channel disconnected while scheduling recovered memtable");
                    }
                }
            }
        }

        info!(cf_name = %cf.opts.cf_name, "column family opened");
        Ok(cf)
    }

    /// Implements `open_memtables`: enumerate WAL files, parse
    /// fids, seed with [`INITIAL_LOG_FILE_ID`] if none exist, and replay
    /// each into a memtable. The highest fid becomes active.
    fn open_memtables(dir: &Path, io_mode: IoMode) -> Result<(Memtable, VecDeque<FrozenMemtable>)> {
        let mut fids = Vec::new();
        if dir.exists() {
            for entry in std::fs::read_dir(dir).map_err(CfError::IoFailure)? {
                let entry = entry.map_err(CfError::IoFailure)?;
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                match crate::wal::Wal::<crate::memtable::MemtableRecord>::parse_fid_from_path(&path) {
                    // Fid 0 is reserved for the indexer's own WAL (see
                    // `indexer::INDEXER_WAL_FID`), which lives alongside the
                    // memtable WALs whenever `indexer_dir` defaults to the
                    // cf directory. Memtable fids always start at
                    // `INITIAL_LOG_FILE_ID` (1), so skip it here.
                    Some(0) => {}
                    Some(fid) => fids.push(fid),
                    None => {
                        if path.extension().and_then(|e| e.to_str()) == Some("wal") {
                            return Err(CfError::Internal(format!(
                                "unparseable WAL filename: {}",
                                path.display()
                            )));
                        }
                    }
                }
            }
        }
        fids.sort_unstable();

        if fids.is_empty() {
            let active = Memtable::open(dir, INITIAL_LOG_FILE_ID, io_mode)?;
            return Ok((active, VecDeque::new()));
        }

        let active_fid = *fids.last().expect("fids non-empty");
        let mut frozen = VecDeque::with_capacity(fids.len() - 1);
        for &fid in &fids[..fids.len() - 1] {
            frozen.push_back(FrozenMemtable::new(Memtable::open(dir, fid, io_mode)?));
        }
        let active = Memtable::open(dir, active_fid, io_mode)?;

        info!(
            active_fid,
            frozen = frozen.len(),
            "memtables recovered"
        );
        Ok((active, frozen))
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CfError::Closed);
        }
        Ok(())
    }

    fn frozen_capacity(&self) -> usize {
        self.opts.memtable_nums - 1
    }

    /// Inserts `key`/`value`. `delete` is a put with the
    /// tombstone flag.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>, opts: WriteOptions) -> Result<()> {
        self.put_inner(key, value, false, opts)
    }

    /// Deletes `key` by inserting a tombstone record.
    pub fn delete(&self, key: Vec<u8>, opts: WriteOptions) -> Result<()> {
        self.put_inner(key, Vec::new(), true, opts)
    }

    fn put_inner(&self, key: Vec<u8>, value: Vec<u8>, tombstone: bool, opts: WriteOptions) -> Result<()> {
        self.check_closed()?;
        if key.is_empty() {
            return Err(CfError::EmptyKey);
        }

        let size = key.len() + value.len();
        if size as u64 > self.opts.memtable_size {
            return Err(CfError::ValueTooBig {
                size,
                limit: self.opts.memtable_size as usize,
            });
        }

        self.wait_for_space(size as u64)?;

        let guard = self
            .state
            .write()
            .map_err(|_| CfError::Internal("column family state lock poisoned".into()))?;
        guard.active().put(key, value, tombstone, &opts)?;
        Ok(())
    }

    /// Admission control: waits for the active memtable to
    /// have room for `size` bytes, rotating when necessary, and blocking
    /// on the frozen queue when it is full, bounded by
    /// `mem_space_wait_timeout`.
    fn wait_for_space(&self, size: u64) -> Result<()> {
        let deadline = Instant::now() + self.opts.mem_space_wait_timeout;

        loop {
            self.check_closed()?;

            let needs_rotation = {
                let guard = self
                    .state
                    .read()
                    .map_err(|_| CfError::Internal("column family state lock poisoned".into()))?;
                let current = guard.active().size()?;
                if current + size <= self.opts.memtable_size {
                    return Ok(());
                }
                guard.frozen.len() < self.frozen_capacity()
            };

            if needs_rotation {
                self.rotate()?;
                continue;
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(CfError::WaitMemSpaceTimeout);
            }
            let remaining = deadline - now;

            let guard = self
                .space_mutex
                .lock()
                .map_err(|_| CfError::Internal("space wait lock poisoned".into()))?;
            let _ = self
                .space_cv
                .wait_timeout(guard, remaining)
                .map_err(|_| CfError::Internal("space wait lock poisoned".into()))?;
        }
    }

    /// Demotes the active memtable to immutable and installs a fresh one
    /// ("memtable visibility during rotation"):
    /// construct the new active memtable, publish the swap and the
    /// frozen-queue append within one `mu`-write-locked critical section,
    /// then — outside the lock — notify the flush worker.
    fn rotate(&self) -> Result<()> {
        let fid_to_flush = {
            let mut guard = self
                .state
                .write()
                .map_err(|_| CfError::Internal("column family state lock poisoned".into()))?;

            // Another thread may have rotated already while we waited for
            // the write lock; only proceed if there is still room.
            if guard.frozen.len() >= self.frozen_capacity() {
                return Ok(());
            }

            let new_fid = guard.active().fid() + 1;
            let new_active = Memtable::open(&self.cf_dir, new_fid, io_mode_for(self.opts.wal_mmap))?;
            let old_active = guard.active.replace(new_active).expect("active memtable missing while column family open");
            let old_fid = old_active.fid();
            guard.frozen.push_back(FrozenMemtable::new(old_active));
            info!(old_fid, new_fid, frozen = guard.frozen.len(), "memtable rotated");
            old_fid
        };

        let tx_guard = self
            .flush_tx
            .lock()
            .map_err(|_| CfError::Internal("flush channel lock poisoned".into()))?;
        if let Some(tx) = tx_guard.as_ref() {
            if tx.send(fid_to_flush).is_err() {
                warn!(fid_to_flush, "flush channel disconnected; worker not running");
            }
        }
        Ok(())
    }

    /// Reads `key`, fusing the memtable layers, the indexer, and the value
    /// log. Holds only `mu`'s shared lock, released once the
    /// lookup completes.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_closed()?;
        if key.is_empty() {
            return Err(CfError::EmptyKey);
        }

        let guard = self
            .state
            .read()
            .map_err(|_| CfError::Internal("column family state lock poisoned".into()))?;

        match guard.active().get(key)? {
            MemtableLookup::Value { value, expiry } => {
                return Ok(if is_expired(expiry) { None } else { Some(value) });
            }
            MemtableLookup::Tombstone => return Ok(None),
            MemtableLookup::Absent => {}
        }

        // Newest-to-oldest: frozen memtables are pushed oldest-first, so
        // the newest is at the back.
        for frozen in guard.frozen.iter().rev() {
            match frozen.get(key)? {
                MemtableLookup::Value { value, expiry } => {
                    return Ok(if is_expired(expiry) { None } else { Some(value) });
                }
                MemtableLookup::Tombstone => return Ok(None),
                MemtableLookup::Absent => {}
            }
        }

        let entry = match self.indexer.get(key)? {
            Some(entry) => entry,
            None => return Ok(None),
        };

        if !entry.value.is_empty() {
            return Ok(if is_expired(entry.expiry) { None } else { Some(entry.value) });
        }

        let vlog_entry = self.vlog.read(entry.fid, entry.offset)?;
        if is_expired(entry.expiry) {
            return Ok(None);
        }
        Ok(Some(vlog_entry.value))
    }

    /// Returns the sum of byte sizes across the active and every frozen
    /// memtable, plus the number of memtables queued for flush.
    pub fn stat(&self) -> Result<Stat> {
        self.check_closed()?;
        let guard = self
            .state
            .read()
            .map_err(|_| CfError::Internal("column family state lock poisoned".into()))?;

        let mut total = guard.active().size()? as i64;
        for frozen in &guard.frozen {
            total += frozen.size()? as i64;
        }
        Ok(Stat {
            memtable_size: total,
            frozen_count: guard.frozen.len(),
        })
    }

    /// Fsyncs the active WAL, then the indexer, then the value log.
    /// Best-effort: the first error is returned, but every step still
    /// runs.
    pub fn sync(&self) -> Result<()> {
        self.check_closed()?;
        self.sync_inner()
    }

    fn sync_inner(&self) -> Result<()> {
        let mut first_err: Option<CfError> = None;

        {
            let guard = self.state.read();
            match guard {
                Ok(guard) => {
                    if let Err(e) = guard.active().sync_wal() {
                        first_err.get_or_insert(CfError::Memtable(e));
                    }
                }
                Err(_) => {
                    first_err.get_or_insert(CfError::Internal("column family state lock poisoned".into()));
                }
            }
        }
        if let Err(e) = self.indexer.sync() {
            first_err.get_or_insert(CfError::Indexer(e));
        }
        if let Err(e) = self.vlog.sync() {
            first_err.get_or_insert(CfError::VLog(e));
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Closes the column family: idempotent, best-effort, and
    /// accumulates the last error encountered rather than short-circuiting
    /// so every resource is attempted.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut last_err: Option<CfError> = None;

        // Stop admitting new rotations and wake anyone waiting for space.
        self.shutdown.fire();
        {
            let _g = self.space_mutex.lock().unwrap_or_else(|e| e.into_inner());
        }
        self.space_cv.notify_all();

        // Dropping the sender lets the flush worker finish its in-flight
        // memtable, drain the channel, then exit.
        let _ = self
            .flush_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        if let Err(e) = self.sync_inner() {
            last_err = Some(e);
        }

        if let Some(handle) = self.flush_handle.lock().unwrap_or_else(|e| e.into_inner()).take() {
            if handle.join().is_err() {
                last_err = Some(CfError::Internal("flush worker thread panicked".into()));
            }
        }
        if let Some(handle) = self.gc_handle.lock().unwrap_or_else(|e| e.into_inner()).take() {
            if handle.join().is_err() {
                last_err = Some(CfError::Internal("GC worker thread panicked".into()));
            }
        }

        match self.state.write() {
            Ok(mut guard) => {
                while let Some(frozen) = guard.frozen.pop_front() {
                    if let Err(e) = frozen.close_wal() {
                        last_err = Some(CfError::Memtable(e));
                    }
                }
                if let Some(active) = guard.active.take() {
                    if let Err(e) = active.close_wal() {
                        last_err = Some(CfError::Memtable(e));
                    }
                }
            }
            Err(_) => {
                last_err = Some(CfError::Internal("column family state lock poisoned".into()));
            }
        }

        if let Err(e) = self.indexer.close() {
            last_err = Some(CfError::Indexer(e));
        }
        if let Err(e) = self.vlog.close() {
            last_err = Some(CfError::VLog(e));
        }

        if let Some(dirlock) = self.dirlock.lock().unwrap_or_else(|e| e.into_inner()).take() {
            if let Err(e) = dirlock.release() {
                warn!(%e, "failed to release directory locks");
                last_err = Some(CfError::Internal(format!("directory unlock failed: {e}")));
            }
        }

        info!(cf_name = %self.opts.cf_name, "column family closed");
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn flush_worker_loop(&self, flush_rx: Receiver<u32>) {
        while let Ok(fid) = flush_rx.recv() {
            if let Err(e) = self.flush_one(fid) {
                error!(fid, %e, "flush failed; memtable retained for retry on restart");
            }
        }
        debug!("flush worker exiting");
    }

    /// Drains one frozen memtable into the indexer and value log. Holds
    /// `flush_lock` exclusively for the duration of the I/O, excluding the
    /// value-log GC worker, but never holds `mu` while doing disk I/O.
    fn flush_one(&self, fid: u32) -> Result<()> {
        let _flush_guard = self
            .flush_lock
            .write()
            .map_err(|_| CfError::Internal("flush lock poisoned".into()))?;

        let records = {
            let guard = self
                .state
                .read()
                .map_err(|_| CfError::Internal("column family state lock poisoned".into()))?;
            let frozen = guard
                .frozen
                .iter()
                .find(|m| m.fid() == fid)
                .ok_or_else(|| CfError::Internal(format!("flush: fid {fid} missing from frozen queue")))?;
            frozen.iter_sorted()?
        };

        let mut batch: Vec<(Vec<u8>, IndexEntry)> = Vec::with_capacity(self.opts.flush_batch_size);
        for record in records {
            if record.tombstone {
                if !batch.is_empty() {
                    self.indexer.put_batch(std::mem::take(&mut batch))?;
                }
                self.indexer.delete(&record.key)?;
                continue;
            }

            let entry = if record.value.len() <= self.opts.value_threshold {
                IndexEntry {
                    value: record.value,
                    fid: 0,
                    offset: 0,
                    entry_size: 0,
                    expiry: record.expiry,
                }
            } else {
                let vlog_entry = VLogEntry {
                    key: record.key.clone(),
                    value: record.value,
                    expiry: record.expiry,
                    tombstone: false,
                };
                let (vfid, voffset, vsize) = self.vlog.write(&vlog_entry)?;
                IndexEntry {
                    value: Vec::new(),
                    fid: vfid,
                    offset: voffset,
                    entry_size: vsize,
                    expiry: record.expiry,
                }
            };
            batch.push((record.key, entry));

            if batch.len() >= self.opts.flush_batch_size {
                self.indexer.put_batch(std::mem::take(&mut batch))?;
            }
        }
        if !batch.is_empty() {
            self.indexer.put_batch(batch)?;
        }

        // The memtable's WAL is the only durable copy of its contents
        // until the indexer and value log are themselves fsynced — delete
        // it only once both are durable, or a crash between the WAL
        // removal and an OS-buffered write landing on disk loses data
        // that a `sync=true` put had already promised was persisted.
        self.indexer.sync()?;
        self.vlog.sync()?;

        drop(_flush_guard);

        let removed = {
            let mut guard = self
                .state
                .write()
                .map_err(|_| CfError::Internal("column family state lock poisoned".into()))?;
            let idx = guard.frozen.iter().position(|m| m.fid() == fid);
            idx.and_then(|i| guard.frozen.remove(i))
        };

        {
            let _g = self.space_mutex.lock().unwrap_or_else(|e| e.into_inner());
        }
        self.space_cv.notify_all();

        if let Some(frozen) = removed {
            frozen.delete_wal()?;
        }
        info!(fid, "memtable flushed");
        Ok(())
    }

    fn gc_worker_loop(&self) {
        loop {
            if self.shutdown.wait_timeout(self.opts.value_log_gc_interval) {
                break;
            }
            if let Err(e) = self.gc_tick() {
                warn!(%e, "value log GC tick failed");
            }
        }
        debug!("value log GC worker exiting");
    }

    /// One iteration of the value-log GC loop: drain
    /// discard notices, pick the worst-offending segment if it clears
    /// `value_log_gc_ratio`, relocate its still-live entries, repoint the
    /// indexer at their new locations, then drop the old segment.
    ///
    /// Takes `flush_lock` only in shared mode, so GC and the flush
    /// pipeline never rewrite the same fid's index entries concurrently,
    /// while ordinary reads and writes are unaffected.
    fn gc_tick(&self) -> Result<()> {
        self.vlog.drain_discards()?;

        let candidate = self.vlog.gc_candidate(self.opts.value_log_gc_ratio)?;
        let Some(fid) = candidate else {
            return Ok(());
        };

        let _flush_guard = self
            .flush_lock
            .read()
            .map_err(|_| CfError::Internal("flush lock poisoned".into()))?;

        let indexer = &self.indexer;
        let relocations = self.vlog.rewrite_segment(fid, |key, old_fid, old_offset| {
            matches!(indexer.get(key), Ok(Some(entry)) if entry.fid == old_fid && entry.offset == old_offset)
        })?;

        if !relocations.is_empty() {
            let batch = relocations
                .into_iter()
                .map(|(key, expiry, new_fid, new_offset, new_size)| {
                    (
                        key,
                        IndexEntry {
                            value: Vec::new(),
                            fid: new_fid,
                            offset: new_offset,
                            entry_size: new_size,
                            expiry,
                        },
                    )
                })
                .collect();
            self.indexer.put_batch(batch)?;
        }

        drop(_flush_guard);
        self.vlog.remove_segment(fid)?;
        info!(fid, "value log segment reclaimed by GC");
        Ok(())
    }
}
