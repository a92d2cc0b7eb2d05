//! Directory locking: exclusive, advisory, cross-process mutual exclusion
//! over the directories a column family touches.
//!
//! A column family may span up to three directories (`cf_dir`, `indexer_dir`,
//! `value_log_dir`), which can coincide or differ depending on
//! [`crate::config::ColumnFamilyOptions`]. `open` computes the distinct set
//! among them and locks each, in a deterministic (sorted) order, so that two
//! overlapping `DirLockSet`s always attempt acquisition in the same order and
//! never deadlock against each other.
//!
//! Uses `fs2::FileExt::try_lock_exclusive` on a sentinel lock file
//! opened/created inside each directory being protected.

#[cfg(test)]
mod tests;

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::{info, warn};

/// Name of the sentinel file created inside each locked directory.
pub const LOCK_FILE_NAME: &str = "FLOCK";

/// Errors returned by [`DirLockSet::acquire`] / [`DirLockSet::release`].
#[derive(Debug, Error)]
pub enum DirLockError {
    /// Another process (or another `DirLockSet` in this process) already
    /// holds the exclusive lock for `path`.
    #[error("another process holds the directory lock for {0}")]
    AlreadyLocked(PathBuf),

    /// Underlying filesystem failure while creating the directory or the
    /// sentinel lock file.
    #[error("I/O error locking {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A single directory's exclusive lock, held for the lifetime of this value.
struct HeldLock {
    path: PathBuf,
    file: File,
}

/// The set of exclusive directory locks a column family holds while open.
///
/// Dropping (or explicitly [`release`](DirLockSet::release)-ing) releases
/// every lock it holds, in the reverse of acquisition order.
pub struct DirLockSet {
    locks: Vec<HeldLock>,
}

impl DirLockSet {
    /// Acquires exclusive locks over the distinct paths among `dirs`, in
    /// deterministic (sorted) order.
    ///
    /// On failure to lock any directory, every lock acquired so far is
    /// released (in reverse order) before returning
    /// [`DirLockError::AlreadyLocked`] or [`DirLockError::Io`].
    pub fn acquire(dirs: &[PathBuf]) -> Result<Self, DirLockError> {
        let distinct: BTreeSet<PathBuf> = dirs.iter().cloned().collect();

        let mut locks = Vec::with_capacity(distinct.len());
        for dir in distinct {
            match Self::lock_one(&dir) {
                Ok(held) => locks.push(held),
                Err(e) => {
                    warn!(?dir, "failed to acquire directory lock; releasing partial set");
                    Self::release_all(&mut locks);
                    return Err(e);
                }
            }
        }

        info!(count = locks.len(), "directory locks acquired");
        Ok(Self { locks })
    }

    fn lock_one(dir: &Path) -> Result<HeldLock, DirLockError> {
        fs::create_dir_all(dir).map_err(|source| DirLockError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let lock_path = dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)
            .map_err(|source| DirLockError::Io {
                path: lock_path.clone(),
                source,
            })?;

        file.try_lock_exclusive()
            .map_err(|_| DirLockError::AlreadyLocked(dir.to_path_buf()))?;

        Ok(HeldLock {
            path: dir.to_path_buf(),
            file,
        })
    }

    /// Releases every held lock, in reverse acquisition order. Collects
    /// (rather than short-circuits on) release failures, returning the
    /// last one encountered — matching the column family's best-effort
    /// `close` semantics.
    pub fn release(mut self) -> Result<(), DirLockError> {
        match Self::release_all(&mut self.locks) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn release_all(locks: &mut Vec<HeldLock>) -> Option<DirLockError> {
        let mut last_err = None;
        while let Some(held) = locks.pop() {
            if let Err(source) = FileExt::unlock(&held.file) {
                warn!(path = ?held.path, %source, "failed to release directory lock");
                last_err = Some(DirLockError::Io {
                    path: held.path,
                    source,
                });
            }
        }
        last_err
    }
}

impl Drop for DirLockSet {
    fn drop(&mut self) {
        Self::release_all(&mut self.locks);
    }
}
