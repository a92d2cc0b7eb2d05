use crate::dirlock::{DirLockError, DirLockSet, LOCK_FILE_NAME};
use tempfile::tempdir;

#[test]
fn acquires_and_releases_single_dir() {
    let dir = tempdir().unwrap();
    let path = dir.path().to_path_buf();

    let locks = DirLockSet::acquire(&[path.clone()]).unwrap();
    assert!(path.join(LOCK_FILE_NAME).exists());
    locks.release().unwrap();
}

#[test]
fn dedupes_repeated_paths() {
    let dir = tempdir().unwrap();
    let path = dir.path().to_path_buf();

    // cf_dir == indexer_dir == value_log_dir collapses to one lock.
    let locks = DirLockSet::acquire(&[path.clone(), path.clone(), path.clone()]).unwrap();
    locks.release().unwrap();
}

#[test]
fn second_acquisition_fails_while_first_is_held() {
    let dir = tempdir().unwrap();
    let path = dir.path().to_path_buf();

    let first = DirLockSet::acquire(&[path.clone()]).unwrap();
    let second = DirLockSet::acquire(&[path.clone()]);
    assert!(matches!(second, Err(DirLockError::AlreadyLocked(_))));

    first.release().unwrap();
    // Now that the first set released, a new acquisition succeeds.
    DirLockSet::acquire(&[path]).unwrap().release().unwrap();
}

#[test]
fn partial_failure_releases_already_acquired_locks() {
    let dir_a = tempdir().unwrap();
    let dir_b = tempdir().unwrap();

    // Pre-lock dir_b so the multi-dir acquire fails partway through.
    let held_b = DirLockSet::acquire(&[dir_b.path().to_path_buf()]).unwrap();

    let result = DirLockSet::acquire(&[dir_a.path().to_path_buf(), dir_b.path().to_path_buf()]);
    assert!(result.is_err());

    // dir_a must have been released by the rollback, so it can be
    // re-acquired immediately.
    let reacquired = DirLockSet::acquire(&[dir_a.path().to_path_buf()]);
    assert!(reacquired.is_ok());
    reacquired.unwrap().release().unwrap();

    held_b.release().unwrap();
}

#[test]
fn drop_releases_locks_without_explicit_release_call() {
    let dir = tempdir().unwrap();
    let path = dir.path().to_path_buf();

    {
        let _locks = DirLockSet::acquire(&[path.clone()]).unwrap();
    } // dropped here

    DirLockSet::acquire(&[path]).unwrap().release().unwrap();
}
