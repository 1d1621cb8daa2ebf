use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fs2::FileExt;
use log::{debug, warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OperationLockError {
    #[error("another operation is already in progress")]
    InProgress,
    #[error("another process is modifying the app")]
    HeldElsewhere,
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl OperationLockError {
    fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

fn is_contended(error: &std::io::Error) -> bool {
    error.kind() == std::io::ErrorKind::WouldBlock
        || error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Serialises device-mutating operations, within this process and across
/// processes sharing the same data directory.
#[derive(Debug, Clone)]
pub struct OperationLock {
    lock_path: PathBuf,
    busy: Arc<AtomicBool>,
}

impl OperationLock {
    #[must_use]
    pub fn new(lock_path: PathBuf) -> Self {
        Self {
            lock_path,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// # Errors
    /// Returns `InProgress` or `HeldElsewhere` when the lock is taken, and
    /// `Io` when the lock file cannot be opened or written.
    pub fn try_acquire(&self, operation: &str) -> Result<OperationGuard, OperationLockError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Rejected {operation}: another operation is running");
            return Err(OperationLockError::InProgress);
        }

        match self.lock_file() {
            Ok(file) => {
                debug!("Started {operation}");
                Ok(OperationGuard {
                    busy: Arc::clone(&self.busy),
                    file,
                })
            }
            Err(error) => {
                self.busy.store(false, Ordering::Release);
                Err(error)
            }
        }
    }

    fn lock_file(&self) -> Result<File, OperationLockError> {
        if let Some(parent) = self.lock_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|error| OperationLockError::io("failed to create lock directory", error))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|error| OperationLockError::io("failed to open operation lock file", error))?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(error) if is_contended(&error) => return Err(OperationLockError::HeldElsewhere),
            Err(error) => {
                return Err(OperationLockError::io("failed to acquire operation lock", error));
            }
        }

        file.set_len(0)
            .and_then(|()| file.seek(SeekFrom::Start(0)).map(|_| ()))
            .and_then(|()| writeln!(file, "{}", std::process::id()))
            .map_err(|error| {
                OperationLockError::io("failed to write operation lock metadata", error)
            })?;

        Ok(file)
    }
}

/// Held for the duration of one operation; dropping it releases the lock.
#[derive(Debug)]
pub struct OperationGuard {
    busy: Arc<AtomicBool>,
    file: File,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        if let Err(error) = FileExt::unlock(&self.file) {
            warn!("Failed to release operation lock: {error}");
        }
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::{OperationLock, OperationLockError};

    #[test]
    fn second_acquire_in_process_is_rejected_until_release() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let lock = OperationLock::new(temp_dir.path().join("data").join("operation.lock"));

        let guard = lock.try_acquire("downgrade").expect("first acquire succeeds");
        assert!(lock.is_busy());
        assert!(matches!(
            lock.clone().try_acquire("patch"),
            Err(OperationLockError::InProgress)
        ));

        drop(guard);
        assert!(!lock.is_busy());
        lock.try_acquire("patch").expect("lock is free again");
    }

    #[test]
    fn lock_file_held_by_another_owner_is_rejected() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let lock_path = temp_dir.path().join("operation.lock");
        let first = OperationLock::new(lock_path.clone());
        let second = OperationLock::new(lock_path.clone());

        let _guard = first.try_acquire("downgrade").expect("first acquire succeeds");
        assert!(matches!(
            second.try_acquire("downgrade"),
            Err(OperationLockError::HeldElsewhere)
        ));
        assert!(!second.is_busy());

        let contents = std::fs::read_to_string(&lock_path).expect("lock file is readable");
        assert_eq!(contents.trim(), std::process::id().to_string());
    }
}
