use crate::error::{KeysetError, KeysetResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Advisory lock on a file, held until the guard is dropped.
///
/// The lock file is created if absent and never removed: deleting it while
/// another process waits on the same inode would let two holders coexist.
#[derive(Debug)]
pub struct EntryLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl EntryLock {
    /// Blocks until the lock is obtained in the requested mode.
    pub fn acquire(path: &Path, mode: LockMode) -> KeysetResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| KeysetError::io(path, e))?;
        match mode {
            LockMode::Shared => FileExt::lock_shared(&file),
            LockMode::Exclusive => FileExt::lock_exclusive(&file),
        }
        .map_err(|e| KeysetError::io(path, e))?;
        tracing::trace!("Acquired {:?} lock on {}", mode, path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
            mode,
        })
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for EntryLock {
    fn drop(&mut self) {
        // closing the descriptor releases the lock anyway
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to unlock {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn lock_file_is_created_and_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entry.lock");
        {
            let guard = EntryLock::acquire(&path, LockMode::Exclusive).unwrap();
            assert_eq!(guard.mode(), LockMode::Exclusive);
        }
        assert!(path.exists());
    }

    #[test]
    fn shared_locks_coexist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entry.lock");
        let _a = EntryLock::acquire(&path, LockMode::Shared).unwrap();
        let _b = EntryLock::acquire(&path, LockMode::Shared).unwrap();
        let file = File::open(&path).unwrap();
        assert!(FileExt::try_lock_exclusive(&file).is_err());
    }

    #[test]
    fn exclusive_lock_waits_for_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entry.lock");
        let guard = EntryLock::acquire(&path, LockMode::Exclusive).unwrap();

        let (tx, rx) = mpsc::channel();
        let thread_path = path.clone();
        let handle = std::thread::spawn(move || {
            let _guard = EntryLock::acquire(&thread_path, LockMode::Shared).unwrap();
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        drop(guard);
        rx.recv_timeout(Duration::from_secs(10)).unwrap();
        handle.join().unwrap();
    }
}
