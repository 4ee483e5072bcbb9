// src/state/lock.rs

//! Exclusive lock over a state directory
//!
//! Writers (applying a transaction and saving the new state) hold this lock
//! for the whole apply. Resolving never takes it: a resolve only reads.
//!
//! ```ignore
//! use rpmgoal::state::lock::StateLock;
//!
//! let lock = StateLock::try_acquire(StateLock::path_in("/var/lib/rpmgoal"))?;
//! // ... apply and save ...
//! // released on drop
//! ```

use crate::Result;
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Exclusive `flock` held on `<state_dir>/state.lock`
pub struct StateLock {
    file: File,
    path: PathBuf,
}

impl StateLock {
    pub const FILE_NAME: &'static str = "state.lock";

    /// Lock file path inside a state directory
    pub fn path_in<P: AsRef<Path>>(state_dir: P) -> PathBuf {
        state_dir.as_ref().join(Self::FILE_NAME)
    }

    /// Acquire the lock, blocking until it is free
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_lock_file(&path)?;

        file.lock_exclusive().map_err(|e| {
            crate::Error::IoError(format!("Failed to acquire state lock {:?}: {}", path, e))
        })?;

        log::info!("Acquired state lock at {:?}", path);
        Ok(Self { file, path })
    }

    /// Acquire the lock without blocking
    ///
    /// `Ok(None)` when another process holds it.
    pub fn try_acquire<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref().to_path_buf();
        let file = open_lock_file(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                log::info!("Acquired state lock at {:?}", path);
                Ok(Some(Self { file, path }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                log::debug!("State lock already held at {:?}", path);
                Ok(None)
            }
            Err(e) => Err(crate::Error::IoError(format!(
                "Failed to try-acquire state lock {:?}: {}",
                path, e
            ))),
        }
    }

    /// Whether some process holds the lock; does not take it
    pub fn is_held<P: AsRef<Path>>(path: P) -> bool {
        let path = path.as_ref();
        let Ok(file) = File::open(path) else {
            return false;
        };
        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                false
            }
            Err(_) => true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            log::warn!("Failed to release state lock at {:?}: {}", self.path, e);
        } else {
            log::debug!("Released state lock at {:?}", self.path);
        }
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_acquire_release() {
        let dir = TempDir::new().unwrap();
        let path = StateLock::path_in(dir.path());

        {
            let lock = StateLock::acquire(&path).unwrap();
            assert_eq!(lock.path(), path);
            assert!(StateLock::is_held(&path));
        }

        assert!(!StateLock::is_held(&path));
    }

    #[test]
    fn test_try_acquire_contention() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(StateLock::FILE_NAME);

        let first = StateLock::try_acquire(&path).unwrap();
        assert!(first.is_some());

        let second = StateLock::try_acquire(&path).unwrap();
        assert!(second.is_none());

        drop(first);
        assert!(StateLock::try_acquire(&path).unwrap().is_some());
    }

    #[test]
    fn test_is_held_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(!StateLock::is_held(dir.path().join("absent.lock")));
    }
}
