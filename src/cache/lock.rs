//! Advisory file lock around cache writes
//!
//! Held by the process computing a cache record so that concurrent
//! invocations wait for the result instead of enumerating again, and by
//! invalidation while it removes the record. Released when dropped.
//!
//! Without `flock` the lock is the file's existence, so a file older than the
//! acquire timeout is treated as left behind by a crashed process.

use crate::error::{LightrunError, LightrunResult};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const CONTENTION_WARNING: Duration = Duration::from_millis(500);

/// Exclusive lock on a cache record
#[derive(Debug)]
pub struct CacheLock {
    path: PathBuf,
    file: File,
}

impl CacheLock {
    /// Acquire the lock at `path`, waiting up to `timeout`
    pub async fn acquire(path: &Path, timeout: Duration) -> LightrunResult<Self> {
        let start = Instant::now();
        let mut warned = false;

        loop {
            match Self::try_acquire_exclusive(path, timeout) {
                Ok(file) => {
                    if warned {
                        debug!(
                            "Cache lock acquired after {:.1}s: {}",
                            start.elapsed().as_secs_f64(),
                            path.display()
                        );
                    }
                    return Ok(Self {
                        path: path.to_path_buf(),
                        file,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if !warned && start.elapsed() > CONTENTION_WARNING {
                        warn!("Waiting for cache lock {}", path.display());
                        warned = true;
                    }
                }
                Err(e) => {
                    return Err(LightrunError::io(
                        format!("locking {}", path.display()),
                        e,
                    ))
                }
            }

            if start.elapsed() >= timeout {
                return Err(LightrunError::CacheLock {
                    path: path.to_path_buf(),
                    secs: timeout.as_secs(),
                });
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Release the lock and delete its file
    #[cfg(unix)]
    pub fn remove(self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Release the lock and delete its file
    #[cfg(not(unix))]
    pub fn remove(self) -> io::Result<()> {
        // dropping deletes the file
        drop(self);
        Ok(())
    }

    #[cfg(unix)]
    fn try_acquire_exclusive(path: &Path, _stale_after: Duration) -> io::Result<File> {
        use std::os::unix::fs::OpenOptionsExt;
        use std::os::unix::io::AsRawFd;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o666)
            .open(path)?;

        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            Ok(file)
        } else {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
                Err(io::Error::new(io::ErrorKind::WouldBlock, "lock held"))
            } else {
                Err(err)
            }
        }
    }

    #[cfg(not(unix))]
    fn try_acquire_exclusive(path: &Path, stale_after: Duration) -> io::Result<File> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let age = std::fs::metadata(path)
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|modified| modified.elapsed().ok());
                if age.is_some_and(|age| age > stale_after) {
                    warn!("Removing stale cache lock {}", path.display());
                    let _ = std::fs::remove_file(path);
                }
                Err(io::Error::new(io::ErrorKind::WouldBlock, "lock held"))
            }
            Err(e) => Err(e),
        }
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn acquire_creates_lock_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("k.lock");

        let _lock = CacheLock::acquire(&path, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn remove_deletes_file_and_releases() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("k.lock");

        let lock = CacheLock::acquire(&path, Duration::from_secs(1))
            .await
            .unwrap();
        lock.remove().unwrap();
        assert!(!path.exists());

        assert!(CacheLock::acquire(&path, Duration::from_millis(200))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn second_acquire_times_out_while_held() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("k.lock");

        let _held = CacheLock::acquire(&path, Duration::from_secs(1))
            .await
            .unwrap();
        let err = CacheLock::acquire(&path, Duration::from_millis(150))
            .await
            .unwrap_err();
        assert!(matches!(err, LightrunError::CacheLock { .. }));
    }

    #[tokio::test]
    async fn released_on_drop() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("k.lock");

        drop(
            CacheLock::acquire(&path, Duration::from_secs(1))
                .await
                .unwrap(),
        );
        assert!(CacheLock::acquire(&path, Duration::from_millis(200))
            .await
            .is_ok());
    }
}
