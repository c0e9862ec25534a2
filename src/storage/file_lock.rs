use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use crate::core::error::{Error, ErrorKind, Result};

/// Exclusive advisory lock on a file, released on drop.
pub struct FileLock {
    pub file: File,
    pub path: PathBuf,
}

impl FileLock {
    /// Non-blocking; `Ok(None)` when another holder owns the lock.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_EX, LOCK_NB, EWOULDBLOCK};

            let fd = file.as_raw_fd();
            let rc = unsafe { flock(fd, LOCK_EX | LOCK_NB) };
            if rc != 0 {
                let err = std::io::Error::last_os_error();
                if err.raw_os_error() == Some(EWOULDBLOCK) {
                    return Ok(None);
                }
                return Err(Error::new(
                    ErrorKind::Io,
                    format!("Failed to lock {}: {}", path.display(), err),
                ));
            }
        }

        Ok(Some(FileLock {
            file,
            path: path.to_path_buf(),
        }))
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_UN};

            let fd = self.file.as_raw_fd();
            unsafe {
                flock(fd, LOCK_UN);
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn second_holder_is_refused_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("writing-to-index.lock");

        let first = FileLock::try_acquire(&path).unwrap();
        assert!(first.is_some());
        assert!(FileLock::try_acquire(&path).unwrap().is_none());

        drop(first);
        assert!(FileLock::try_acquire(&path).unwrap().is_some());
    }
}
