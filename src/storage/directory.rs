use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use parking_lot::{Mutex, RwLock};
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::file_lock::FileLock;

/// Flat namespace of index files, backed by memory or by a filesystem directory.
pub trait Directory: Send + Sync {
    fn list_files(&self) -> Result<Vec<String>>;

    fn file_exists(&self, name: &str) -> bool;

    fn read_file(&self, name: &str) -> Result<Vec<u8>>;

    /// Replaces `name` atomically.
    fn write_file(&self, name: &str, data: &[u8]) -> Result<()>;

    fn delete_file(&self, name: &str) -> Result<()>;

    fn file_length(&self, name: &str) -> Result<u64>;

    fn size_in_bytes(&self) -> Result<u64>;

    fn make_lock(&self, name: &str) -> Box<dyn DirectoryLock>;

    /// Filesystem location, `None` for memory directories.
    fn location(&self) -> Option<&Path>;

    fn is_in_memory(&self) -> bool;

    fn close(&self) -> Result<()>;
}

/// Non-blocking lock scoped to one directory.
pub trait DirectoryLock: Send {
    fn obtain(&mut self) -> Result<bool>;

    fn release(&mut self);
}

fn already_closed() -> Error {
    Error::new(ErrorKind::InvalidState, "this Directory is closed")
}

/// Memory-resident directory, used for new indexes until they are promoted.
pub struct RamDirectory {
    files: RwLock<BTreeMap<String, Arc<Vec<u8>>>>,
    locks: Arc<Mutex<HashSet<String>>>,
    closed: AtomicBool,
}

impl RamDirectory {
    pub fn new() -> Self {
        RamDirectory {
            files: RwLock::new(BTreeMap::new()),
            locks: Arc::new(Mutex::new(HashSet::new())),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(already_closed());
        }
        Ok(())
    }
}

impl Default for RamDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl Directory for RamDirectory {
    fn list_files(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        Ok(self.files.read().keys().cloned().collect())
    }

    fn file_exists(&self, name: &str) -> bool {
        self.files.read().contains_key(name)
    }

    fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        self.ensure_open()?;
        self.files
            .read()
            .get(name)
            .map(|data| data.as_ref().clone())
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("File '{}' does not exist", name)))
    }

    fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.files.write().insert(name.to_string(), Arc::new(data.to_vec()));
        Ok(())
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.ensure_open()?;
        self.files.write().remove(name);
        Ok(())
    }

    fn file_length(&self, name: &str) -> Result<u64> {
        self.ensure_open()?;
        self.files
            .read()
            .get(name)
            .map(|data| data.len() as u64)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("File '{}' does not exist", name)))
    }

    fn size_in_bytes(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.files.read().values().map(|data| data.len() as u64).sum())
    }

    fn make_lock(&self, name: &str) -> Box<dyn DirectoryLock> {
        Box::new(RamLock {
            name: name.to_string(),
            locks: self.locks.clone(),
            held: false,
        })
    }

    fn location(&self) -> Option<&Path> {
        None
    }

    fn is_in_memory(&self) -> bool {
        true
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.files.write().clear();
        Ok(())
    }
}

struct RamLock {
    name: String,
    locks: Arc<Mutex<HashSet<String>>>,
    held: bool,
}

impl DirectoryLock for RamLock {
    fn obtain(&mut self) -> Result<bool> {
        if self.held {
            return Ok(true);
        }
        self.held = self.locks.lock().insert(self.name.clone());
        Ok(self.held)
    }

    fn release(&mut self) {
        if self.held {
            self.locks.lock().remove(&self.name);
            self.held = false;
        }
    }
}

impl Drop for RamLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Filesystem directory holding one index.
pub struct FsDirectory {
    path: PathBuf,
    closed: AtomicBool,
}

impl FsDirectory {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        fs::create_dir_all(&path)?;
        Ok(FsDirectory {
            path,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(already_closed());
        }
        Ok(())
    }
}

impl Directory for FsDirectory {
    fn list_files(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn file_exists(&self, name: &str) -> bool {
        self.path.join(name).is_file()
    }

    fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        self.ensure_open()?;
        fs::read(self.path.join(name)).map_err(|e| {
            let kind = if e.kind() == std::io::ErrorKind::NotFound { ErrorKind::NotFound } else { ErrorKind::Io };
            Error::new(kind, format!("Could not read '{}': {}", name, e))
        })
    }

    fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        let tmp = self.path.join(format!("{}.tmp", name));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, self.path.join(name))?;
        Ok(())
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.ensure_open()?;
        match fs::remove_file(self.path.join(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn file_length(&self, name: &str) -> Result<u64> {
        self.ensure_open()?;
        Ok(fs::metadata(self.path.join(name))?.len())
    }

    fn size_in_bytes(&self) -> Result<u64> {
        let mut total = 0;
        for name in self.list_files()? {
            total += self.file_length(&name)?;
        }
        Ok(total)
    }

    fn make_lock(&self, name: &str) -> Box<dyn DirectoryLock> {
        Box::new(FsLock {
            path: self.path.join(name),
            lock: None,
        })
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn is_in_memory(&self) -> bool {
        false
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

struct FsLock {
    path: PathBuf,
    lock: Option<FileLock>,
}

impl DirectoryLock for FsLock {
    fn obtain(&mut self) -> Result<bool> {
        if self.lock.is_none() {
            self.lock = FileLock::try_acquire(&self.path)?;
        }
        Ok(self.lock.is_some())
    }

    fn release(&mut self) {
        self.lock = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(dir: &dyn Directory) {
        dir.write_file("_1.seg", b"abc").unwrap();
        dir.write_file("segments_1", b"xy").unwrap();
        assert!(dir.file_exists("_1.seg"));
        assert_eq!(dir.read_file("_1.seg").unwrap(), b"abc");
        assert_eq!(dir.size_in_bytes().unwrap(), 5);

        dir.delete_file("_1.seg").unwrap();
        assert_eq!(dir.list_files().unwrap(), vec!["segments_1".to_string()]);
        assert_eq!(dir.read_file("_1.seg").unwrap_err().kind, ErrorKind::NotFound);

        let mut first = dir.make_lock("writing-to-index.lock");
        let mut second = dir.make_lock("writing-to-index.lock");
        assert!(first.obtain().unwrap());
        assert!(!second.obtain().unwrap());
        first.release();
        assert!(second.obtain().unwrap());
    }

    #[test]
    fn ram_directory_basics() {
        let dir = RamDirectory::new();
        exercise(&dir);
        dir.close().unwrap();
        assert_eq!(dir.list_files().unwrap_err().kind, ErrorKind::InvalidState);
    }

    #[test]
    fn fs_directory_basics() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = FsDirectory::open(tmp.path().join("Users")).unwrap();
        exercise(&dir);
        assert!(dir.location().unwrap().join("writing-to-index.lock").exists());
    }
}
