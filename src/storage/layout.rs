use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::schema::definition::IndexDefinition;
use crate::storage::directory::{Directory, FsDirectory, RamDirectory};

pub const INDEX_VERSION: &str = "1.0";
pub const MAP_VERSION_FILE: &str = "index.version";
pub const MAP_REDUCE_VERSION_FILE: &str = "mapReduce.version";

/// Per-process layout of index directories: `<root>/<encoded index name>/`.
#[derive(Debug, Clone)]
pub struct IndexStorage {
    root: Option<PathBuf>,
    run_in_memory: bool,
    create_new_indexes_in_memory: bool,
}

impl IndexStorage {
    pub fn new(config: &Config) -> Result<Self> {
        if config.run_in_memory {
            return Ok(IndexStorage::in_memory(config));
        }
        fs::create_dir_all(&config.storage_path)?;
        Ok(IndexStorage {
            root: Some(config.storage_path.clone()),
            run_in_memory: false,
            create_new_indexes_in_memory: config.create_new_indexes_in_memory,
        })
    }

    /// Layout without a filesystem root; every index stays in memory.
    pub fn in_memory(config: &Config) -> Self {
        IndexStorage {
            root: None,
            run_in_memory: true,
            create_new_indexes_in_memory: config.create_new_indexes_in_memory,
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// URL-style encoding so any index name maps to one directory entry.
    pub fn encode_name(name: &str) -> String {
        let mut encoded = String::with_capacity(name.len());
        for byte in name.bytes() {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => encoded.push(byte as char),
                _ => encoded.push_str(&format!("%{:02X}", byte)),
            }
        }
        encoded
    }

    pub fn index_path(&self, name: &str) -> Option<PathBuf> {
        self.root.as_ref().map(|root| root.join(Self::encode_name(name)))
    }

    pub fn index_version_file_name(definition: &IndexDefinition) -> &'static str {
        if definition.is_map_reduce {
            MAP_REDUCE_VERSION_FILE
        } else {
            MAP_VERSION_FILE
        }
    }

    pub fn write_index_version(dir: &dyn Directory, definition: &IndexDefinition) -> Result<()> {
        dir.write_file(Self::index_version_file_name(definition), INDEX_VERSION.as_bytes())
    }

    /// Disk when the index already has a version marker; otherwise memory for new indexes
    /// (when configured so), or a fresh disk directory.
    pub fn open_directory(&self, definition: &IndexDefinition) -> Result<Arc<dyn Directory>> {
        let path = match (&self.root, self.run_in_memory) {
            (Some(_), false) => self.index_path(&definition.name),
            _ => None,
        };
        let Some(path) = path else {
            return Ok(Arc::new(RamDirectory::new()));
        };

        let version_file = path.join(Self::index_version_file_name(definition));
        if version_file.is_file() {
            let version = fs::read_to_string(&version_file)?;
            if version.trim() != INDEX_VERSION {
                return Err(Error::new(
                    ErrorKind::CorruptIndex,
                    format!("Index {} has version '{}', expected '{}'", definition.name, version.trim(), INDEX_VERSION),
                ));
            }
            return Ok(Arc::new(FsDirectory::open(path)?));
        }

        if self.create_new_indexes_in_memory {
            return Ok(Arc::new(RamDirectory::new()));
        }

        let dir = FsDirectory::open(path)?;
        Self::write_index_version(&dir, definition)?;
        Ok(Arc::new(dir))
    }

    /// Copies every file of a memory directory into the index's disk directory.
    pub fn make_ram_directory_physical(&self, ram: &dyn Directory, name: &str) -> Result<Arc<dyn Directory>> {
        let path = self.index_path(name).ok_or_else(|| {
            Error::new(ErrorKind::InvalidState, format!("Index {} has no storage location on disk", name))
        })?;

        let fs_dir = FsDirectory::open(&path)?;
        for stale in fs_dir.list_files()? {
            fs_dir.delete_file(&stale)?;
        }
        for file in ram.list_files()? {
            fs_dir.write_file(&file, &ram.read_file(&file)?)?;
        }

        info!(target: "docdex::indexing", index = name, path = %path.display(), "moved in-memory index to disk");
        Ok(Arc::new(fs_dir))
    }
}
