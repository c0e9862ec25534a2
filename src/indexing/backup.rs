use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::IndexedItemsInfo;
use crate::indexing::index::Index;
use crate::storage::commit::{CommitPoint, SEGMENTS_GEN};
use crate::storage::deletion_policy::SnapshotDeletionPolicy;
use crate::storage::layout::IndexStorage;

/// Every file ever copied into the backup directory for one index, across incremental runs.
pub const ALL_EXISTING_FILES_SUFFIX: &str = ".all-existing-index-files";
/// The files a restore of this backup needs.
pub const REQUIRED_FILES: &str = "index-files.required-for-index-restore";
/// Left behind by a failed backup; a restore rebuilds the index from scratch.
pub const FORCE_RESET_MARKER: &str = "index-files.force-reset-on-restore";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupStatus {
    /// Memory indexes are rebuilt after restore instead.
    SkippedInMemory,
    Completed { copied: Vec<String>, required: Vec<String> },
    Corrupted,
    CopyFailed { file: String },
}

struct Manifests {
    all_files: BufWriter<File>,
    needed: BufWriter<File>,
    needed_path: PathBuf,
    copied: Vec<String>,
    required: Vec<String>,
}

impl Manifests {
    fn record(&mut self, file: &str, copied: bool) -> Result<()> {
        if copied {
            writeln!(self.all_files, "{}", file)?;
            self.copied.push(file.to_string());
        }
        writeln!(self.needed, "{}", file)?;
        self.required.push(file.to_string());
        Ok(())
    }

    fn finish(mut self) -> Result<BackupStatus> {
        self.all_files.flush()?;
        self.needed.flush()?;
        Ok(BackupStatus::Completed { copied: self.copied, required: self.required })
    }

    /// Drops the partial manifest and marks the backup as unusable for this index.
    fn abort(self, save_to: &Path) {
        let Manifests { needed, needed_path, .. } = self;
        drop(needed);
        if let Err(err) = fs::remove_file(&needed_path) {
            warn!(target: "docdex::indexing", path = %needed_path.display(), error = %err, "could not delete the required files list");
        }
        if let Err(err) = File::create(save_to.join(FORCE_RESET_MARKER)) {
            warn!(target: "docdex::indexing", error = %err, "could not write the force reset marker");
        }
    }
}

impl Index {
    /// Copies the files of the last commit of this index into `backup_dir`.
    ///
    /// Files are read from `<source_root>/<encoded name>`. With an incremental tag the files
    /// go under `backup_dir/<tag>` and files listed in the index's all-existing-files manifest
    /// are not copied again, though they are still listed as required.
    pub fn backup(&self, backup_dir: &Path, source_root: &Path, incremental_tag: Option<&str>) -> Result<BackupStatus> {
        if self.directory().is_in_memory() {
            info!(target: "docdex::indexing", index = %self.name(), "skipping backup of in-memory index");
            return Ok(BackupStatus::SkippedInMemory);
        }

        let backup_dir = match incremental_tag {
            Some(tag) => backup_dir.join(tag),
            None => backup_dir.to_path_buf(),
        };
        let encoded = IndexStorage::encode_name(self.name());
        let source = source_root.join(&encoded);
        let save_to = backup_dir.join("Indexes").join(&encoded);
        fs::create_dir_all(&save_to)?;

        let all_files_path = backup_dir.join(format!("{}{}", encoded, ALL_EXISTING_FILES_SUFFIX));
        let existing: HashSet<String> = match fs::read_to_string(&all_files_path) {
            Ok(text) => text.lines().filter(|l| !l.is_empty()).map(String::from).collect(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(err) => return Err(err.into()),
        };

        let needed_path = save_to.join(REQUIRED_FILES);
        let mut manifests = Manifests {
            all_files: BufWriter::new(OpenOptions::new().create(true).append(true).open(&all_files_path)?),
            needed: BufWriter::new(File::create(&needed_path)?),
            needed_path,
            copied: Vec::new(),
            required: Vec::new(),
        };

        // The floating files change on every commit; copy them while no write can run.
        let version_file = IndexStorage::index_version_file_name(self.definition());
        let floating = self.write(|_, _| {
            for name in [SEGMENTS_GEN, version_file] {
                fs::copy(source.join(name), save_to.join(name))?;
                manifests.record(name, true)?;
            }
            Ok(IndexedItemsInfo::unchanged())
        });
        if let Err(err) = floating {
            if err.has_kind(ErrorKind::CorruptIndex) {
                warn!(target: "docdex::indexing", index = %self.name(), error = %err, "could not backup index because it is corrupted, skipping it");
                manifests.abort(&save_to);
                return Ok(BackupStatus::Corrupted);
            }
            return Err(err);
        }

        let policy = self.deletion_policy()?;
        let commit = policy.snapshot()?;
        let status = self.copy_commit(&commit, &source, &save_to, &existing, manifests);
        if let Err(err) = policy.release(commit.generation) {
            warn!(target: "docdex::indexing", index = %self.name(), error = %err, "could not release the backup snapshot");
        }
        status
    }

    fn deletion_policy(&self) -> Result<Arc<SnapshotDeletionPolicy>> {
        self.write_lock
            .lock()
            .as_ref()
            .map(|writer| writer.deletion_policy().clone())
            .ok_or_else(|| Error::disposed(self.name()))
    }

    fn copy_commit(
        &self,
        commit: &CommitPoint,
        source: &Path,
        save_to: &Path,
        existing: &HashSet<String>,
        mut manifests: Manifests,
    ) -> Result<BackupStatus> {
        for file in commit.file_names() {
            if Path::new(&file).extension().is_some_and(|ext| ext.eq_ignore_ascii_case("lock")) {
                continue;
            }
            let path = source.join(&file);
            if !path.exists() {
                continue;
            }

            let copy = !existing.contains(&file);
            if copy {
                if let Err(err) = fs::copy(&path, save_to.join(&file)) {
                    warn!(target: "docdex::indexing", index = %self.name(), file = %file, error = %err, "could not backup index file, skipping the index");
                    manifests.abort(save_to);
                    return Ok(BackupStatus::CopyFailed { file });
                }
            }
            manifests.record(&file, copy)?;
        }
        manifests.finish()
    }
}
