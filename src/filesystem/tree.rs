use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use derive_more::Display;
use snafu::{ResultExt, Snafu, ensure};
use tracing::{debug, warn};

use crate::ext::BestEffortPathExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EntryKind {
    #[display("file")]
    File,
    #[display("directory")]
    Directory,
}

/// A single node of a scanned tree. The relative path is the snapshot key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathEntry {
    File {
        size: u64,
        modified_time: Option<SystemTime>,
    },
    Directory,
}

impl PathEntry {
    pub fn kind(&self) -> EntryKind {
        match self {
            PathEntry::File { .. } => EntryKind::File,
            PathEntry::Directory => EntryKind::Directory,
        }
    }
}

/// Every file and directory reachable under a root, without following symbolic links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeSnapshot {
    entries: BTreeMap<PathBuf, PathEntry>,
    /// Entries the walk could not represent; anything at or below them is unknown.
    skipped: BTreeSet<PathBuf>,
    /// The skipped entries that are symbolic links or special files rather than unreadable.
    special: BTreeSet<PathBuf>,
}

impl TreeSnapshot {
    /// Walks `root` recursively. Fails if the root itself is missing or unreadable.
    ///
    /// Problems with nested entries are logged and recorded as skipped instead of
    /// failing the whole scan.
    pub fn scan(root: &Path) -> Result<Self, ScanError> {
        let metadata = fs::metadata(root).context(RootSnafu { root })?;
        ensure!(metadata.is_dir(), NotADirectorySnafu { root });
        let read_dir = fs::read_dir(root).context(RootSnafu { root })?;

        let mut snapshot = Self::default();
        snapshot.walk_entries(root, Path::new(""), read_dir);
        debug!(
            "Scanned {}: {} entries, {} skipped",
            root.best_effort_path_display(),
            snapshot.entries.len(),
            snapshot.skipped.len()
        );
        Ok(snapshot)
    }

    /// Like [`TreeSnapshot::scan`], but a root that does not exist yet is an empty tree.
    pub fn scan_or_empty(root: &Path) -> Result<Self, ScanError> {
        match Self::scan(root) {
            Err(err) if err.is_root_missing() => {
                debug!(
                    "{} does not exist yet, treating it as empty",
                    root.best_effort_path_display()
                );
                Ok(Self::default())
            }
            other => other,
        }
    }

    fn walk(&mut self, root: &Path, relative_dir: &Path) {
        let directory = root.join(relative_dir);
        match fs::read_dir(&directory) {
            Ok(read_dir) => self.walk_entries(root, relative_dir, read_dir),
            Err(err) => {
                warn!(
                    "Skipping unreadable directory {}: {}",
                    directory.display(),
                    err
                );
                self.skipped.insert(relative_dir.to_path_buf());
            }
        }
    }

    fn walk_entries(&mut self, root: &Path, relative_dir: &Path, read_dir: fs::ReadDir) {
        for entry in read_dir {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(
                        "Failed to list an entry of {}: {}",
                        root.join(relative_dir).display(),
                        err
                    );
                    self.skipped.insert(relative_dir.to_path_buf());
                    continue;
                }
            };
            let relative = relative_dir.join(entry.file_name());

            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    warn!("Skipping {}: {}", entry.path().display(), err);
                    self.skipped.insert(relative);
                    continue;
                }
            };

            if file_type.is_dir() {
                self.entries.insert(relative.clone(), PathEntry::Directory);
                self.walk(root, &relative);
            } else if file_type.is_file() {
                match entry.metadata() {
                    Ok(metadata) => {
                        self.entries.insert(
                            relative,
                            PathEntry::File {
                                size: metadata.len(),
                                modified_time: metadata.modified().ok(),
                            },
                        );
                    }
                    Err(err) => {
                        warn!("Skipping {}: {}", entry.path().display(), err);
                        self.skipped.insert(relative);
                    }
                }
            } else {
                warn!(
                    "Skipping {}: symbolic links and special files are not mirrored",
                    entry.path().display()
                );
                self.skipped.insert(relative.clone());
                self.special.insert(relative);
            }
        }
    }

    pub fn get(&self, path: &Path) -> Option<&PathEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Entries in lexical path order, which lists every directory before its contents.
    pub fn iter(&self) -> impl Iterator<Item = (&Path, &PathEntry)> {
        self.entries
            .iter()
            .map(|(path, entry)| (path.as_path(), entry))
    }

    /// Whether `path` is a skipped entry or lies below one.
    pub fn is_skipped(&self, path: &Path) -> bool {
        self.skipped.iter().any(|skipped| path.starts_with(skipped))
    }

    /// Symbolic links, sockets, fifos and devices found by the walk, never followed.
    pub fn special_entries(&self) -> impl Iterator<Item = &Path> {
        self.special.iter().map(PathBuf::as_path)
    }

    #[cfg(test)]
    pub(crate) fn from_entries(
        entries: impl IntoIterator<Item = (PathBuf, PathEntry)>,
        skipped: impl IntoIterator<Item = PathBuf>,
    ) -> Self {
        Self {
            entries: entries.into_iter().collect(),
            skipped: skipped.into_iter().collect(),
            special: BTreeSet::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_special_entries(
        mut self,
        special: impl IntoIterator<Item = PathBuf>,
    ) -> Self {
        for path in special {
            self.skipped.insert(path.clone());
            self.special.insert(path);
        }
        self
    }
}

#[derive(Debug, Snafu)]
pub enum ScanError {
    #[snafu(display("Cannot read tree root {}", root.best_effort_path_display()))]
    RootError { root: PathBuf, source: io::Error },
    #[snafu(display("Tree root {} is not a directory", root.best_effort_path_display()))]
    NotADirectory { root: PathBuf },
}

impl ScanError {
    pub fn is_root_missing(&self) -> bool {
        matches!(self, ScanError::RootError { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}
