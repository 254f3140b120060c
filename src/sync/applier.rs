use std::ffi::OsString;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};

use compio::BufResult;
use compio::fs::{self, File};
use compio::io::{AsyncReadAt, AsyncWriteAtExt};
use snafu::{ResultExt, Snafu};
use tracing::{debug, error, info};

use crate::filesystem::EntryKind;
use crate::sync::{Action, StopToken};

const COPY_CHUNK_SIZE: usize = 256 * 1024;
const TEMP_FILE_SUFFIX: &str = ".mirrorsync-tmp";

/// Outcome counts of one pass over the planned actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub applied: usize,
    pub failed: usize,
    /// Actions left untouched because a stop was requested.
    pub not_attempted: usize,
}

impl PassReport {
    pub fn is_degraded(&self) -> bool {
        self.failed > 0
    }

    pub fn total(&self) -> usize {
        self.applied + self.failed + self.not_attempted
    }
}

/// Executes [`Action`]s against a replica tree, reading file contents from the source tree.
#[derive(Debug, Clone)]
pub struct Applier {
    source_root: PathBuf,
    replica_root: PathBuf,
}

impl Applier {
    pub fn new(source_root: impl Into<PathBuf>, replica_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            replica_root: replica_root.into(),
        }
    }

    /// Applies `actions` in order, logging one record per action.
    ///
    /// A failed action is logged and counted, and the remaining actions still run.
    /// The stop token is checked before every action; an action already in flight
    /// always completes.
    pub async fn apply_all(&self, actions: &[Action], stop: &StopToken) -> PassReport {
        let mut report = PassReport::default();

        for (index, action) in actions.iter().enumerate() {
            if stop.is_stopped() {
                report.not_attempted = actions.len() - index;
                info!(
                    "Stop requested, {} remaining actions were not started",
                    report.not_attempted
                );
                break;
            }

            match self.apply(action).await {
                Ok(()) => {
                    info!("{action}: ok");
                    report.applied += 1;
                }
                Err(err) => {
                    error!("{action}: error: {err}");
                    report.failed += 1;
                }
            }
        }

        report
    }

    pub async fn apply(&self, action: &Action) -> Result<(), ApplyError> {
        let replica_path = self.replica_root.join(action.path());

        match action {
            Action::Create {
                kind: EntryKind::Directory,
                ..
            } => create_directory(&replica_path).await,
            Action::Create {
                kind: EntryKind::File,
                path,
            }
            | Action::Update { path } => self.copy_file(path).await,
            Action::Delete {
                kind: EntryKind::File,
                ..
            } => tolerate_missing(fs::remove_file(&replica_path).await)
                .context(RemoveSnafu { path: replica_path }),
            Action::Delete {
                kind: EntryKind::Directory,
                ..
            } => tolerate_missing(fs::remove_dir(&replica_path).await)
                .context(RemoveSnafu { path: replica_path }),
            // `remove_file` unlinks the link itself, even when it points to a directory.
            Action::Unlink { .. } => tolerate_missing(fs::remove_file(&replica_path).await)
                .context(RemoveSnafu { path: replica_path }),
        }
    }

    /// Copies into a temporary sibling first so the replica path only ever holds a complete file.
    async fn copy_file(&self, relative: &Path) -> Result<(), ApplyError> {
        let source_path = self.source_root.join(relative);
        let replica_path = self.replica_root.join(relative);
        let temp_path = temp_path_for(&replica_path);

        if let Some(parent) = replica_path.parent() {
            create_directory(parent).await?;
        }

        let copied = match copy_contents(&source_path, &temp_path).await {
            Ok(()) => fs::rename(&temp_path, &replica_path)
                .await
                .context(RenameSnafu {
                    path: replica_path.clone(),
                }),
            Err(err) => Err(err),
        };

        if copied.is_err() {
            if let Err(err) = tolerate_missing(fs::remove_file(&temp_path).await) {
                debug!(
                    "Failed to clean up temporary file {}: {}",
                    temp_path.display(),
                    err
                );
            }
        }

        copied
    }
}

async fn create_directory(path: &Path) -> Result<(), ApplyError> {
    fs::create_dir_all(path)
        .await
        .context(CreateDirectorySnafu { path })
}

async fn copy_contents(source: &Path, destination: &Path) -> Result<(), ApplyError> {
    let metadata = std::fs::metadata(source).context(ReadSourceSnafu { path: source })?;
    let source_file = File::open(source)
        .await
        .context(ReadSourceSnafu { path: source })?;
    let mut destination_file = File::create(destination)
        .await
        .context(WriteReplicaSnafu { path: destination })?;

    let mut buffer = Vec::with_capacity(COPY_CHUNK_SIZE);
    let mut position = 0u64;
    loop {
        buffer.clear();
        let BufResult(read, returned) = source_file.read_at(buffer, position).await;
        buffer = returned;
        let read = read.context(ReadSourceSnafu { path: source })?;
        if read == 0 {
            break;
        }

        let BufResult(written, returned) = destination_file.write_all_at(buffer, position).await;
        buffer = returned;
        written.context(WriteReplicaSnafu { path: destination })?;
        position += read as u64;
    }

    destination_file
        .sync_all()
        .await
        .context(WriteReplicaSnafu { path: destination })?;
    destination_file
        .close()
        .await
        .context(WriteReplicaSnafu { path: destination })?;

    copy_metadata(&metadata, destination).context(MetadataSnafu { path: destination })
}

/// Carries permissions and modification time over, so the next scan sees an unchanged file.
fn copy_metadata(metadata: &Metadata, destination: &Path) -> io::Result<()> {
    let file = std::fs::File::options().write(true).open(destination)?;
    if let Ok(modified) = metadata.modified() {
        file.set_modified(modified)?;
    }
    file.set_permissions(metadata.permissions())
}

/// Hidden sibling named after the target and this process, so it cannot be mistaken
/// for a mirrored file of the same name.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    if let Some(file_name) = path.file_name() {
        name.push(file_name);
    }
    name.push(format!(".{}{TEMP_FILE_SUFFIX}", std::process::id()));
    path.with_file_name(name)
}

fn tolerate_missing(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[derive(Debug, Snafu)]
pub enum ApplyError {
    #[snafu(display("Failed to create directory {}: {source}", path.display()))]
    CreateDirectoryError { path: PathBuf, source: io::Error },
    #[snafu(display("Failed to read source file {}: {source}", path.display()))]
    ReadSourceError { path: PathBuf, source: io::Error },
    #[snafu(display("Failed to write replica file {}: {source}", path.display()))]
    WriteReplicaError { path: PathBuf, source: io::Error },
    #[snafu(display("Failed to copy metadata to {}: {source}", path.display()))]
    MetadataError { path: PathBuf, source: io::Error },
    #[snafu(display("Failed to move the copy into place at {}: {source}", path.display()))]
    RenameError { path: PathBuf, source: io::Error },
    #[snafu(display("Failed to remove {}: {source}", path.display()))]
    RemoveError { path: PathBuf, source: io::Error },
}
