use std::io;
use std::path::{Path, PathBuf};

use compio::fs;
use snafu::{ResultExt, Snafu};
use tracing::debug;

use crate::ext::BestEffortPathExt;
use crate::filesystem::{ScanError, TreeSnapshot};
use crate::sync::{Action, Applier, DiffOptions, PassReport, StopToken, diff_with};

/// One source/replica pair and everything needed to run a scan-diff-apply pass over it.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    source_root: PathBuf,
    replica_root: PathBuf,
    options: DiffOptions,
    applier: Applier,
}

impl Synchronizer {
    pub fn new(
        source_root: impl Into<PathBuf>,
        replica_root: impl Into<PathBuf>,
        options: DiffOptions,
    ) -> Self {
        let source_root = source_root.into();
        let replica_root = replica_root.into();
        let applier = Applier::new(&source_root, &replica_root);
        Self {
            source_root,
            replica_root,
            options,
            applier,
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn replica_root(&self) -> &Path {
        &self.replica_root
    }

    /// Scans both trees and returns the actions that would bring the replica up to date.
    pub fn plan(&self) -> Result<Vec<Action>, PassError> {
        let source = TreeSnapshot::scan(&self.source_root).context(SourceScanSnafu)?;
        let replica = TreeSnapshot::scan_or_empty(&self.replica_root).context(ReplicaScanSnafu)?;
        Ok(diff_with(&source, &replica, &self.options))
    }

    pub async fn run_pass(&self, stop: &StopToken) -> Result<PassReport, PassError> {
        let actions = self.plan()?;

        // The replica root may have been removed since the last pass.
        fs::create_dir_all(&self.replica_root)
            .await
            .context(ReplicaRootSnafu {
                path: &self.replica_root,
            })?;

        if actions.is_empty() {
            debug!("Replica is up to date");
        }
        Ok(self.applier.apply_all(&actions, stop).await)
    }
}

#[derive(Debug, Snafu)]
pub enum PassError {
    #[snafu(display("Cannot scan the source tree: {source}"))]
    SourceScanError { source: ScanError },
    #[snafu(display("Cannot scan the replica tree: {source}"))]
    ReplicaScanError { source: ScanError },
    #[snafu(display("Cannot create replica root {}: {source}", path.best_effort_path_display()))]
    ReplicaRootError { path: PathBuf, source: io::Error },
}

impl PassError {
    /// Source trouble ends the sync loop; replica trouble is retried on the next pass.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PassError::SourceScanError { .. })
    }
}
