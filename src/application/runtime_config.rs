use std::io;
use std::path::PathBuf;
use std::time::Duration;

use compio::fs;
use snafu::{ResultExt, Snafu, ensure};
use tracing::warn;

use crate::application::data::LogLevel;
use crate::cli::Cli;
use crate::ext::BestEffortPathExt;
use crate::sync::DiffOptions;

/// Log file name used when the log destination is a directory.
const DEFAULT_LOG_FILE_NAME: &str = "mirrorsync.log";

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub source: PathBuf,
    pub replica: PathBuf,
    pub interval: Duration,
    pub log_file: PathBuf,
    pub log_level: LogLevel,
    pub diff_options: DiffOptions,
}

impl From<Cli> for RuntimeConfig {
    fn from(cli: Cli) -> Self {
        Self {
            source: cli.source,
            replica: cli.replica,
            interval: Duration::from_secs(cli.interval),
            log_file: cli.log_file,
            log_level: cli.log_level,
            diff_options: DiffOptions {
                mtime_tolerance: Duration::from_millis(cli.mtime_tolerance_ms),
            },
        }
    }
}

impl RuntimeConfig {
    /// Where log records are appended.
    pub fn log_file_path(&self) -> PathBuf {
        if self.log_file.is_dir() {
            self.log_file.join(DEFAULT_LOG_FILE_NAME)
        } else {
            self.log_file.clone()
        }
    }

    /// Makes sure both roots are usable before the first pass: the source must be an
    /// existing directory, the replica is created if missing, and neither may
    /// contain the other. The log file may not live inside the replica, where the
    /// first pass would delete it.
    pub async fn prepare_roots(&self) -> Result<(), RootValidationError> {
        let metadata = std::fs::metadata(&self.source).context(SourceUnavailableSnafu {
            path: &self.source,
        })?;
        ensure!(
            metadata.is_dir(),
            SourceNotADirectorySnafu { path: &self.source }
        );

        // Checked again once the replica exists, so symlinked ancestors resolve.
        self.ensure_disjoint_paths()?;
        fs::create_dir_all(&self.replica)
            .await
            .context(ReplicaCreationSnafu {
                path: &self.replica,
            })?;
        self.ensure_disjoint_paths()?;

        let log_file = self.log_file_path();
        if log_file.lies_within(&self.source) {
            warn!(
                "Log file {} is inside the source and will be copied on every pass",
                log_file.best_effort_path_display()
            );
        }
        Ok(())
    }

    fn ensure_disjoint_paths(&self) -> Result<(), RootValidationError> {
        ensure!(
            !self.source.overlaps(&self.replica),
            OverlappingRootsSnafu {
                source_root: &self.source,
                replica_root: &self.replica,
            }
        );
        let log_file = self.log_file_path();
        ensure!(
            !log_file.lies_within(&self.replica),
            LogInsideReplicaSnafu {
                log_file,
                replica_root: &self.replica,
            }
        );
        Ok(())
    }
}

#[derive(Debug, Snafu)]
pub enum RootValidationError {
    #[snafu(display("Source directory {} is unavailable: {source}", path.best_effort_path_display()))]
    SourceUnavailable { path: PathBuf, source: io::Error },
    #[snafu(display("Source {} is not a directory", path.best_effort_path_display()))]
    SourceNotADirectory { path: PathBuf },
    #[snafu(display("Cannot create replica directory {}: {source}", path.best_effort_path_display()))]
    ReplicaCreation { path: PathBuf, source: io::Error },
    #[snafu(display(
        "Source {} and replica {} overlap; neither may contain the other",
        source_root.best_effort_path_display(),
        replica_root.best_effort_path_display()
    ))]
    OverlappingRoots {
        source_root: PathBuf,
        replica_root: PathBuf,
    },
    #[snafu(display(
        "Log file {} is inside replica {}, which only mirrors the source",
        log_file.best_effort_path_display(),
        replica_root.best_effort_path_display()
    ))]
    LogInsideReplica {
        log_file: PathBuf,
        replica_root: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use tempfile::TempDir;

    fn config(source: &Path, replica: &Path, log_file: &Path) -> RuntimeConfig {
        RuntimeConfig {
            source: source.to_path_buf(),
            replica: replica.to_path_buf(),
            interval: Duration::from_secs(1),
            log_file: log_file.to_path_buf(),
            log_level: LogLevel::Info,
            diff_options: DiffOptions::default(),
        }
    }

    #[test]
    fn converts_cli_arguments() {
        let cli = Cli {
            source: PathBuf::from("src"),
            replica: PathBuf::from("dst"),
            interval: 7,
            log_file: PathBuf::from("sync.log"),
            log_level: LogLevel::Warn,
            mtime_tolerance_ms: 1500,
        };

        let config = RuntimeConfig::from(cli);

        assert_eq!(config.interval, Duration::from_secs(7));
        assert_eq!(
            config.diff_options.mtime_tolerance,
            Duration::from_millis(1500)
        );
    }

    #[compio::test]
    async fn prepare_roots_creates_missing_replica() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("source");
        let replica = temp_dir.path().join("backups/replica");
        std::fs::create_dir(&source).unwrap();

        config(&source, &replica, &temp_dir.path().join("sync.log"))
            .prepare_roots()
            .await
            .expect("Validation failed");

        assert!(replica.is_dir());
    }

    #[compio::test]
    async fn prepare_roots_rejects_missing_source() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");

        let result = config(
            &temp_dir.path().join("missing"),
            &temp_dir.path().join("replica"),
            &temp_dir.path().join("sync.log"),
        )
        .prepare_roots()
        .await;

        assert!(matches!(
            result,
            Err(RootValidationError::SourceUnavailable { .. })
        ));
        assert!(!temp_dir.path().join("replica").exists());
    }

    #[compio::test]
    async fn prepare_roots_rejects_file_source() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("source.txt");
        std::fs::write(&source, "not a directory").unwrap();

        let result = config(
            &source,
            &temp_dir.path().join("replica"),
            &temp_dir.path().join("sync.log"),
        )
        .prepare_roots()
        .await;

        assert!(matches!(
            result,
            Err(RootValidationError::SourceNotADirectory { .. })
        ));
    }

    #[compio::test]
    async fn prepare_roots_rejects_nested_roots() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("source");
        std::fs::create_dir(&source).unwrap();
        let log_file = temp_dir.path().join("sync.log");

        let nested_replica = config(&source, &source.join("replica"), &log_file)
            .prepare_roots()
            .await;
        let same_root = config(&source, &source, &log_file).prepare_roots().await;

        assert!(matches!(
            nested_replica,
            Err(RootValidationError::OverlappingRoots { .. })
        ));
        assert!(!source.join("replica").exists());
        assert!(matches!(
            same_root,
            Err(RootValidationError::OverlappingRoots { .. })
        ));
    }

    #[compio::test]
    async fn prepare_roots_rejects_log_file_inside_replica() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("source");
        let replica = temp_dir.path().join("replica");
        std::fs::create_dir(&source).unwrap();
        std::fs::create_dir(&replica).unwrap();
        let log_file = replica.join("logs/sync.log");
        std::fs::create_dir(replica.join("logs")).unwrap();
        std::fs::write(&log_file, "").unwrap();

        let inside_file = config(&source, &replica, &log_file).prepare_roots().await;
        let replica_as_log_directory = config(&source, &replica, &replica).prepare_roots().await;

        assert!(matches!(
            inside_file,
            Err(RootValidationError::LogInsideReplica { .. })
        ));
        assert!(matches!(
            replica_as_log_directory,
            Err(RootValidationError::LogInsideReplica { .. })
        ));
    }

    #[compio::test]
    async fn prepare_roots_rejects_log_file_inside_a_replica_yet_to_be_created() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("source");
        std::fs::create_dir(&source).unwrap();
        let replica = temp_dir.path().join("replica");

        let result = config(&source, &replica, &replica.join("sync.log"))
            .prepare_roots()
            .await;

        assert!(matches!(
            result,
            Err(RootValidationError::LogInsideReplica { .. })
        ));
        assert!(!replica.exists());
    }

    #[compio::test]
    async fn log_file_next_to_the_roots_is_accepted() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("source");
        std::fs::create_dir(&source).unwrap();

        let result = config(
            &source,
            &temp_dir.path().join("replica"),
            &temp_dir.path().join("replica.log"),
        )
        .prepare_roots()
        .await;

        assert!(result.is_ok(), "Unexpected error {result:?}");
    }

    #[test]
    fn directory_log_destination_gets_default_file_name() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let into_directory = config(temp_dir.path(), temp_dir.path(), temp_dir.path());
        let explicit_file = config(
            temp_dir.path(),
            temp_dir.path(),
            &temp_dir.path().join("custom.log"),
        );

        assert_eq!(
            into_directory.log_file_path(),
            temp_dir.path().join(DEFAULT_LOG_FILE_NAME)
        );
        assert_eq!(
            explicit_file.log_file_path(),
            temp_dir.path().join("custom.log")
        );
    }
}
