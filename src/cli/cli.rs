use std::path::PathBuf;

use clap::Parser;

use crate::application::data::LogLevel;

/// Periodically mirror a source directory into a replica directory.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Cli {
    /// Directory to back up
    pub source: PathBuf,

    /// Mirror directory, created if missing
    pub replica: PathBuf,

    /// Seconds between the starts of consecutive passes
    #[clap(value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Log file to append to; a directory gets a mirrorsync.log inside it
    pub log_file: PathBuf,

    #[clap(long, short, default_value = "info", value_enum)]
    pub log_level: LogLevel,

    /// Modification time difference, in milliseconds, still treated as unchanged
    #[clap(long, default_value_t = 0)]
    pub mtime_tolerance_ms: u64,
}
