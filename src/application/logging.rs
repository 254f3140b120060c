use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use supports_color::Stream;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::application::data::LogLevel;
use crate::sync::EventSink;

/// Append-only log destination that remembers its first write failure.
#[derive(Debug)]
pub struct LogFile {
    file: File,
    failure: Mutex<Option<String>>,
}

impl LogFile {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file,
            failure: Mutex::new(None),
        })
    }

    fn record(&self, result: io::Result<usize>) -> io::Result<usize> {
        if let Err(err) = &result {
            if let Ok(mut failure) = self.failure.lock() {
                failure.get_or_insert_with(|| err.to_string());
            }
        }
        result
    }
}

impl Write for &LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = (&self.file).write(buf);
        self.record(result)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&self.file).flush()
    }
}

impl EventSink for LogFile {
    fn failure(&self) -> Option<String> {
        self.failure.lock().ok().and_then(|failure| failure.clone())
    }
}

/// Installs the global subscriber: stdout always, plus the log file when one is open.
///
/// Both sinks carry RFC 3339 timestamps and the severity of every record.
pub fn setup_tracing(level: LogLevel, log_file: Option<Arc<LogFile>>) {
    let console_layer = fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(supports_color::on(Stream::Stdout).is_some())
        .with_target(false);
    let file_layer = log_file.map(|log_file| {
        fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(level.to_level_filter())
        .with(console_layer)
        .with(file_layer)
        .init();
}
