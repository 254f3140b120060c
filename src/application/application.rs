use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use compio::runtime::spawn;
use snafu::prelude::*;
use tracing::{debug, error, info, warn};

use crate::application::logging::{self, LogFile};
use crate::application::{RootValidationError, RuntimeConfig};
use crate::ext::BestEffortPathExt;
use crate::sync::{Scheduler, SchedulerError, StopToken, Synchronizer};

pub struct Application;

impl Application {
    pub async fn run(app_config: impl Into<RuntimeConfig>) -> Result<(), ApplicationError> {
        let app_config: RuntimeConfig = app_config.into();

        let log_path = app_config.log_file_path();
        let log_file = match LogFile::open(&log_path) {
            Ok(log_file) => Arc::new(log_file),
            Err(source) => {
                logging::setup_tracing(app_config.log_level, None);
                error!(
                    "Cannot open log file {}: {source}",
                    log_path.best_effort_path_display()
                );
                return Err(source).context(LogFileSnafu { path: log_path });
            }
        };
        logging::setup_tracing(app_config.log_level, Some(log_file.clone()));
        debug!("Runtime configuration: {:?}", app_config);

        if let Err(err) = app_config.prepare_roots().await {
            error!("{err}");
            return Err(err).context(RootValidationSnafu);
        }

        let stop = StopToken::new();
        Self::stop_on_interrupt(stop.clone());

        let synchronizer = Synchronizer::new(
            &app_config.source,
            &app_config.replica,
            app_config.diff_options.clone(),
        );
        Scheduler::new(synchronizer, app_config.interval, stop)
            .with_event_sink(log_file)
            .run()
            .await
            .context(SynchronizationSnafu)?;

        Ok(())
    }

    fn stop_on_interrupt(stop: StopToken) {
        spawn(async move {
            match compio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupt received, stopping once the current action completes");
                    stop.stop();
                }
                Err(err) => warn!("Cannot listen for Ctrl+C: {err}"),
            }
        })
        .detach();
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure opening log file {}", path.display()))]
    LogFileError { path: PathBuf, source: io::Error },
    #[snafu(display("Critical failure validating the source and replica directories"))]
    RootValidationError { source: RootValidationError },
    #[snafu(display("Critical failure encountered during synchronization"))]
    SynchronizationError { source: SchedulerError },
}
