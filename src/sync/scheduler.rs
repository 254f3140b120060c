use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use derive_more::Display;
use futures::future::{Either, select};
use snafu::{ResultExt, Snafu};
use tracing::{debug, error, info, warn};

use crate::ext::BestEffortPathExt;
use crate::sync::{PassError, PassReport, StopToken, Synchronizer};

/// Destination of log records whose failure must stop the loop.
pub trait EventSink: Send + Sync {
    /// `None` while healthy, otherwise a description of the first failure.
    fn failure(&self) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SchedulerState {
    #[display("idle")]
    Idle,
    #[display("running pass")]
    RunningPass,
    #[display("sleeping")]
    Sleeping,
    #[display("stopped")]
    Stopped,
}

/// Runs a pass right away and then once per interval, until stopped or a fatal error occurs.
///
/// The interval is measured from the start of each pass. A pass that overruns the
/// interval is followed immediately by the next one; passes never overlap.
pub struct Scheduler {
    synchronizer: Synchronizer,
    interval: Duration,
    stop: StopToken,
    sink: Option<Arc<dyn EventSink>>,
    state: SchedulerState,
    passes: u64,
    last_report: Option<PassReport>,
}

impl Scheduler {
    pub fn new(synchronizer: Synchronizer, interval: Duration, stop: StopToken) -> Self {
        Self {
            synchronizer,
            interval,
            stop,
            sink: None,
            state: SchedulerState::Idle,
            passes: 0,
            last_report: None,
        }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Report of the most recent pass that got as far as applying actions.
    pub fn last_report(&self) -> Option<PassReport> {
        self.last_report
    }

    /// Returns the number of passes started before the loop stopped.
    pub async fn run(&mut self) -> Result<u64, SchedulerError> {
        info!(
            "Mirroring {} into {} every {}s",
            self.synchronizer.source_root().best_effort_path_display(),
            self.synchronizer.replica_root().best_effort_path_display(),
            self.interval.as_secs_f64()
        );

        while !self.stop.is_stopped() {
            self.transition(SchedulerState::RunningPass);
            let started = Instant::now();
            self.passes += 1;

            match self.synchronizer.run_pass(&self.stop).await {
                Ok(report) => {
                    if report.is_degraded() {
                        warn!(
                            "Pass {} finished degraded: {} of {} actions applied, {} failed, {} not attempted",
                            self.passes,
                            report.applied,
                            report.total(),
                            report.failed,
                            report.not_attempted
                        );
                    } else {
                        info!(
                            "Pass {} finished: {} of {} actions applied",
                            self.passes,
                            report.applied,
                            report.total()
                        );
                    }
                    self.last_report = Some(report);
                }
                Err(err) if err.is_fatal() => {
                    error!("Stopping after pass {}: {err}", self.passes);
                    self.transition(SchedulerState::Stopped);
                    return Err(err).context(FatalPassSnafu);
                }
                Err(err) => error!(
                    "Pass {} failed, retrying at the next interval: {err}",
                    self.passes
                ),
            }

            if let Some(reason) = self.sink.as_ref().and_then(|sink| sink.failure()) {
                error!("Stopping, the log file can no longer be written: {reason}");
                self.transition(SchedulerState::Stopped);
                return SinkBrokenSnafu { reason }.fail();
            }

            if self.stop.is_stopped() {
                break;
            }

            self.transition(SchedulerState::Sleeping);
            let remaining = self.interval.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                warn!(
                    "Pass {} took longer than the interval, starting the next one now",
                    self.passes
                );
                continue;
            }

            let stopped = pin!(self.stop.stopped());
            let sleep = pin!(compio::time::sleep(remaining));
            if let Either::Left(_) = select(stopped, sleep).await {
                debug!("Woken early by a stop request");
            }
        }

        self.transition(SchedulerState::Stopped);
        info!("Stopped after {} passes", self.passes);
        Ok(self.passes)
    }

    fn transition(&mut self, next: SchedulerState) {
        debug!("Scheduler: {} -> {}", self.state, next);
        self.state = next;
    }
}

#[derive(Debug, Snafu)]
pub enum SchedulerError {
    #[snafu(display("Synchronization cannot continue: {source}"))]
    FatalPassError { source: PassError },
    #[snafu(display("Log destination failed: {reason}"))]
    SinkBroken { reason: String },
}
