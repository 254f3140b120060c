//! One-way mirroring of a source tree into a replica tree.
//!
//! A pass scans both trees, [`diff`]s the snapshots into an ordered list of
//! [`Action`]s and hands them to the [`Applier`]. The [`Scheduler`] repeats
//! passes on a fixed interval until its [`StopToken`] fires.

mod action;
mod applier;
mod diff;
mod pass;
mod scheduler;
mod stop;

pub use action::{Action, ActionKind};
pub use applier::{ApplyError, Applier, PassReport};
pub use diff::{DiffOptions, diff, diff_with};
pub use pass::{PassError, Synchronizer};
pub use scheduler::{EventSink, Scheduler, SchedulerError, SchedulerState};
pub use stop::StopToken;
