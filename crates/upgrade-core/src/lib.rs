//! Idempotent, phase-bucketed upgrade actions.
//!
//! A package carries upgrade groups ([`UpgradeInfo`]), each holding named
//! actions bucketed by installation [`Phase`]. The [`UpgradeProcessor`] runs
//! them when the host fires a phase, and the [`StatusStore`] remembers what
//! ran (and with which content [`Fingerprint`]) so the next installation
//! only runs what is new or changed.

pub mod action;
pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod fingerprint;
pub mod info;
pub mod io;
pub mod lifecycle;
pub mod paths;
pub mod processor;
pub mod registry;
pub mod repository;
pub mod runner;
pub mod status;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use action::{Action, ActionDefinition};
pub use context::{InstallContext, ProgressEvent, ProgressListener, SkipReason, TracingListener};
pub use discovery::Package;
pub use error::{FailureDetail, Result, UpgradeError};
pub use fingerprint::Fingerprint;
pub use info::UpgradeInfo;
pub use lifecycle::{run_install, InstallSummary};
pub use processor::{Decision, PhaseReport, PlannedAction, UpgradeProcessor};
pub use registry::RunnerRegistry;
pub use status::StatusStore;
pub use types::{InstallationMode, Phase};
