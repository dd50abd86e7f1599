//! Per-attempt context handed to every phase call.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::types::Phase;

/// Why an action was not executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Recorded with the same fingerprint (or with none) in the status store.
    Unchanged,
    /// Already executed earlier in this attempt.
    AlreadyRan,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::Unchanged => "unchanged",
            SkipReason::AlreadyRan => "already ran",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ProgressEvent<'a> {
    InfoSkipped {
        group: &'a str,
        reason: &'a str,
    },
    ActionStarted {
        group: &'a str,
        action: &'a str,
        phase: Phase,
    },
    ActionSkipped {
        group: &'a str,
        action: &'a str,
        phase: Phase,
        reason: SkipReason,
    },
    ActionFinished {
        group: &'a str,
        action: &'a str,
        phase: Phase,
        output: &'a str,
        duration_ms: u64,
    },
    ActionFailed {
        group: &'a str,
        action: &'a str,
        phase: Phase,
        message: &'a str,
    },
    /// `group` is `None` for the package-level record.
    StatusPersisted {
        group: Option<&'a str>,
        count: usize,
    },
}

pub trait ProgressListener: Send + Sync {
    fn on_event(&self, event: &ProgressEvent<'_>);
}

/// Default listener: forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl ProgressListener for TracingListener {
    fn on_event(&self, event: &ProgressEvent<'_>) {
        match *event {
            ProgressEvent::InfoSkipped { group, reason } => {
                tracing::info!(group, reason, "skipping upgrade group");
            }
            ProgressEvent::ActionStarted {
                group,
                action,
                phase,
            } => {
                tracing::debug!(group, action, %phase, "running action");
            }
            ProgressEvent::ActionSkipped {
                group,
                action,
                phase,
                reason,
            } => {
                tracing::debug!(group, action, %phase, reason = reason.as_str(), "action skipped");
            }
            ProgressEvent::ActionFinished {
                group,
                action,
                phase,
                output,
                duration_ms,
            } => {
                tracing::info!(group, action, %phase, duration_ms, output = output.trim(), "action executed");
            }
            ProgressEvent::ActionFailed {
                group,
                action,
                phase,
                message,
            } => {
                tracing::warn!(group, action, %phase, message, "action failed");
            }
            ProgressEvent::StatusPersisted { group, count } => match group {
                Some(group) => tracing::debug!(group, count, "group status persisted"),
                None => tracing::debug!("package status persisted"),
            },
        }
    }
}

#[derive(Clone)]
pub struct InstallContext {
    package: String,
    version: String,
    runmodes: BTreeSet<String>,
    workdir: Option<PathBuf>,
    listener: Arc<dyn ProgressListener>,
}

impl fmt::Debug for InstallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallContext")
            .field("package", &self.package)
            .field("version", &self.version)
            .field("runmodes", &self.runmodes)
            .field("workdir", &self.workdir)
            .finish_non_exhaustive()
    }
}

impl InstallContext {
    pub fn new(package: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            version: version.into(),
            runmodes: BTreeSet::new(),
            workdir: None,
            listener: Arc::new(TracingListener),
        }
    }

    pub fn with_runmodes<I, S>(mut self, runmodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runmodes = runmodes
            .into_iter()
            .map(Into::into)
            .map(|s: String| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn runmodes(&self) -> &BTreeSet<String> {
        &self.runmodes
    }

    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }

    pub fn emit(&self, event: ProgressEvent<'_>) {
        self.listener.on_event(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runmodes_are_trimmed() {
        let ctx = InstallContext::new("site", "1.0").with_runmodes([" author", "", "publish "]);
        let modes: Vec<&str> = ctx.runmodes().iter().map(String::as_str).collect();
        assert_eq!(modes, vec!["author", "publish"]);
    }
}
