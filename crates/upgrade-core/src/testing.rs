//! In-process doubles shared by the unit tests.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::context::{ProgressEvent, ProgressListener};
use crate::error::{Result, UpgradeError};
use crate::registry::RunnerRegistry;
use crate::repository::{MemoryRepository, StatusNode, StatusRepository};
use crate::runner::{ActionRunner, RunRequest, RunResponse};

/// Records the name of every action it is asked to run.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<String>>,
    fail: BTreeSet<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner that reports failure for the given action names.
    pub fn failing<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl ActionRunner for RecordingRunner {
    fn kind(&self) -> &str {
        "RECORDING"
    }

    fn run(&self, request: &RunRequest<'_>) -> Result<RunResponse> {
        self.calls.lock().unwrap().push(request.name.to_string());
        if self.fail.contains(request.name) {
            Ok(RunResponse::failure(format!("{} exploded", request.name)))
        } else {
            Ok(RunResponse::success(format!("ran {}", request.name)))
        }
    }
}

/// Default registry plus `RECORDING` bound to `runner`.
pub fn registry_with(runner: &Arc<RecordingRunner>) -> RunnerRegistry {
    let mut registry = RunnerRegistry::with_defaults();
    let shared = runner.clone();
    registry.register("RECORDING", move |_| {
        Ok(shared.clone() as Arc<dyn ActionRunner>)
    });
    registry
}

/// Memory repository whose reads or writes fail for paths ending in one of
/// `broken`.
#[derive(Debug, Default)]
pub struct FlakyRepository {
    inner: MemoryRepository,
    broken: Vec<String>,
    reads: bool,
}

impl FlakyRepository {
    pub fn failing_writes<I, S>(broken: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: MemoryRepository::new(),
            broken: broken.into_iter().map(Into::into).collect(),
            reads: false,
        }
    }

    pub fn failing_reads<I, S>(broken: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reads: true,
            ..Self::failing_writes(broken)
        }
    }

    fn is_broken(&self, path: &str) -> bool {
        self.broken.iter().any(|b| path.ends_with(b.as_str()))
    }
}

impl StatusRepository for FlakyRepository {
    fn read(&self, path: &str) -> Result<Option<StatusNode>> {
        if self.reads && self.is_broken(path) {
            return Err(UpgradeError::Persistence(format!("{path}: unreadable")));
        }
        self.inner.read(path)
    }

    fn write(&mut self, path: &str, node: &StatusNode) -> Result<()> {
        if !self.reads && self.is_broken(path) {
            return Err(UpgradeError::Persistence(format!("{path}: disk full")));
        }
        self.inner.write(path, node)
    }

    fn children(&self, path: &str) -> Result<Vec<String>> {
        self.inner.children(path)
    }
}

/// Collects a one-line summary per progress event.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressListener for RecordingListener {
    fn on_event(&self, event: &ProgressEvent<'_>) {
        let line = match *event {
            ProgressEvent::InfoSkipped { group, .. } => format!("info-skipped {group}"),
            ProgressEvent::ActionStarted { action, .. } => format!("started {action}"),
            ProgressEvent::ActionSkipped { action, .. } => format!("skipped {action}"),
            ProgressEvent::ActionFinished { action, .. } => format!("finished {action}"),
            ProgressEvent::ActionFailed { action, .. } => format!("failed {action}"),
            ProgressEvent::StatusPersisted { group, .. } => {
                format!("persisted {}", group.unwrap_or("<package>"))
            }
        };
        self.events.lock().unwrap().push(line);
    }
}
