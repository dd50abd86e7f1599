//! Phase driver: decides, per phase, which actions of which Infos run.
//!
//! For every phase the host delivers, each active Info is walked in
//! enumeration order and its bucket for that phase in name order:
//!
//! - `ALWAYS` Infos run every action.
//! - `ON_CHANGE` Infos run an action when its name is not recorded for the
//!   group, or when the recorded fingerprint differs from the current one.
//!   A name recorded without a fingerprint counts as satisfied.
//! - Skipped actions are still marked executed, so they stay recorded.
//! - The first failure stops the Info for that phase; sibling Infos go on.
//!
//! After a terminal phase (`END` or any `*_FAILED`) the package record is
//! written once and each active Info's record is replaced with the actions
//! it executed during this attempt.

use serde::Serialize;

use crate::action::Action;
use crate::context::{InstallContext, ProgressEvent, SkipReason};
use crate::error::{FailureDetail, Result, UpgradeError};
use crate::info::UpgradeInfo;
use crate::status::{GroupStatus, StatusStore};
use crate::types::{InstallationMode, Phase};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ran,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub group: String,
    pub action: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
}

/// What happened during one phase call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub outcomes: Vec<ActionOutcome>,
    pub failures: Vec<FailureDetail>,
    /// True when status was written at the end of this phase.
    pub persisted: bool,
}

impl PhaseReport {
    fn new(phase: Phase) -> Self {
        Self {
            phase,
            outcomes: Vec::new(),
            failures: Vec::new(),
            persisted: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Names of the actions that ran, in execution order.
    pub fn ran(&self) -> Vec<&str> {
        self.with_outcome(Outcome::Ran)
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.with_outcome(Outcome::Skipped)
    }

    fn with_outcome(&self, outcome: Outcome) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.outcome == outcome)
            .map(|o| o.action.as_str())
            .collect()
    }

    /// `Err(PhaseFailed)` when any failure was recorded.
    pub fn into_result(self) -> Result<Self> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(UpgradeError::PhaseFailed {
                phase: self.phase,
                failures: self.failures,
            })
        }
    }

    fn record(&mut self, info: &UpgradeInfo, action: &Action, outcome: Outcome, reason: Option<SkipReason>) {
        self.outcomes.push(ActionOutcome {
            group: info.group().to_string(),
            action: action.name().to_string(),
            outcome,
            reason,
        });
    }
}

/// Result of [`UpgradeProcessor::initialize`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InitReport {
    pub active: Vec<String>,
    /// Infos excluded by their runmode filter.
    pub inactive: Vec<String>,
    /// Infos whose definition could not be loaded.
    pub failures: Vec<FailureDetail>,
}

/// Would an action run, and if not, why.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Run,
    Skip(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedAction {
    pub group: String,
    pub phase: Phase,
    pub action: String,
    pub decision: Decision,
}

/// Run-or-skip rule for one action against its group's record.
pub fn decide(mode: InstallationMode, recorded: Option<&GroupStatus>, action: &Action) -> Decision {
    if mode == InstallationMode::Always {
        return Decision::Run;
    }
    let Some(status) = recorded else {
        return Decision::Run;
    };
    if !status.actions.iter().any(|n| n == action.name()) {
        return Decision::Run;
    }
    match status.fingerprint_of(action.name()) {
        Some(fp) if fp != action.fingerprint() => Decision::Run,
        _ => Decision::Skip(SkipReason::Unchanged),
    }
}

// ---------------------------------------------------------------------------
// UpgradeProcessor
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct UpgradeProcessor {
    store: StatusStore,
    infos: Vec<UpgradeInfo>,
    init: InitReport,
}

impl UpgradeProcessor {
    pub fn new(store: StatusStore) -> Self {
        Self {
            store,
            infos: Vec::new(),
            init: InitReport::default(),
        }
    }

    /// Take the discovered Infos in host enumeration order and keep those
    /// that apply to `ctx`'s runmodes. Each entry pairs a group name with its
    /// load result; failed loads are reported and left out.
    pub fn initialize<I>(&mut self, infos: I, ctx: &InstallContext) -> &InitReport
    where
        I: IntoIterator<Item = (String, Result<UpgradeInfo>)>,
    {
        let mut report = InitReport::default();
        let mut active = Vec::new();
        for (group, loaded) in infos {
            match loaded {
                Ok(info) if info.applies_to_environment(ctx.runmodes()) => {
                    report.active.push(group);
                    active.push(info);
                }
                Ok(_) => {
                    ctx.emit(ProgressEvent::InfoSkipped {
                        group: &group,
                        reason: "runmode not active",
                    });
                    report.inactive.push(group);
                }
                Err(e) => {
                    let message = e.to_string();
                    ctx.emit(ProgressEvent::InfoSkipped {
                        group: &group,
                        reason: &message,
                    });
                    report.failures.push(FailureDetail {
                        group,
                        action: None,
                        phase: Phase::Prepare,
                        message,
                    });
                }
            }
        }
        self.infos = active;
        self.init = report;
        &self.init
    }

    pub fn init_report(&self) -> &InitReport {
        &self.init
    }

    /// Active Infos in enumeration order.
    pub fn infos(&self) -> &[UpgradeInfo] {
        &self.infos
    }

    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    /// What each phase would do right now, without running or recording
    /// anything.
    pub fn plan(&self) -> Vec<PlannedAction> {
        let mut planned = Vec::new();
        for phase in Phase::all() {
            for info in &self.infos {
                let recorded = self.store.group_status(info.group()).ok().flatten();
                for action in info.actions_for(*phase) {
                    planned.push(PlannedAction {
                        group: info.group().to_string(),
                        phase: *phase,
                        action: action.name().to_string(),
                        decision: decide(info.mode(), recorded.as_ref(), action),
                    });
                }
            }
        }
        planned
    }

    /// Process one phase delivered by the host.
    pub fn on_phase(&mut self, phase: Phase, ctx: &InstallContext) -> PhaseReport {
        let mut report = PhaseReport::new(phase);
        tracing::debug!(%phase, infos = self.infos.len(), "phase started");

        for info in &mut self.infos {
            run_info_phase(&self.store, info, phase, ctx, &mut report);
        }

        if phase.is_terminal() {
            self.persist(phase, ctx, &mut report);
        }
        report
    }

    fn persist(&mut self, phase: Phase, ctx: &InstallContext, report: &mut PhaseReport) {
        match self.store.update_general(ctx.version()) {
            Ok(()) => ctx.emit(ProgressEvent::StatusPersisted {
                group: None,
                count: self.infos.len(),
            }),
            Err(e) => report.failures.push(FailureDetail {
                group: ctx.package().to_string(),
                action: None,
                phase,
                message: e.to_string(),
            }),
        }

        for info in &self.infos {
            let executed = info.executed_actions();
            match self.store.update_group(info.group(), executed) {
                Ok(()) => ctx.emit(ProgressEvent::StatusPersisted {
                    group: Some(info.group()),
                    count: executed.len(),
                }),
                Err(e) => {
                    tracing::warn!(group = info.group(), error = %e, "failed to persist status");
                    report.failures.push(FailureDetail {
                        group: info.group().to_string(),
                        action: None,
                        phase,
                        message: e.to_string(),
                    });
                }
            }
        }
        report.persisted = true;
    }
}

fn run_info_phase(
    store: &StatusStore,
    info: &mut UpgradeInfo,
    phase: Phase,
    ctx: &InstallContext,
    report: &mut PhaseReport,
) {
    let actions = info.actions_for(phase).to_vec();
    if actions.is_empty() {
        return;
    }

    let recorded = match store.group_status(info.group()) {
        Ok(recorded) => recorded,
        Err(e) => {
            report.failures.push(FailureDetail {
                group: info.group().to_string(),
                action: None,
                phase,
                message: e.to_string(),
            });
            return;
        }
    };

    for action in &actions {
        let group = info.group().to_string();
        if info.has_executed(action.name()) {
            skip(ctx, report, info, action, phase, SkipReason::AlreadyRan);
            continue;
        }

        if let Decision::Skip(reason) = decide(info.mode(), recorded.as_ref(), action) {
            info.executed(action);
            skip(ctx, report, info, action, phase, reason);
            continue;
        }

        ctx.emit(ProgressEvent::ActionStarted {
            group: &group,
            action: action.name(),
            phase,
        });
        match action.execute(info.runner(), ctx) {
            Ok(response) => {
                info.executed(action);
                ctx.emit(ProgressEvent::ActionFinished {
                    group: &group,
                    action: action.name(),
                    phase,
                    output: &response.output,
                    duration_ms: response.duration_ms,
                });
                report.record(info, action, Outcome::Ran, None);
            }
            Err(e) => {
                let message = match e {
                    UpgradeError::ActionExecution { message, .. } => message,
                    other => other.to_string(),
                };
                ctx.emit(ProgressEvent::ActionFailed {
                    group: &group,
                    action: action.name(),
                    phase,
                    message: &message,
                });
                report.record(info, action, Outcome::Failed, None);
                report.failures.push(FailureDetail {
                    group,
                    action: Some(action.name().to_string()),
                    phase,
                    message,
                });
                return;
            }
        }
    }
}

fn skip(
    ctx: &InstallContext,
    report: &mut PhaseReport,
    info: &UpgradeInfo,
    action: &Action,
    phase: Phase,
    reason: SkipReason,
) {
    ctx.emit(ProgressEvent::ActionSkipped {
        group: info.group(),
        action: action.name(),
        phase,
        reason,
    });
    report.record(info, action, Outcome::Skipped, Some(reason));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
