//! Drives a processor through one install attempt the way a package
//! installer would.

use serde::Serialize;

use crate::context::InstallContext;
use crate::error::{FailureDetail, Result, UpgradeError};
use crate::processor::{InitReport, PhaseReport, UpgradeProcessor};
use crate::types::Phase;

pub const INSTALL_PHASES: [Phase; 3] = [Phase::Prepare, Phase::Installed, Phase::End];

#[derive(Debug, Clone, Serialize)]
pub struct InstallSummary {
    pub package: String,
    pub version: String,
    pub init: InitReport,
    pub reports: Vec<PhaseReport>,
    /// The regular phase that failed, if any.
    pub failed_phase: Option<Phase>,
}

impl InstallSummary {
    pub fn is_success(&self) -> bool {
        self.failed_phase.is_none()
            && self.init.failures.is_empty()
            && self.reports.iter().all(PhaseReport::is_success)
    }

    pub fn failures(&self) -> Vec<FailureDetail> {
        self.init
            .failures
            .iter()
            .chain(self.reports.iter().flat_map(|r| r.failures.iter()))
            .cloned()
            .collect()
    }

    /// Names of every action that ran, across phases.
    pub fn ran(&self) -> Vec<&str> {
        self.reports.iter().flat_map(PhaseReport::ran).collect()
    }

    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let phase = self
            .failed_phase
            .or_else(|| self.reports.iter().find(|r| !r.is_success()).map(|r| r.phase))
            .unwrap_or(Phase::Prepare);
        Err(UpgradeError::PhaseFailed {
            phase,
            failures: self.failures(),
        })
    }
}

/// Fire PREPARE, INSTALLED and END in order. When a phase reports a
/// failure its failure phase is fired and the attempt stops there.
pub fn run_install(processor: &mut UpgradeProcessor, ctx: &InstallContext) -> InstallSummary {
    let mut summary = InstallSummary {
        package: ctx.package().to_string(),
        version: ctx.version().to_string(),
        init: processor.init_report().clone(),
        reports: Vec::new(),
        failed_phase: None,
    };

    for phase in INSTALL_PHASES {
        let report = processor.on_phase(phase, ctx);
        let failed = !report.is_success();
        summary.reports.push(report);
        if failed {
            tracing::warn!(%phase, "phase failed");
            summary.failed_phase = Some(phase);
            if let Some(failure_phase) = phase.failure_phase() {
                summary.reports.push(processor.on_phase(failure_phase, ctx));
            }
            break;
        }
    }
    summary
}
