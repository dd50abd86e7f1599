use crate::types::Phase;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("invalid phase: {0}")]
    InvalidPhase(String),

    #[error("invalid installation mode: {0}")]
    InvalidMode(String),

    #[error("invalid group name '{0}': must be alphanumeric with '.', '_' or '-'")]
    InvalidGroup(String),

    #[error("duplicate action '{name}' in '{group}'")]
    DuplicateAction { group: String, name: String },

    #[error("unknown handler '{0}'")]
    UnknownHandler(String),

    #[error("interpreter not found: {0}")]
    InterpreterNotFound(String),

    #[error("runner spawn failed: {0}")]
    RunnerSpawnFailed(String),

    #[error("action '{action}' failed in phase {phase}: {message}")]
    ActionExecution {
        action: String,
        phase: Phase,
        message: String,
    },

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("package not found: {0}")]
    PackageNotFound(String),

    #[error("phase {phase} failed: {}", FailureList(.failures))]
    PhaseFailed {
        phase: Phase,
        failures: Vec<FailureDetail>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl UpgradeError {
    /// True for errors caused by a malformed package or configuration.
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            UpgradeError::InvalidDefinition(_)
                | UpgradeError::InvalidPhase(_)
                | UpgradeError::InvalidMode(_)
                | UpgradeError::InvalidGroup(_)
                | UpgradeError::DuplicateAction { .. }
                | UpgradeError::UnknownHandler(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, UpgradeError>;

// ---------------------------------------------------------------------------
// FailureDetail
// ---------------------------------------------------------------------------

/// Operator-facing description of one failure inside a phase.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FailureDetail {
    pub group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub phase: Phase,
    pub message: String,
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            Some(action) => write!(
                f,
                "[{}] {} ({}): {}",
                self.group, action, self.phase, self.message
            ),
            None => write!(f, "[{}] ({}): {}", self.group, self.phase, self.message),
        }
    }
}

struct FailureList<'a>(&'a [FailureDetail]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_failed_lists_every_failure() {
        let err = UpgradeError::PhaseFailed {
            phase: Phase::Prepare,
            failures: vec![
                FailureDetail {
                    group: "content".into(),
                    action: Some("p1.sh".into()),
                    phase: Phase::Prepare,
                    message: "boom".into(),
                },
                FailureDetail {
                    group: "acl".into(),
                    action: None,
                    phase: Phase::Prepare,
                    message: "persistence error: disk full".into(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("phase PREPARE failed"), "{msg}");
        assert!(msg.contains("[content] p1.sh (PREPARE): boom"), "{msg}");
        assert!(msg.contains("[acl] (PREPARE): persistence error"), "{msg}");
    }

    #[test]
    fn definition_errors_are_classified() {
        assert!(UpgradeError::UnknownHandler("x".into()).is_definition_error());
        assert!(!UpgradeError::Persistence("x".into()).is_definition_error());
    }
}
