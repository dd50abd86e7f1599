use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use crate::context::InstallContext;
use crate::error::{Result, UpgradeError};
use crate::fingerprint::Fingerprint;
use crate::runner::{ActionRunner, RunRequest, RunResponse};
use crate::types::Phase;

/// Raw action as produced by discovery, before its phase is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDefinition {
    pub name: String,
    pub content: Vec<u8>,
    pub data: Option<String>,
    /// Explicit phase; wins over the name prefix when present.
    pub phase_hint: Option<String>,
    pub source: Option<PathBuf>,
}

impl ActionDefinition {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            data: None,
            phase_hint: None,
            source: None,
        }
    }

    pub fn with_phase_hint(mut self, phase: impl Into<String>) -> Self {
        self.phase_hint = Some(phase.into());
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// One named unit of upgrade work. Identity and ordering are by name only.
#[derive(Debug, Clone)]
pub struct Action {
    name: String,
    phase: Phase,
    fingerprint: Fingerprint,
    content: Vec<u8>,
    data: Option<String>,
    source: Option<PathBuf>,
}

impl Action {
    pub fn new(name: impl Into<String>, phase: Phase, fingerprint: Fingerprint) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(UpgradeError::InvalidDefinition(
                "action name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            name,
            phase,
            fingerprint,
            content: Vec::new(),
            data: None,
            source: None,
        })
    }

    /// Build an action from its definition, resolving the phase from the
    /// hint, then the name prefix, then `default_phase`.
    pub fn from_definition(def: ActionDefinition, default_phase: Phase) -> Result<Self> {
        let phase = match def.phase_hint.as_deref() {
            Some(hint) => hint.parse().map_err(|_| {
                UpgradeError::InvalidDefinition(format!(
                    "action '{}': unknown phase '{hint}'",
                    def.name
                ))
            })?,
            None => Phase::from_prefix(default_phase, &def.name),
        };
        let fingerprint = Fingerprint::of(&def.content);
        let mut action = Self::new(def.name, phase, fingerprint)?;
        action.content = def.content;
        action.data = def.data;
        action.source = def.source;
        Ok(action)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Hand the action to `runner`. A runner error or a non-blank error
    /// detail becomes [`UpgradeError::ActionExecution`].
    pub fn execute(&self, runner: &dyn ActionRunner, ctx: &InstallContext) -> Result<RunResponse> {
        let request = RunRequest {
            name: &self.name,
            phase: self.phase,
            content: &self.content,
            data: self.data.as_deref(),
            source: self.source.as_deref(),
            workdir: ctx.workdir(),
        };
        let response = runner
            .run(&request)
            .map_err(|e| self.execution_error(e.to_string()))?;
        if response.is_failure() {
            let detail = response.error_detail.as_deref().unwrap_or_default().trim();
            return Err(self.execution_error(detail.to_string()));
        }
        Ok(response)
    }

    fn execution_error(&self, message: String) -> UpgradeError {
        UpgradeError::ActionExecution {
            action: self.name.clone(),
            phase: self.phase,
            message,
        }
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Action {}

impl PartialOrd for Action {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Action {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRunner;

    #[test]
    fn empty_name_rejected() {
        let err = Action::new("  ", Phase::Prepare, Fingerprint::of(b"")).unwrap_err();
        assert!(matches!(err, UpgradeError::InvalidDefinition(_)));
    }

    #[test]
    fn phase_from_prefix_or_default() {
        let a = Action::from_definition(ActionDefinition::new("install-foo", "x"), Phase::Prepare)
            .unwrap();
        assert_eq!(a.phase(), Phase::Installed);
        let b = Action::from_definition(ActionDefinition::new("foo", "x"), Phase::Prepare).unwrap();
        assert_eq!(b.phase(), Phase::Prepare);
    }

    #[test]
    fn phase_hint_wins_over_prefix() {
        let def = ActionDefinition::new("install-foo", "x").with_phase_hint("end");
        let a = Action::from_definition(def, Phase::Prepare).unwrap();
        assert_eq!(a.phase(), Phase::End);

        let def = ActionDefinition::new("foo", "x").with_phase_hint("sometime");
        let err = Action::from_definition(def, Phase::Prepare).unwrap_err();
        assert!(err.is_definition_error());
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = Action::from_definition(ActionDefinition::new("a", "echo 1"), Phase::End).unwrap();
        assert_eq!(a.fingerprint(), &Fingerprint::of(b"echo 1"));
    }

    #[test]
    fn ordering_is_by_name() {
        let mut actions: Vec<Action> = ["b", "a", "c"]
            .iter()
            .map(|n| Action::new(*n, Phase::Prepare, Fingerprint::of(b"")).unwrap())
            .collect();
        actions.sort();
        let names: Vec<&str> = actions.iter().map(Action::name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        let upper = Action::new("B", Phase::Prepare, Fingerprint::of(b"")).unwrap();
        let lower = Action::new("a", Phase::Prepare, Fingerprint::of(b"")).unwrap();
        assert!(upper < lower);
    }

    #[test]
    fn execute_maps_failure_detail() {
        let runner = RecordingRunner::failing(["bad"]);
        let ctx = InstallContext::new("site", "1.0");
        let ok = Action::new("good", Phase::Prepare, Fingerprint::of(b"")).unwrap();
        assert!(ok.execute(&runner, &ctx).is_ok());

        let bad = Action::new("bad", Phase::Installed, Fingerprint::of(b"")).unwrap();
        match bad.execute(&runner, &ctx).unwrap_err() {
            UpgradeError::ActionExecution {
                action,
                phase,
                message,
            } => {
                assert_eq!(action, "bad");
                assert_eq!(phase, Phase::Installed);
                assert!(message.contains("bad"), "{message}");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(runner.calls(), vec!["good", "bad"]);
    }
}
