//! One upgrade group: its configuration, its phase buckets, and what has been
//! executed for it during the current attempt.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::action::{Action, ActionDefinition};
use crate::config::InfoConfig;
use crate::error::{Result, UpgradeError};
use crate::paths::validate_group;
use crate::registry::RunnerRegistry;
use crate::runner::ActionRunner;
use crate::types::{InstallationMode, Phase, PhaseTable};

#[derive(Debug)]
pub struct UpgradeInfo {
    group: String,
    mode: InstallationMode,
    default_phase: Phase,
    runmodes: BTreeSet<String>,
    handler: String,
    data: Option<String>,
    runner: Arc<dyn ActionRunner>,
    actions: PhaseTable<Vec<Action>>,
    executed: Vec<Action>,
}

impl UpgradeInfo {
    /// Validate `config` and resolve its runner. The Info starts with no
    /// actions; see [`UpgradeInfo::load_actions`].
    pub fn new(group: &str, config: &InfoConfig, registry: &RunnerRegistry) -> Result<Self> {
        validate_group(group)?;
        let mode: InstallationMode = config.mode.parse()?;
        let default_phase: Phase = config.default_phase.parse()?;
        let runner = registry.create(config)?;
        Ok(Self {
            group: group.to_string(),
            mode,
            default_phase,
            runmodes: config.runmode_list().into_iter().collect(),
            handler: runner.kind().to_string(),
            data: config.data.clone(),
            runner,
            actions: PhaseTable::default(),
            executed: Vec::new(),
        })
    }

    /// Bucket `definitions` by phase and sort each bucket by name. Replaces
    /// any previously loaded actions.
    pub fn load_actions(&mut self, definitions: Vec<ActionDefinition>) -> Result<()> {
        let mut table: PhaseTable<Vec<Action>> = PhaseTable::default();
        let mut seen = BTreeSet::new();
        for mut def in definitions {
            if !seen.insert(def.name.clone()) {
                return Err(UpgradeError::DuplicateAction {
                    group: self.group.clone(),
                    name: def.name,
                });
            }
            if def.data.is_none() {
                def.data = self.data.clone();
            }
            let action = Action::from_definition(def, self.default_phase)?;
            table[action.phase()].push(action);
        }
        for (_, bucket) in table.iter_mut() {
            bucket.sort();
        }
        self.actions = table;
        Ok(())
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn mode(&self) -> InstallationMode {
        self.mode
    }

    pub fn default_phase(&self) -> Phase {
        self.default_phase
    }

    pub fn handler(&self) -> &str {
        &self.handler
    }

    pub fn runmodes(&self) -> &BTreeSet<String> {
        &self.runmodes
    }

    pub fn runner(&self) -> &dyn ActionRunner {
        self.runner.as_ref()
    }

    /// Ordered actions for `phase`; empty if there are none.
    pub fn actions_for(&self, phase: Phase) -> &[Action] {
        &self.actions[phase]
    }

    pub fn action_count(&self) -> usize {
        self.actions.iter().map(|(_, bucket)| bucket.len()).sum()
    }

    /// Mark `action` as executed in this attempt. Repeated calls are no-ops.
    pub fn executed(&mut self, action: &Action) {
        if !self.has_executed(action.name()) {
            self.executed.push(action.clone());
        }
    }

    pub fn has_executed(&self, name: &str) -> bool {
        self.executed.iter().any(|a| a.name() == name)
    }

    /// Actions marked executed so far, in the order they were marked.
    pub fn executed_actions(&self) -> &[Action] {
        &self.executed
    }

    /// True when the Info has no runmode filter, or shares at least one
    /// runmode with `active`.
    pub fn applies_to_environment(&self, active: &BTreeSet<String>) -> bool {
        self.runmodes.is_empty() || !self.runmodes.is_disjoint(active)
    }
}
