use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Installation lifecycle stages, in the order the host delivers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Prepare,
    PrepareFailed,
    Installed,
    InstallFailed,
    End,
    EndFailed,
}

/// Name prefixes that pin an action to a phase, longest first so that
/// `prepare-failed-x` is not read as `prepare`.
const PREFIX_TAGS: &[(&str, Phase)] = &[
    ("prepare-failed", Phase::PrepareFailed),
    ("install-failed", Phase::InstallFailed),
    ("end-failed", Phase::EndFailed),
    ("installed", Phase::Installed),
    ("prepare", Phase::Prepare),
    ("install", Phase::Installed),
    ("end", Phase::End),
];

impl Phase {
    pub const COUNT: usize = 6;

    pub const ALL: [Phase; Phase::COUNT] = [
        Phase::Prepare,
        Phase::PrepareFailed,
        Phase::Installed,
        Phase::InstallFailed,
        Phase::End,
        Phase::EndFailed,
    ];

    pub fn all() -> &'static [Phase] {
        &Self::ALL
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Prepare => "PREPARE",
            Phase::PrepareFailed => "PREPARE_FAILED",
            Phase::Installed => "INSTALLED",
            Phase::InstallFailed => "INSTALL_FAILED",
            Phase::End => "END",
            Phase::EndFailed => "END_FAILED",
        }
    }

    /// The phase the host fires when this one fails.
    pub fn failure_phase(self) -> Option<Phase> {
        match self {
            Phase::Prepare => Some(Phase::PrepareFailed),
            Phase::Installed => Some(Phase::InstallFailed),
            Phase::End => Some(Phase::EndFailed),
            _ => None,
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Phase::PrepareFailed | Phase::InstallFailed | Phase::EndFailed
        )
    }

    /// Phases after which an install attempt is over and status is persisted.
    pub fn is_terminal(self) -> bool {
        self == Phase::End || self.is_failure()
    }

    /// Resolve the phase an action named `name` belongs to.
    ///
    /// A name starting with a phase tag followed by `-` or `_` (for example
    /// `install-foo`) selects that phase; anything else falls back to
    /// `default`.
    pub fn from_prefix(default: Phase, name: &str) -> Phase {
        let lower = name.to_ascii_lowercase().replace('_', "-");
        for (tag, phase) in PREFIX_TAGS {
            if let Some(rest) = lower.strip_prefix(tag) {
                if rest.starts_with('-') {
                    return *phase;
                }
            }
        }
        default
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = crate::error::UpgradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "PREPARE" => Ok(Phase::Prepare),
            "PREPARE_FAILED" => Ok(Phase::PrepareFailed),
            "INSTALLED" | "INSTALL" => Ok(Phase::Installed),
            "INSTALL_FAILED" => Ok(Phase::InstallFailed),
            "END" => Ok(Phase::End),
            "END_FAILED" => Ok(Phase::EndFailed),
            _ => Err(crate::error::UpgradeError::InvalidPhase(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// PhaseTable
// ---------------------------------------------------------------------------

/// Fixed-size table with one slot per [`Phase`]. Every phase is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTable<T>([T; Phase::COUNT]);

impl<T> PhaseTable<T> {
    pub fn from_fn(mut f: impl FnMut(Phase) -> T) -> Self {
        Self(std::array::from_fn(|i| f(Phase::ALL[i])))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Phase, &T)> {
        Phase::ALL.iter().copied().zip(self.0.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Phase, &mut T)> {
        Phase::ALL.iter().copied().zip(self.0.iter_mut())
    }
}

impl<T: Default> Default for PhaseTable<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T> Index<Phase> for PhaseTable<T> {
    type Output = T;

    fn index(&self, phase: Phase) -> &T {
        &self.0[phase.index()]
    }
}

impl<T> IndexMut<Phase> for PhaseTable<T> {
    fn index_mut(&mut self, phase: Phase) -> &mut T {
        &mut self.0[phase.index()]
    }
}

// ---------------------------------------------------------------------------
// InstallationMode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallationMode {
    /// Run new or changed actions only.
    #[default]
    OnChange,
    /// Run every action on every installation.
    Always,
}

impl InstallationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            InstallationMode::OnChange => "ON_CHANGE",
            InstallationMode::Always => "ALWAYS",
        }
    }
}

impl fmt::Display for InstallationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InstallationMode {
    type Err = crate::error::UpgradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "ON_CHANGE" => Ok(InstallationMode::OnChange),
            "ALWAYS" => Ok(InstallationMode::Always),
            _ => Err(crate::error::UpgradeError::InvalidMode(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
