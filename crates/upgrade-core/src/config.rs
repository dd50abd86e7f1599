use crate::error::{Result, UpgradeError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Runmodes
// ---------------------------------------------------------------------------

/// `runmodes` may be written as a single string or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Runmodes {
    One(String),
    Many(Vec<String>),
}

impl Runmodes {
    /// Trimmed, non-empty runmode names.
    pub fn to_vec(&self) -> Vec<String> {
        let raw: Vec<&String> = match self {
            Runmodes::One(s) => vec![s],
            Runmodes::Many(v) => v.iter().collect(),
        };
        raw.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// InfoConfig
// ---------------------------------------------------------------------------

pub const DEFAULT_HANDLER: &str = "SCRIPT";
pub const DEFAULT_PHASE: &str = "PREPARE";
pub const DEFAULT_MODE: &str = "ON_CHANGE";

/// Per-group configuration read from `upgrade.yaml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoConfig {
    #[serde(default = "default_handler")]
    pub handler: String,
    #[serde(default = "default_phase")]
    pub default_phase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runmodes: Option<Runmodes>,
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Auxiliary data handed to the runner with every action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Interpreter for the `SCRIPT` handler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,
    /// Console program for the `CONSOLE` handler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console: Option<String>,
    /// Explicit phase per action name; wins over the name prefix.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub phases: BTreeMap<String, String>,
}

fn default_handler() -> String {
    DEFAULT_HANDLER.to_string()
}

fn default_phase() -> String {
    DEFAULT_PHASE.to_string()
}

fn default_mode() -> String {
    DEFAULT_MODE.to_string()
}

impl Default for InfoConfig {
    fn default() -> Self {
        Self {
            handler: default_handler(),
            default_phase: default_phase(),
            runmodes: None,
            mode: default_mode(),
            data: None,
            interpreter: None,
            console: None,
            phases: BTreeMap::new(),
        }
    }
}

impl InfoConfig {
    /// Load `upgrade.yaml` from a group directory; a missing file means defaults.
    pub fn load(group_dir: &Path) -> Result<Self> {
        let path = group_dir.join(paths::INFO_CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: InfoConfig = serde_yaml::from_str(&data).map_err(|e| {
            UpgradeError::InvalidDefinition(format!("{}: {e}", path.display()))
        })?;
        Ok(cfg)
    }

    pub fn runmode_list(&self) -> Vec<String> {
        self.runmodes.as_ref().map(Runmodes::to_vec).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// PackageManifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageManifest {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

impl PackageManifest {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::manifest_path(root);
        if !path.exists() {
            return Err(UpgradeError::PackageNotFound(root.display().to_string()));
        }
        let data = std::fs::read_to_string(&path)?;
        let manifest: PackageManifest = serde_yaml::from_str(&data)?;
        paths::validate_group(&manifest.name)?;
        Ok(manifest)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
