use crate::error::{Result, UpgradeError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Package layout
// ---------------------------------------------------------------------------

pub const MANIFEST_FILE: &str = "package.yaml";
pub const UPGRADES_DIR: &str = "upgrades";
pub const INFO_CONFIG_FILE: &str = "upgrade.yaml";

/// Default location of the file-backed status store inside a package.
pub const STATUS_DIR: &str = ".upgrade-status";
pub const STATUS_DB_FILE: &str = "status.redb";

/// Root under which every package keeps its status record.
pub const STATUS_ROOT: &str = "/var/upgrade";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn manifest_path(root: &Path) -> PathBuf {
    root.join(MANIFEST_FILE)
}

pub fn upgrades_dir(root: &Path) -> PathBuf {
    root.join(UPGRADES_DIR)
}

pub fn group_dir(root: &Path, group: &str) -> PathBuf {
    upgrades_dir(root).join(group)
}

pub fn default_status_dir(root: &Path) -> PathBuf {
    root.join(STATUS_DIR)
}

/// Status-store path of a package, e.g. `/var/upgrade/site-content`.
pub fn status_root(package: &str) -> String {
    join_node_path(STATUS_ROOT, package)
}

/// Join two hierarchical node paths with exactly one `/` between them.
pub fn join_node_path(parent: &str, child: &str) -> String {
    format!(
        "{}/{}",
        parent.trim_end_matches('/'),
        child.trim_start_matches('/')
    )
}

// ---------------------------------------------------------------------------
// Group validation
// ---------------------------------------------------------------------------

static GROUP_RE: OnceLock<Regex> = OnceLock::new();

fn group_re() -> &'static Regex {
    GROUP_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._\-]*$").unwrap())
}

/// Group and package names become path segments in the status store.
pub fn validate_group(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 128 || !group_re().is_match(name) {
        return Err(UpgradeError::InvalidGroup(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
