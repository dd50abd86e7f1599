//! Durable record of what has run.
//!
//! Layout below the status root (`/var/upgrade/<package>`):
//!
//! ```text
//! <root>            version, upgraded
//! <root>/<group>    actions, fingerprints, updated
//! ```
//!
//! Each group node is written on its own, so a failed write for one group
//! never affects another.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::action::Action;
use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::paths::join_node_path;
use crate::repository::{StatusNode, StatusRepository};

pub const PROP_VERSION: &str = "version";
pub const PROP_UPGRADED: &str = "upgraded";
pub const PROP_ACTIONS: &str = "actions";
pub const PROP_FINGERPRINTS: &str = "fingerprints";
pub const PROP_UPDATED: &str = "updated";

/// Persisted state of one group, as read back from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupStatus {
    pub group: String,
    pub actions: Vec<String>,
    /// `(name, fingerprint)` for every name that has one recorded.
    pub fingerprints: Vec<(String, Fingerprint)>,
    pub updated: Option<DateTime<Utc>>,
}

impl GroupStatus {
    fn from_node(group: &str, node: &StatusNode) -> Self {
        let fingerprints = node
            .get_strings(PROP_FINGERPRINTS)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| {
                // Names may contain `=`; the hex digest never does.
                let (name, hex) = entry.rsplit_once('=')?;
                Some((name.to_string(), Fingerprint::from_hex(hex)))
            })
            .collect();
        Self {
            group: group.to_string(),
            actions: node.get_strings(PROP_ACTIONS).unwrap_or_default(),
            fingerprints,
            updated: node.get_time(PROP_UPDATED),
        }
    }

    pub fn fingerprint_of(&self, name: &str) -> Option<&Fingerprint> {
        self.fingerprints
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, fp)| fp)
    }
}

pub struct StatusStore {
    repo: Box<dyn StatusRepository>,
    root: String,
}

impl std::fmt::Debug for StatusStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusStore")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl StatusStore {
    /// Wrap `repo` without touching it. Use for read-only access.
    pub fn new(repo: impl StatusRepository + 'static, root: impl Into<String>) -> Self {
        Self {
            repo: Box::new(repo),
            root: root.into(),
        }
    }

    /// Open the store rooted at `root`, creating an empty root node if none
    /// exists yet.
    pub fn open(repo: impl StatusRepository + 'static, root: impl Into<String>) -> Result<Self> {
        let mut store = Self::new(repo, root);
        if store.repo.read(&store.root)?.is_none() {
            store.repo.write(&store.root, &StatusNode::new())?;
        }
        Ok(store)
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    fn group_path(&self, group: &str) -> String {
        join_node_path(&self.root, group)
    }

    fn root_node(&self) -> Result<StatusNode> {
        Ok(self.repo.read(&self.root)?.unwrap_or_default())
    }

    pub fn version(&self) -> Result<Option<String>> {
        Ok(self.root_node()?.get_string(PROP_VERSION).map(str::to_string))
    }

    pub fn upgrade_time(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.root_node()?.get_time(PROP_UPGRADED))
    }

    pub fn group_status(&self, group: &str) -> Result<Option<GroupStatus>> {
        Ok(self
            .repo
            .read(&self.group_path(group))?
            .map(|node| GroupStatus::from_node(group, &node)))
    }

    /// Groups that have a record, sorted.
    pub fn groups(&self) -> Result<Vec<String>> {
        self.repo.children(&self.root)
    }

    /// Whether `name` is in the recorded list for `group`. An unknown group
    /// has no executed actions.
    pub fn is_executed(&self, group: &str, name: &str) -> Result<bool> {
        Ok(self
            .group_status(group)?
            .is_some_and(|status| status.actions.iter().any(|a| a == name)))
    }

    /// Fingerprint recorded alongside `name`, if any. Records written without
    /// fingerprints return `None` even when the name is present.
    pub fn recorded_fingerprint(&self, group: &str, name: &str) -> Result<Option<Fingerprint>> {
        Ok(self
            .group_status(group)?
            .and_then(|status| status.fingerprint_of(name).cloned()))
    }

    /// Record the package version and stamp the upgrade time.
    pub fn update_general(&mut self, version: &str) -> Result<()> {
        let mut node = self.root_node()?;
        node.set_string(PROP_VERSION, version);
        node.set_time(PROP_UPGRADED, Utc::now());
        self.repo.write(&self.root, &node)
    }

    /// Replace the group's record with exactly `actions`, in order.
    pub fn update_group(&mut self, group: &str, actions: &[Action]) -> Result<()> {
        let mut node = StatusNode::new();
        node.set_strings(
            PROP_ACTIONS,
            actions.iter().map(|a| a.name().to_string()).collect(),
        );
        node.set_strings(
            PROP_FINGERPRINTS,
            actions
                .iter()
                .map(|a| format!("{}={}", a.name(), a.fingerprint()))
                .collect(),
        );
        node.set_time(PROP_UPDATED, Utc::now());
        let path = self.group_path(group);
        self.repo.write(&path, &node)?;
        tracing::debug!(group, path = %path, count = actions.len(), "group status written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{FileRepository, MemoryRepository};
    use crate::types::Phase;
    use tempfile::TempDir;

    fn action(name: &str, content: &str) -> Action {
        Action::new(name, Phase::Prepare, Fingerprint::of(content.as_bytes())).unwrap()
    }

    #[test]
    fn open_creates_root_node() {
        let store = StatusStore::open(MemoryRepository::new(), "/var/upgrade/site").unwrap();
        assert_eq!(store.version().unwrap(), None);
        assert!(store.groups().unwrap().is_empty());
    }

    #[test]
    fn new_does_not_write() {
        let dir = TempDir::new().unwrap();
        let store = StatusStore::new(FileRepository::new(dir.path().join("store")), "/var/upgrade/site");
        assert_eq!(store.version().unwrap(), None);
        assert!(store.groups().unwrap().is_empty());
        assert!(!dir.path().join("store").exists());
    }

    #[test]
    fn unknown_group_is_not_executed() {
        let store = StatusStore::open(MemoryRepository::new(), "/var/upgrade/site").unwrap();
        assert!(!store.is_executed("nope", "a.sh").unwrap());
        assert_eq!(store.recorded_fingerprint("nope", "a.sh").unwrap(), None);
    }

    #[test]
    fn update_group_overwrites() {
        let mut store = StatusStore::open(MemoryRepository::new(), "/var/upgrade/site").unwrap();
        store
            .update_group("content", &[action("x", "1"), action("y", "2")])
            .unwrap();
        store.update_group("content", &[action("y", "2")]).unwrap();

        let status = store.group_status("content").unwrap().unwrap();
        assert_eq!(status.actions, vec!["y"]);
        assert!(!store.is_executed("content", "x").unwrap());
        assert!(store.is_executed("content", "y").unwrap());
        assert_eq!(
            store.recorded_fingerprint("content", "y").unwrap(),
            Some(Fingerprint::of(b"2"))
        );
        assert!(status.updated.is_some());
    }

    #[test]
    fn groups_are_independent() {
        let mut store = StatusStore::open(MemoryRepository::new(), "/var/upgrade/site").unwrap();
        store.update_group("a", &[action("one", "1")]).unwrap();
        store.update_group("b", &[]).unwrap();
        assert_eq!(store.groups().unwrap(), vec!["a", "b"]);
        assert!(store.is_executed("a", "one").unwrap());
        assert!(!store.is_executed("b", "one").unwrap());
    }

    #[test]
    fn update_general_sets_version_and_time() {
        let dir = TempDir::new().unwrap();
        let repo = FileRepository::open(dir.path()).unwrap();
        let mut store = StatusStore::open(repo, "/var/upgrade/site").unwrap();
        store.update_general("2.1.0").unwrap();
        assert_eq!(store.version().unwrap().as_deref(), Some("2.1.0"));
        assert!(store.upgrade_time().unwrap().is_some());
    }

    #[test]
    fn name_only_record_has_no_fingerprint() {
        let mut repo = MemoryRepository::new();
        let mut node = StatusNode::new();
        node.set_strings(PROP_ACTIONS, vec!["legacy.sh".into()]);
        repo.write("/var/upgrade/site/content", &node).unwrap();

        let store = StatusStore::open(repo, "/var/upgrade/site").unwrap();
        assert!(store.is_executed("content", "legacy.sh").unwrap());
        assert_eq!(store.recorded_fingerprint("content", "legacy.sh").unwrap(), None);
    }

    #[test]
    fn fingerprint_survives_equals_in_name() {
        let mut store = StatusStore::open(MemoryRepository::new(), "/var/upgrade/site").unwrap();
        store
            .update_group("content", &[action("set=x.sh", "v1"), action("a=b=c", "v2")])
            .unwrap();

        assert_eq!(
            store.recorded_fingerprint("content", "set=x.sh").unwrap(),
            Some(Fingerprint::of(b"v1"))
        );
        let status = store.group_status("content").unwrap().unwrap();
        assert_eq!(status.fingerprint_of("a=b=c"), Some(&Fingerprint::of(b"v2")));
        assert_eq!(status.fingerprint_of("set"), None);
    }
}
