//! Status nodes stored in a single redb table.
//!
//! # Table design
//!
//! ```text
//! key:   normalized node path, e.g. "/var/upgrade/site/acl"
//! value: JSON-encoded StatusNode
//! ```
//!
//! Keys sort lexically, so the direct children of a node are found by a range
//! scan starting at `"<path>/"` and stopping at the first key outside it.

use std::path::Path;

use redb::{Database, TableDefinition};

use crate::error::{Result, UpgradeError};

use super::{normalize, StatusNode, StatusRepository};

const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

fn db_err(e: impl std::fmt::Display) -> UpgradeError {
    UpgradeError::Persistence(e.to_string())
}

pub struct DbRepository {
    db: Database,
}

impl std::fmt::Debug for DbRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbRepository").finish_non_exhaustive()
    }
}

impl DbRepository {
    /// Open or create the database at `path`, creating the `nodes` table.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(db_err)?;
        }
        let db = Database::create(path).map_err(db_err)?;
        let wt = db.begin_write().map_err(db_err)?;
        wt.open_table(NODES).map_err(db_err)?;
        wt.commit().map_err(db_err)?;
        Ok(Self { db })
    }
}

impl StatusRepository for DbRepository {
    fn read(&self, path: &str) -> Result<Option<StatusNode>> {
        let key = normalize(path)?;
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(NODES).map_err(db_err)?;
        match table.get(key.as_str()).map_err(db_err)? {
            Some(guard) => {
                let node: StatusNode = serde_json::from_slice(guard.value()).map_err(db_err)?;
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    fn write(&mut self, path: &str, node: &StatusNode) -> Result<()> {
        let key = normalize(path)?;
        let value = serde_json::to_vec(node).map_err(db_err)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(NODES).map_err(db_err)?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    fn children(&self, path: &str) -> Result<Vec<String>> {
        let parent = normalize(path)?;
        let prefix = if parent == "/" {
            parent
        } else {
            format!("{parent}/")
        };
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(NODES).map_err(db_err)?;

        let mut names = Vec::new();
        for entry in table.range(prefix.as_str()..).map_err(db_err)? {
            let (key, _) = entry.map_err(db_err)?;
            let key = key.value();
            let Some(rest) = key.strip_prefix(prefix.as_str()) else {
                break;
            };
            if !rest.is_empty() && !rest.contains('/') {
                names.push(rest.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, DbRepository) {
        let dir = TempDir::new().unwrap();
        let repo = DbRepository::open(&dir.path().join("status.redb")).unwrap();
        (dir, repo)
    }

    #[test]
    fn write_then_read() {
        let (_dir, mut repo) = open_temp();
        let mut node = StatusNode::new();
        node.set_strings("actions", vec!["p1.sh".into(), "p2.sh".into()]);
        node.set_time("updated", Utc::now());
        repo.write("/var/upgrade/site/content", &node).unwrap();

        assert_eq!(repo.read("/var/upgrade/site/content/").unwrap(), Some(node));
        assert_eq!(repo.read("/var/upgrade/site/acl").unwrap(), None);
    }

    #[test]
    fn write_overwrites() {
        let (_dir, mut repo) = open_temp();
        let mut node = StatusNode::new();
        node.set_string("version", "1.0");
        repo.write("/root", &node).unwrap();
        node.set_string("version", "2.0");
        repo.write("/root", &node).unwrap();
        let read = repo.read("/root").unwrap().unwrap();
        assert_eq!(read.get_string("version"), Some("2.0"));
    }

    #[test]
    fn children_skip_grandchildren_and_siblings() {
        let (_dir, mut repo) = open_temp();
        for path in [
            "/var/upgrade/site",
            "/var/upgrade/site/b",
            "/var/upgrade/site/a",
            "/var/upgrade/site/a/deep",
            "/var/upgrade/site-other/z",
        ] {
            repo.write(path, &StatusNode::new()).unwrap();
        }
        assert_eq!(repo.children("/var/upgrade/site").unwrap(), vec!["a", "b"]);
        assert!(repo.children("/nothing").unwrap().is_empty());
    }

    #[test]
    fn reopen_keeps_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("status.redb");
        {
            let mut repo = DbRepository::open(&path).unwrap();
            let mut node = StatusNode::new();
            node.set_string("version", "3.2");
            repo.write("/pkg", &node).unwrap();
        }
        let repo = DbRepository::open(&path).unwrap();
        let node = repo.read("/pkg").unwrap().unwrap();
        assert_eq!(node.get_string("version"), Some("3.2"));
    }
}
