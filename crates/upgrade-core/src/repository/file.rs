//! Directory-tree repository: node `/a/b` lives in `<base>/a/b/.status.yaml`.

use std::path::{Path, PathBuf};

use crate::error::{Result, UpgradeError};
use crate::io::atomic_write;

use super::{path_segments, StatusNode, StatusRepository};

pub const NODE_FILE: &str = ".status.yaml";

#[derive(Debug, Clone)]
pub struct FileRepository {
    base: PathBuf,
}

impl FileRepository {
    /// Repository over `base`; nothing is created until the first write.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Like [`FileRepository::new`], creating `base` up front.
    pub fn open(base: impl Into<PathBuf>) -> Result<Self> {
        let base = base.into();
        crate::io::ensure_dir(&base)
            .map_err(|e| UpgradeError::Persistence(format!("{}: {e}", base.display())))?;
        Ok(Self { base })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn node_dir(&self, path: &str) -> Result<PathBuf> {
        let mut dir = self.base.clone();
        for segment in path_segments(path)? {
            dir.push(segment);
        }
        Ok(dir)
    }
}

impl StatusRepository for FileRepository {
    fn read(&self, path: &str) -> Result<Option<StatusNode>> {
        let file = self.node_dir(path)?.join(NODE_FILE);
        if !file.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&file)
            .map_err(|e| UpgradeError::Persistence(format!("{}: {e}", file.display())))?;
        let node: StatusNode = serde_yaml::from_str(&data)
            .map_err(|e| UpgradeError::Persistence(format!("{}: {e}", file.display())))?;
        Ok(Some(node))
    }

    fn write(&mut self, path: &str, node: &StatusNode) -> Result<()> {
        let file = self.node_dir(path)?.join(NODE_FILE);
        let data = serde_yaml::to_string(node)
            .map_err(|e| UpgradeError::Persistence(format!("{}: {e}", file.display())))?;
        atomic_write(&file, data.as_bytes())
            .map_err(|e| UpgradeError::Persistence(format!("{}: {e}", file.display())))
    }

    fn children(&self, path: &str) -> Result<Vec<String>> {
        let dir = self.node_dir(path)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| UpgradeError::Persistence(format!("{}: {e}", dir.display())))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| UpgradeError::Persistence(format!("{}: {e}", dir.display())))?;
            let child = entry.path();
            if child.join(NODE_FILE).is_file() {
                if let Some(name) = child.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
