//! Hierarchical key-value storage for status records.
//!
//! A [`StatusNode`] is a small property bag (strings, string lists and
//! timestamps) addressed by a slash-separated path such as
//! `/var/upgrade/site-content/acl`. The status store only ever reads whole
//! nodes and overwrites whole nodes, so every backend gets per-node atomic
//! replacement and independent nodes never share a write.

pub mod db;
pub mod file;

pub use db::DbRepository;
pub use file::FileRepository;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, UpgradeError};

// ---------------------------------------------------------------------------
// PropertyValue / StatusNode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    String(String),
    Strings(Vec<String>),
    Time(DateTime<Utc>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusNode {
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

impl StatusNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.properties.get(key) {
            Some(PropertyValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// A single string reads as a one-element list.
    pub fn get_strings(&self, key: &str) -> Option<Vec<String>> {
        match self.properties.get(key) {
            Some(PropertyValue::Strings(v)) => Some(v.clone()),
            Some(PropertyValue::String(s)) => Some(vec![s.clone()]),
            _ => None,
        }
    }

    pub fn get_time(&self, key: &str) -> Option<DateTime<Utc>> {
        match self.properties.get(key) {
            Some(PropertyValue::Time(t)) => Some(*t),
            _ => None,
        }
    }

    pub fn set_string(&mut self, key: &str, value: impl Into<String>) {
        self.properties
            .insert(key.to_string(), PropertyValue::String(value.into()));
    }

    pub fn set_strings(&mut self, key: &str, values: Vec<String>) {
        self.properties
            .insert(key.to_string(), PropertyValue::Strings(values));
    }

    pub fn set_time(&mut self, key: &str, value: DateTime<Utc>) {
        self.properties
            .insert(key.to_string(), PropertyValue::Time(value));
    }
}

// ---------------------------------------------------------------------------
// StatusRepository
// ---------------------------------------------------------------------------

/// Storage adapter behind the status store.
pub trait StatusRepository: Send {
    /// Read the node at `path`; `None` if it was never written.
    fn read(&self, path: &str) -> Result<Option<StatusNode>>;

    /// Replace the node at `path` with `node`.
    fn write(&mut self, path: &str, node: &StatusNode) -> Result<()>;

    /// Names of the nodes directly below `path`, sorted.
    fn children(&self, path: &str) -> Result<Vec<String>>;
}

impl<R: StatusRepository + ?Sized> StatusRepository for Box<R> {
    fn read(&self, path: &str) -> Result<Option<StatusNode>> {
        (**self).read(path)
    }

    fn write(&mut self, path: &str, node: &StatusNode) -> Result<()> {
        (**self).write(path, node)
    }

    fn children(&self, path: &str) -> Result<Vec<String>> {
        (**self).children(path)
    }
}

/// Split a node path into its segments, rejecting `.`/`..` segments.
pub(crate) fn path_segments(path: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.iter().any(|s| *s == "." || *s == "..") {
        return Err(UpgradeError::Persistence(format!(
            "invalid node path '{path}'"
        )));
    }
    Ok(segments)
}

pub(crate) fn normalize(path: &str) -> Result<String> {
    Ok(format!("/{}", path_segments(path)?.join("/")))
}

// ---------------------------------------------------------------------------
// MemoryRepository
// ---------------------------------------------------------------------------

/// Process-local repository, used for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    nodes: BTreeMap<String, StatusNode>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusRepository for MemoryRepository {
    fn read(&self, path: &str) -> Result<Option<StatusNode>> {
        Ok(self.nodes.get(&normalize(path)?).cloned())
    }

    fn write(&mut self, path: &str, node: &StatusNode) -> Result<()> {
        self.nodes.insert(normalize(path)?, node.clone());
        Ok(())
    }

    fn children(&self, path: &str) -> Result<Vec<String>> {
        let parent = normalize(path)?;
        let prefix = if parent == "/" {
            parent
        } else {
            format!("{parent}/")
        };
        let mut names: Vec<String> = self
            .nodes
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
