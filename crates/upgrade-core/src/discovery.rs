//! Reads a package directory into Infos and action definitions.
//!
//! ```text
//! <package>/package.yaml
//! <package>/upgrades/<group>/upgrade.yaml
//! <package>/upgrades/<group>/<action files>
//! ```

use std::path::{Path, PathBuf};

use crate::action::ActionDefinition;
use crate::config::{InfoConfig, PackageManifest};
use crate::error::Result;
use crate::info::UpgradeInfo;
use crate::paths;
use crate::registry::RunnerRegistry;

#[derive(Debug, Clone)]
pub struct Package {
    root: PathBuf,
    manifest: PackageManifest,
}

impl Package {
    pub fn open(root: &Path) -> Result<Self> {
        let manifest = PackageManifest::load(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            manifest,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    pub fn manifest(&self) -> &PackageManifest {
        &self.manifest
    }

    /// Node path of the package record, `/var/upgrade/<name>`.
    pub fn status_root(&self) -> String {
        paths::status_root(&self.manifest.name)
    }

    /// Group directory names below `upgrades/`, in lexical order.
    pub fn groups(&self) -> Result<Vec<String>> {
        let dir = paths::upgrades_dir(&self.root);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut groups = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            groups.push(name);
        }
        groups.sort();
        Ok(groups)
    }

    pub fn group_config(&self, group: &str) -> Result<InfoConfig> {
        InfoConfig::load(&paths::group_dir(&self.root, group))
    }

    /// Every regular, non-hidden file of the group except `upgrade.yaml`.
    pub fn definitions(&self, group: &str, config: &InfoConfig) -> Result<Vec<ActionDefinition>> {
        let dir = paths::group_dir(&self.root, group);
        let mut files: Vec<(String, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || name == paths::INFO_CONFIG_FILE {
                continue;
            }
            files.push((name, entry.path()));
        }
        files.sort();

        let mut defs = Vec::with_capacity(files.len());
        for (name, path) in files {
            let content = std::fs::read(&path)?;
            let mut def = ActionDefinition::new(name, content).with_source(path);
            if let Some(hint) = config.phases.get(&def.name) {
                def = def.with_phase_hint(hint.clone());
            }
            defs.push(def);
        }
        Ok(defs)
    }

    /// Build one Info with its actions loaded.
    pub fn load_info(&self, group: &str, registry: &RunnerRegistry) -> Result<UpgradeInfo> {
        let config = self.group_config(group)?;
        let mut info = UpgradeInfo::new(group, &config, registry)?;
        info.load_actions(self.definitions(group, &config)?)?;
        tracing::debug!(group, actions = info.action_count(), handler = info.handler(), "info loaded");
        Ok(info)
    }

    /// Every group paired with its load result, in enumeration order. Only
    /// failing to list the groups is an error here.
    pub fn load_infos(&self, registry: &RunnerRegistry) -> Result<Vec<(String, Result<UpgradeInfo>)>> {
        Ok(self
            .groups()?
            .into_iter()
            .map(|group| {
                let loaded = self.load_info(&group, registry);
                (group, loaded)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpgradeError;
    use crate::types::Phase;
    use tempfile::TempDir;

    fn package(dir: &Path) -> Package {
        std::fs::write(dir.join("package.yaml"), "name: site\nversion: 1.2.0\n").unwrap();
        Package::open(dir).unwrap()
    }

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn manifest_and_status_root() {
        let dir = TempDir::new().unwrap();
        let pkg = package(dir.path());
        assert_eq!(pkg.name(), "site");
        assert_eq!(pkg.version(), "1.2.0");
        assert_eq!(pkg.status_root(), "/var/upgrade/site");
        assert!(pkg.groups().unwrap().is_empty());
    }

    #[test]
    fn groups_in_lexical_order() {
        let dir = TempDir::new().unwrap();
        let pkg = package(dir.path());
        write(dir.path(), "upgrades/zeta/a.sh", "");
        write(dir.path(), "upgrades/alpha/a.sh", "");
        write(dir.path(), "upgrades/.hidden/a.sh", "");
        write(dir.path(), "upgrades/stray.txt", "");
        assert_eq!(pkg.groups().unwrap(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn definitions_skip_config_and_hidden() {
        let dir = TempDir::new().unwrap();
        let pkg = package(dir.path());
        write(dir.path(), "upgrades/content/upgrade.yaml", "phases:\n  fix.sh: end\n");
        write(dir.path(), "upgrades/content/b.sh", "echo b");
        write(dir.path(), "upgrades/content/fix.sh", "echo fix");
        write(dir.path(), "upgrades/content/.swp", "junk");

        let config = pkg.group_config("content").unwrap();
        let defs = pkg.definitions("content", &config).unwrap();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["b.sh", "fix.sh"]);
        assert_eq!(defs[0].content, b"echo b");
        assert_eq!(defs[1].phase_hint.as_deref(), Some("end"));
        assert!(defs[0].source.as_ref().unwrap().ends_with("upgrades/content/b.sh"));
    }

    #[test]
    fn load_infos_keeps_going_past_bad_group() {
        let dir = TempDir::new().unwrap();
        let pkg = package(dir.path());
        write(dir.path(), "upgrades/bad/upgrade.yaml", "handler: nonsense\n");
        write(dir.path(), "upgrades/bad/a.sh", "true");
        write(dir.path(), "upgrades/good/install-a.sh", "true");

        let infos = pkg.load_infos(&RunnerRegistry::with_defaults()).unwrap();
        assert_eq!(infos.len(), 2);
        assert!(matches!(infos[0].1, Err(UpgradeError::UnknownHandler(_))));
        let good = infos[1].1.as_ref().unwrap();
        assert_eq!(good.actions_for(Phase::Installed).len(), 1);
    }

    #[test]
    fn missing_manifest() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Package::open(dir.path()),
            Err(UpgradeError::PackageNotFound(_))
        ));
    }
}
