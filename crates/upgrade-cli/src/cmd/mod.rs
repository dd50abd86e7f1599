pub mod install;
pub mod list;
pub mod plan;
pub mod status;

use anyhow::Context;
use clap::ValueEnum;
use std::path::PathBuf;
use upgrade_core::paths::{default_status_dir, STATUS_DB_FILE};
use upgrade_core::repository::{DbRepository, FileRepository, MemoryRepository};
use upgrade_core::{InstallContext, Package, StatusStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// One YAML file per status node
    File,
    /// Embedded redb database
    Db,
}

/// Global options shared by every command.
#[derive(Debug)]
pub struct Settings {
    pub package: PathBuf,
    pub store: Option<PathBuf>,
    pub backend: Backend,
    pub json: bool,
}

impl Settings {
    pub fn store_dir(&self) -> PathBuf {
        self.store
            .clone()
            .unwrap_or_else(|| default_status_dir(&self.package))
    }

    pub fn open_package(&self) -> anyhow::Result<Package> {
        Package::open(&self.package)
            .with_context(|| format!("failed to open package at {}", self.package.display()))
    }

    /// Store for an install attempt; created on first use.
    pub fn open_store(&self, package: &Package) -> anyhow::Result<StatusStore> {
        let dir = self.store_dir();
        let root = package.status_root();
        let store = match self.backend {
            Backend::File => StatusStore::open(FileRepository::open(&dir)?, root),
            Backend::Db => StatusStore::open(DbRepository::open(&dir.join(STATUS_DB_FILE))?, root),
        };
        store.with_context(|| format!("failed to open status store at {}", dir.display()))
    }

    /// Store for inspection only; never creates or writes anything.
    pub fn read_store(&self, package: &Package) -> anyhow::Result<StatusStore> {
        let dir = self.store_dir();
        let root = package.status_root();
        Ok(match self.backend {
            Backend::File => StatusStore::new(FileRepository::new(&dir), root),
            Backend::Db => {
                let db = dir.join(STATUS_DB_FILE);
                if db.is_file() {
                    let repo = DbRepository::open(&db)
                        .with_context(|| format!("failed to open {}", db.display()))?;
                    StatusStore::new(repo, root)
                } else {
                    StatusStore::new(MemoryRepository::new(), root)
                }
            }
        })
    }
}

pub fn install_context(
    package: &Package,
    runmodes: Vec<String>,
    version: Option<&str>,
) -> InstallContext {
    InstallContext::new(package.name(), version.unwrap_or(package.version()))
        .with_runmodes(runmodes)
        .with_workdir(package.root())
}
