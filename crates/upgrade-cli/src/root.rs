use std::path::{Path, PathBuf};

use upgrade_core::paths::MANIFEST_FILE;

/// Resolve the package directory.
///
/// Priority:
/// 1. `--package` flag / `UPGRADE_HOOK_PACKAGE` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `package.yaml`
/// 3. Fall back to `cwd`
pub fn resolve_package(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_upward(&cwd).unwrap_or(cwd)
}

fn find_upward(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        if dir.join(MANIFEST_FILE).is_file() {
            return Some(dir);
        }
        dir = dir.parent()?.to_path_buf();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_package_wins() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_package(Some(dir.path())), dir.path());
    }

    #[test]
    fn finds_manifest_above() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("package.yaml"), "name: site\n").unwrap();
        let deep = dir.path().join("upgrades/content");
        std::fs::create_dir_all(&deep).unwrap();
        assert_eq!(find_upward(&deep).as_deref(), Some(dir.path()));
    }
}
