use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// A crash mid-write leaves the previous content in place.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("status.yaml");
        atomic_write(&path, b"version: '1'").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "version: '1'");
    }

    #[test]
    fn atomic_write_replaces_and_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c/status.yaml");
        atomic_write(&path, b"old").unwrap();
        atomic_write(&path, b"new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn ensure_dir_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x/y");
        ensure_dir(&path).unwrap();
        ensure_dir(&path).unwrap();
        assert!(path.is_dir());
    }
}
