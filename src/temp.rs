//! Temporary file management module
//!
//! This module provides RAII-based temporary file handling with automatic
//! cleanup, and the write-then-replace helper every persisted file goes
//! through so an interrupted run never leaves a half-written file behind.

use std::fs::{self, File};
use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// Guard for a temporary file that is deleted on drop unless persisted
#[derive(Debug)]
pub(crate) struct TempGuard {
    path: PathBuf,
    armed: bool,
}

impl TempGuard {
    /// Get the path to the temporary file
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Moves the temporary file over `target`, disarming the cleanup
    ///
    /// The temporary file must live on the same filesystem as `target` for
    /// the rename to be atomic, which `create_temp_file_in` guarantees when
    /// given the target's directory.
    pub(crate) fn persist(mut self, target: &Path) -> io::Result<()> {
        fs::rename(&self.path, target)?;
        self.armed = false;
        Ok(())
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if self.armed {
            // Silently ignore errors during cleanup
            let _ = fs::remove_file(&self.path);
        }
    }
}

impl Deref for TempGuard {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        self.path()
    }
}

/// Creates a temporary file in `dir` and returns a guard that cleans it up
///
/// The file name is made unique with a ULID (monotonic, sortable unique
/// identifier) and starts with a dot so it stays out of directory listings.
///
/// # Examples
///
/// ```ignore
/// let temp = create_temp_file_in(Path::new("configs"), "cache", "json")?;
/// fs::write(temp.path(), b"{}")?;
/// temp.persist(Path::new("configs/cache.json"))?;
/// ```
pub(crate) fn create_temp_file_in(dir: &Path, prefix: &str, extension: &str) -> io::Result<TempGuard> {
    let ulid = ulid::Ulid::new();
    let filename = format!(".{}_{}.{}", prefix, ulid, extension);

    let path = dir.join(filename);

    File::create(&path)?;

    Ok(TempGuard { path, armed: true })
}

/// Replaces the contents of `target` without ever exposing a partial file
///
/// The data is written to a sibling temporary file which is then renamed
/// over the target. Missing parent directories are created.
pub(crate) fn write_atomically(target: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let prefix = target
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("tmp");
    let temp = create_temp_file_in(&dir, prefix, "tmp")?;
    fs::write(temp.path(), contents)?;
    temp.persist(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_temp_file_in() {
        let dir = tempfile::tempdir().unwrap();
        let temp = create_temp_file_in(dir.path(), "test", "txt").unwrap();
        let path = temp.path().to_path_buf();

        assert!(path.exists());
        assert!(path.is_file());
        assert_eq!(path.parent(), Some(dir.path()));

        let filename = path.file_name().unwrap().to_str().unwrap();
        assert!(filename.starts_with(".test_"));
        assert!(filename.ends_with(".txt"));

        drop(temp);

        assert!(!path.exists());
    }

    #[test]
    fn test_multiple_temp_files_unique() {
        let dir = tempfile::tempdir().unwrap();
        let temp1 = create_temp_file_in(dir.path(), "test", "txt").unwrap();
        let temp2 = create_temp_file_in(dir.path(), "test", "txt").unwrap();

        assert_ne!(temp1.path(), temp2.path());
        assert!(temp1.path().exists());
        assert!(temp2.path().exists());
    }

    #[test]
    fn test_persist_moves_file_and_disarms_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("final.json");
        let temp = create_temp_file_in(dir.path(), "final", "tmp").unwrap();
        let temp_path = temp.path().to_path_buf();
        fs::write(&temp_path, b"content").unwrap();

        temp.persist(&target).unwrap();

        assert!(!temp_path.exists());
        assert_eq!(fs::read_to_string(&target).unwrap(), "content");
    }

    #[test]
    fn test_write_atomically_replaces_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("config.txt");

        write_atomically(&target, b"first\n").unwrap();
        write_atomically(&target, b"second\n").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "second\n");
        let leftovers: Vec<_> = fs::read_dir(target.parent().unwrap())
            .unwrap()
            .flatten()
            .filter(|entry| entry.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty());
    }
}
