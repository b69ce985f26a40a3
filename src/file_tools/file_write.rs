//! file_write: Atomically overwrite a file with verification
//!
//! Two-phase write so callers can observe the staged state:
//! 1. `stage_write` writes a temp file beside the target, fsyncs it,
//!    reads it back and copies the target's permissions onto it
//! 2. `StagedWrite::commit` renames the temp file over the target
//!
//! Dropping a `StagedWrite` without committing removes the temp file and
//! leaves the target untouched.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors that can occur during file write operations
#[derive(Error, Debug)]
pub enum FileWriteError {
    #[error("Parent directory does not exist: {0}")]
    ParentNotFound(String),

    #[error("Written content does not match for {0}")]
    VerifyMismatch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for file operations
pub type Result<T> = std::result::Result<T, FileWriteError>;

/// A fully written, verified temp file waiting to replace its target
#[derive(Debug)]
pub struct StagedWrite {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    /// Path of the temp file holding the new content
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the temp file over the target (atomic on POSIX)
    pub fn commit(self) -> Result<()> {
        self.temp
            .persist(&self.target)
            .map_err(|e| FileWriteError::Io(e.error))?;
        Ok(())
    }
}

/// Write `content` to a temp file next to `path` without touching `path`
///
/// # Returns
/// * `Ok(StagedWrite)` - temp file is synced and its content verified
/// * `Err(FileWriteError)` - parent dir missing, write failed or read-back differs
pub fn stage_write(path: &Path, content: &[u8]) -> Result<StagedWrite> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !parent.exists() {
        return Err(FileWriteError::ParentNotFound(parent.display().to_string()));
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());

    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .suffix(".tmp")
        .tempfile_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    let written = fs::read(temp.path())?;
    if written != content {
        return Err(FileWriteError::VerifyMismatch(path.display().to_string()));
    }

    // Keep the target's mode across the rename
    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(temp.path(), meta.permissions())?;
    }

    Ok(StagedWrite {
        temp,
        target: path.to_path_buf(),
    })
}

/// Atomically write content to a file
///
/// # Examples
/// ```ignore
/// use odincode_fix::file_tools::file_write;
/// use std::path::Path;
///
/// file_write(Path::new("output.txt"), b"Hello, World!")?;
/// ```
pub fn file_write(path: &Path, content: &[u8]) -> Result<()> {
    stage_write(path, content)?.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_and_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");

        file_write(&path, b"one").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"one");

        file_write(&path, b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
    }

    #[test]
    fn test_missing_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("a.txt");
        assert!(matches!(
            file_write(&path, b"x"),
            Err(FileWriteError::ParentNotFound(_))
        ));
    }

    #[test]
    fn test_dropped_stage_leaves_target_intact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "original").unwrap();

        let staged = stage_write(&path, b"replacement").unwrap();
        let temp_path = staged.temp_path().to_path_buf();
        assert!(temp_path.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "original");

        drop(staged);
        assert!(!temp_path.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "original");
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("script.sh");
        fs::write(&path, "echo 1").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o750)).unwrap();

        file_write(&path, b"echo 2").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o750);
    }
}
