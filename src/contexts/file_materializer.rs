use crate::data::{resolve_path, ExtractedFile};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Failure to write one extracted file
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What applying a file did to the disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Created,
    Overwritten,
    /// The file already held exactly this content; nothing was written.
    Unchanged,
    /// Dry run: the file would have been written.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Absolute (or root-joined) location of the file
    pub path: PathBuf,
    /// Path relative to the project root, for display
    pub relative: String,
    pub status: WriteStatus,
}

/// Writes extracted files below a project root.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileMaterializer {
    dry_run: bool,
}

impl FileMaterializer {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Writes `file` under `root`, creating missing parent directories.
    ///
    /// Re-applying the same file is a no-op; a different content for the same
    /// path replaces the previous one.
    pub fn apply(&self, file: &ExtractedFile, root: &Path) -> Result<WriteOutcome, MaterializeError> {
        let path = resolve_path(root, &file.path);
        let relative = display_relative(&path, root);
        let io_err = |source: io::Error| MaterializeError::Io {
            path: path.clone(),
            source,
        };

        // Unreadable targets are treated as absent; the write reports the error.
        let existing = fs::read(&path).ok();

        let status = match &existing {
            Some(bytes) if bytes.as_slice() == file.content.as_bytes() => WriteStatus::Unchanged,
            _ if self.dry_run => WriteStatus::Skipped,
            Some(_) => WriteStatus::Overwritten,
            None => WriteStatus::Created,
        };

        if matches!(status, WriteStatus::Created | WriteStatus::Overwritten) {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
            fs::write(&path, file.content.as_bytes()).map_err(io_err)?;
        }

        debug!(path = %path.display(), ?status, bytes = file.content.len(), "applied extracted file");

        Ok(WriteOutcome {
            path,
            relative,
            status,
        })
    }

    /// Applies every file in order. A failing file does not stop the rest.
    pub fn apply_all(
        &self,
        files: &[ExtractedFile],
        root: &Path,
    ) -> Vec<Result<WriteOutcome, MaterializeError>> {
        files.iter().map(|file| self.apply(file, root)).collect()
    }
}

fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let file = ExtractedFile::new("src/todo/store.py", "items = []\n");

        let outcome = FileMaterializer::default().apply(&file, dir.path()).unwrap();

        assert_eq!(outcome.status, WriteStatus::Created);
        assert_eq!(outcome.relative, "src/todo/store.py");
        assert_eq!(
            fs::read_to_string(dir.path().join("src/todo/store.py")).unwrap(),
            "items = []\n"
        );
    }

    #[test]
    fn test_apply_twice_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let file = ExtractedFile::new("main.py", "print('todo')\n");
        let materializer = FileMaterializer::default();

        materializer.apply(&file, dir.path()).unwrap();
        let first = fs::read(dir.path().join("main.py")).unwrap();
        let second_outcome = materializer.apply(&file, dir.path()).unwrap();
        let second = fs::read(dir.path().join("main.py")).unwrap();

        assert_eq!(first, second);
        assert_eq!(second_outcome.status, WriteStatus::Unchanged);
    }

    #[test]
    fn test_last_write_wins() {
        let dir = TempDir::new().unwrap();
        let materializer = FileMaterializer::default();

        materializer
            .apply(&ExtractedFile::new("main.py", "v1\n"), dir.path())
            .unwrap();
        let outcome = materializer
            .apply(&ExtractedFile::new("main.py", "v2\n"), dir.path())
            .unwrap();

        assert_eq!(outcome.status, WriteStatus::Overwritten);
        assert_eq!(fs::read_to_string(dir.path().join("main.py")).unwrap(), "v2\n");
    }

    #[test]
    fn test_absolute_path_is_not_joined() {
        let root = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        let target = elsewhere.path().join("notes.txt");
        let file = ExtractedFile::new(target.to_string_lossy(), "abs\n");

        let outcome = FileMaterializer::default().apply(&file, root.path()).unwrap();

        assert_eq!(outcome.path, target);
        assert_eq!(fs::read_to_string(&target).unwrap(), "abs\n");
    }

    #[test]
    fn test_failure_does_not_stop_batch() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("blocker"), "plain file").unwrap();
        let files = vec![
            ExtractedFile::new("blocker/inner.txt", "cannot live under a file"),
            ExtractedFile::new("ok.txt", "fine"),
        ];

        let results = FileMaterializer::default().apply_all(&files, dir.path());

        assert!(matches!(results[0], Err(MaterializeError::Io { .. })));
        assert!(results[1].is_ok());
        assert_eq!(fs::read_to_string(dir.path().join("ok.txt")).unwrap(), "fine");
    }

    #[test]
    fn test_dry_run_leaves_disk_untouched() {
        let dir = TempDir::new().unwrap();
        let outcome = FileMaterializer::new(true)
            .apply(&ExtractedFile::new("main.py", "pass\n"), dir.path())
            .unwrap();

        assert_eq!(outcome.status, WriteStatus::Skipped);
        assert!(!dir.path().join("main.py").exists());
    }
}
