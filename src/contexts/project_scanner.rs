use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Directory names never listed as project files
const IGNORED_DIRS: &[&str] = &[
    "target",
    "node_modules",
    "__pycache__",
    "venv",
    "dist",
    "build",
];

/// Lists the files of an existing project.
pub trait ProjectScanner: Send + Sync {
    /// Returns file paths relative to `root`, in a stable order.
    fn scan(&self, root: &Path) -> Result<Vec<String>>;
}

/// Recursive filesystem scan that skips hidden entries and build output
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProjectScanner;

impl ProjectScanner for FsProjectScanner {
    fn scan(&self, root: &Path) -> Result<Vec<String>> {
        let mut files = Vec::new();
        scan_directory(root, root, &mut files)?;
        Ok(files)
    }
}

fn scan_directory(base_dir: &Path, current_dir: &Path, files: &mut Vec<String>) -> Result<()> {
    if !current_dir.is_dir() {
        return Ok(());
    }

    let mut entries = fs::read_dir(current_dir)
        .with_context(|| format!("Failed to read directory: {}", current_dir.display()))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to list directory: {}", current_dir.display()))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if name.starts_with('.') {
            continue;
        }

        if path.is_dir() {
            if !IGNORED_DIRS.contains(&name.as_ref()) {
                scan_directory(base_dir, &path, files)?;
            }
        } else {
            let relative = path.strip_prefix(base_dir).unwrap_or(&path);
            files.push(relative.to_string_lossy().into_owned());
        }
    }

    Ok(())
}
