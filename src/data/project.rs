use std::path::{Path, PathBuf};

/// Maximum number of existing files listed in the base prompt.
pub const EXISTING_FILE_PREVIEW: usize = 10;

/// The user's description of what should be built.
///
/// Never mutated after submission; the pipeline only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement(String);

impl Requirement {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A requirement consisting only of whitespace counts as missing.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// Whether generation starts from an empty directory or edits an existing tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectMode {
    NewProject,
    ExistingProject,
}

/// Read-only description of the project a run works on.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    root: PathBuf,
    mode: ProjectMode,
    existing_files: Vec<String>,
    total_files: usize,
}

impl ProjectContext {
    pub fn new_project(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mode: ProjectMode::NewProject,
            existing_files: Vec::new(),
            total_files: 0,
        }
    }

    /// Builds the context for an existing tree.
    ///
    /// `files` are paths relative to `root` in scan order. Only the first
    /// [`EXISTING_FILE_PREVIEW`] are kept; the full count is remembered for
    /// reporting.
    pub fn existing_project(root: impl Into<PathBuf>, files: Vec<String>) -> Self {
        let total_files = files.len();
        let existing_files = files.into_iter().take(EXISTING_FILE_PREVIEW).collect();
        Self {
            root: root.into(),
            mode: ProjectMode::ExistingProject,
            existing_files,
            total_files,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mode(&self) -> ProjectMode {
        self.mode
    }

    pub fn existing_files(&self) -> &[String] {
        &self.existing_files
    }

    pub fn total_files(&self) -> usize {
        self.total_files
    }
}

/// Absolute paths are kept as given, relative ones are joined onto `root`.
pub fn resolve_path(root: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_requirement() {
        assert!(Requirement::new("  \n\t").is_blank());
        assert!(!Requirement::new("build a CLI todo app").is_blank());
    }

    #[test]
    fn test_existing_project_caps_preview() {
        let files: Vec<String> = (0..25).map(|i| format!("src/file_{}.rs", i)).collect();
        let context = ProjectContext::existing_project("/tmp/project", files);

        assert_eq!(context.mode(), ProjectMode::ExistingProject);
        assert_eq!(context.existing_files().len(), EXISTING_FILE_PREVIEW);
        assert_eq!(context.existing_files()[0], "src/file_0.rs");
        assert_eq!(context.total_files(), 25);
    }

    #[test]
    fn test_new_project_has_no_files() {
        let context = ProjectContext::new_project("/tmp/todo");
        assert_eq!(context.mode(), ProjectMode::NewProject);
        assert!(context.existing_files().is_empty());
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let root = Path::new("/tmp/todo");
        assert_eq!(resolve_path(root, "src/main.py"), PathBuf::from("/tmp/todo/src/main.py"));
        assert_eq!(resolve_path(root, "/etc/app.conf"), PathBuf::from("/etc/app.conf"));
    }
}
