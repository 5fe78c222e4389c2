//! Shell seam: locating the project root directory.

use std::path::{Path, PathBuf};

use super::ContextError;

/// File names that mark a directory as a project root.
const PROJECT_MARKERS: &[&str] = &["capstan.yaml", "capstan.yml"];

/// Access to the surrounding shell/process environment.
pub trait Shell {
    /// Root directory of the current project.
    fn project_root(&self) -> Result<PathBuf, ContextError>;
}

/// Default shell: walks up from a starting directory to the nearest ancestor
/// holding a project marker file. Falls back to the starting directory when
/// no marker exists.
#[derive(Default)]
pub struct ProjectShell {
    start: Option<PathBuf>,
}

impl ProjectShell {
    /// Creates a shell that starts the walk at the process working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a shell that starts the walk at `start`.
    pub fn rooted_at(start: impl Into<PathBuf>) -> Self {
        Self {
            start: Some(start.into()),
        }
    }

    fn start_dir(&self) -> Result<PathBuf, ContextError> {
        match &self.start {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir()
                .map_err(|e| ContextError::ProjectRoot(e.to_string())),
        }
    }
}

impl Shell for ProjectShell {
    fn project_root(&self) -> Result<PathBuf, ContextError> {
        let start = self.start_dir()?;
        for dir in start.ancestors() {
            if has_marker(dir) {
                return Ok(dir.to_path_buf());
            }
        }
        Ok(start)
    }
}

fn has_marker(dir: &Path) -> bool {
    PROJECT_MARKERS.iter().any(|name| dir.join(name).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_finds_marker_in_ancestor() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("capstan.yaml"), "context: local\n").unwrap();
        let nested = dir.path().join("terraform/cluster");
        std::fs::create_dir_all(&nested).unwrap();

        let shell = ProjectShell::rooted_at(&nested);
        assert_eq!(shell.project_root().unwrap(), dir.path());
    }

    #[test]
    fn test_falls_back_to_start_without_marker() {
        let dir = TempDir::new().unwrap();
        let shell = ProjectShell::rooted_at(dir.path());
        assert_eq!(shell.project_root().unwrap(), dir.path());
    }

    #[test]
    #[serial]
    fn test_default_shell_starts_at_working_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("capstan.yml"), "context: local\n").unwrap();
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let root = ProjectShell::new().project_root().unwrap();

        std::env::set_current_dir(previous).unwrap();
        assert_eq!(root.canonicalize().unwrap(), dir.path().canonicalize().unwrap());
    }
}
