//! Finding the service executables.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// The API / web front-end service.
pub const API_COMPONENT: &str = "runplane-webserver";

/// The scheduling daemon.
pub const DAEMON_COMPONENT: &str = "runplane-daemon";

/// Looks executables up in an ordered list of directories.
#[derive(Debug, Clone, Default)]
pub struct ComponentLocator {
    search_dirs: Vec<PathBuf>,
}

impl ComponentLocator {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }

    /// Directory of `current_exe` first, then every entry of `path_var`.
    pub fn from_search_path(current_exe: Option<&Path>, path_var: Option<&OsStr>) -> Self {
        let mut search_dirs = Vec::new();
        if let Some(dir) = current_exe.and_then(Path::parent) {
            search_dirs.push(dir.to_path_buf());
        }
        if let Some(path_var) = path_var {
            search_dirs.extend(std::env::split_paths(path_var));
        }
        Self { search_dirs }
    }

    /// First executable file called `name`.
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        self.search_dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn touch(dir: &Path, name: &str, mode: u32) {
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
    }

    #[test]
    fn test_exe_dir_wins_over_path() {
        let exe_dir = tempfile::tempdir().unwrap();
        let path_dir = tempfile::tempdir().unwrap();
        touch(exe_dir.path(), API_COMPONENT, 0o755);
        touch(path_dir.path(), API_COMPONENT, 0o755);
        touch(path_dir.path(), DAEMON_COMPONENT, 0o755);

        let exe = exe_dir.path().join("runplane");
        let path_var = std::env::join_paths([path_dir.path()]).unwrap();
        let locator =
            ComponentLocator::from_search_path(Some(exe.as_path()), Some(path_var.as_os_str()));

        assert_eq!(
            locator.find(API_COMPONENT),
            Some(exe_dir.path().join(API_COMPONENT))
        );
        assert_eq!(
            locator.find(DAEMON_COMPONENT),
            Some(path_dir.path().join(DAEMON_COMPONENT))
        );
    }

    #[test]
    fn test_non_executable_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), API_COMPONENT, 0o644);

        let locator = ComponentLocator::new(vec![dir.path().to_path_buf()]);
        assert_eq!(locator.find(API_COMPONENT), None);
    }
}
