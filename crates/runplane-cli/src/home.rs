//! Storage home resolution.

use std::path::{Path, PathBuf};

/// Environment variable naming the storage home.
pub const HOME_ENV: &str = "RUNPLANE_HOME";

/// Where runs are stored, plus a warning when the location was guessed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageHome {
    pub path: PathBuf,
    pub warning: Option<String>,
}

/// Use `configured` if set and non-empty, else `cwd` with a warning.
pub fn resolve_storage_home(configured: Option<PathBuf>, cwd: &Path) -> StorageHome {
    match configured {
        Some(path) if !path.as_os_str().is_empty() => StorageHome {
            path,
            warning: None,
        },
        _ => StorageHome {
            path: cwd.to_path_buf(),
            warning: Some(format!(
                "Using the current folder {} as the folder for your runplane storage. \
                 If you run this command again from a different folder you will not have \
                 access to your runs. Set the {} environment variable to a folder to set \
                 the permanent home for runplane storage.",
                cwd.display(),
                HOME_ENV
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_home_falls_back_to_cwd_with_warning() {
        let home = resolve_storage_home(None, Path::new("/work"));
        assert_eq!(home.path, PathBuf::from("/work"));
        assert!(home.warning.unwrap().contains("/work"));
    }

    #[test]
    fn test_empty_home_counts_as_unset() {
        let home = resolve_storage_home(Some(PathBuf::new()), Path::new("/work"));
        assert_eq!(home.path, PathBuf::from("/work"));
        assert!(home.warning.is_some());
    }

    #[test]
    fn test_configured_home_is_used_silently() {
        let home = resolve_storage_home(Some(PathBuf::from("/srv/runplane")), Path::new("/work"));
        assert_eq!(home.path, PathBuf::from("/srv/runplane"));
        assert!(home.warning.is_none());
    }
}
