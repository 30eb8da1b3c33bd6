//! Workspace target passed through to the services.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::cli::StartArgs;
use crate::error::SupervisorError;

/// Workspace file picked up from the current directory when no target is given.
pub const DEFAULT_WORKSPACE_FILE: &str = "workspace.toml";

/// Where the services load job definitions from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceTarget {
    File(PathBuf),
    Module(String),
    Workspace(PathBuf),
}

impl WorkspaceTarget {
    /// Validate the target options of `args`. Relative paths are checked
    /// against `cwd`.
    pub fn from_args(args: &StartArgs, cwd: &Path) -> Result<Self, SupervisorError> {
        let given = [
            args.file.is_some(),
            args.module.is_some(),
            args.workspace.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if given > 1 {
            return Err(SupervisorError::Usage(
                "Only one of --file, --module and --workspace may be given".to_string(),
            ));
        }

        if let Some(file) = &args.file {
            require_file(cwd, file, "--file")?;
            return Ok(Self::File(file.clone()));
        }
        if let Some(module) = &args.module {
            if module.trim().is_empty() {
                return Err(SupervisorError::Usage("--module must not be empty".to_string()));
            }
            return Ok(Self::Module(module.clone()));
        }
        if let Some(workspace) = &args.workspace {
            require_file(cwd, workspace, "--workspace")?;
            return Ok(Self::Workspace(workspace.clone()));
        }

        if cwd.join(DEFAULT_WORKSPACE_FILE).is_file() {
            return Ok(Self::Workspace(PathBuf::from(DEFAULT_WORKSPACE_FILE)));
        }

        Err(SupervisorError::Usage(format!(
            "No arguments given and {} not found in {}. Pass one of --file, --module or --workspace.",
            DEFAULT_WORKSPACE_FILE,
            cwd.display()
        )))
    }

    /// Command line flags naming this target.
    pub fn to_args(&self) -> Vec<OsString> {
        match self {
            Self::File(path) => vec!["--file".into(), path.clone().into_os_string()],
            Self::Module(module) => vec!["--module".into(), module.into()],
            Self::Workspace(path) => vec!["--workspace".into(), path.clone().into_os_string()],
        }
    }
}

fn require_file(cwd: &Path, path: &Path, flag: &str) -> Result<(), SupervisorError> {
    if cwd.join(path).is_file() {
        Ok(())
    } else {
        Err(SupervisorError::Usage(format!(
            "{} {}: file does not exist",
            flag,
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_workspace_file_is_used() {
        let cwd = tempfile::tempdir().unwrap();
        std::fs::write(cwd.path().join(DEFAULT_WORKSPACE_FILE), "").unwrap();

        let target = WorkspaceTarget::from_args(&StartArgs::default(), cwd.path()).unwrap();
        assert_eq!(
            target,
            WorkspaceTarget::Workspace(PathBuf::from(DEFAULT_WORKSPACE_FILE))
        );
        assert_eq!(
            target.to_args(),
            vec![OsString::from("--workspace"), OsString::from("workspace.toml")]
        );
    }

    #[test]
    fn test_no_target_and_no_default_is_usage_error() {
        let cwd = tempfile::tempdir().unwrap();
        let err = WorkspaceTarget::from_args(&StartArgs::default(), cwd.path()).unwrap_err();
        assert!(matches!(err, SupervisorError::Usage(_)));
    }

    #[test]
    fn test_missing_file_is_usage_error() {
        let cwd = tempfile::tempdir().unwrap();
        let args = StartArgs {
            file: Some(PathBuf::from("jobs.py")),
            ..Default::default()
        };
        assert!(matches!(
            WorkspaceTarget::from_args(&args, cwd.path()),
            Err(SupervisorError::Usage(_))
        ));

        std::fs::write(cwd.path().join("jobs.py"), "").unwrap();
        assert_eq!(
            WorkspaceTarget::from_args(&args, cwd.path()).unwrap(),
            WorkspaceTarget::File(PathBuf::from("jobs.py"))
        );
    }

    #[test]
    fn test_two_targets_is_usage_error() {
        let cwd = tempfile::tempdir().unwrap();
        let args = StartArgs {
            module: Some("jobs".to_string()),
            workspace: Some(PathBuf::from("workspace.toml")),
            ..Default::default()
        };
        assert!(matches!(
            WorkspaceTarget::from_args(&args, cwd.path()),
            Err(SupervisorError::Usage(_))
        ));
    }
}
