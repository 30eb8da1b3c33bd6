//! Instance configuration, read from `runplane.toml` in the storage home.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::InstanceError;

/// Name of the config file looked up in the storage home.
pub const CONFIG_FILE_NAME: &str = "runplane.toml";

/// Instance configuration.
///
/// Every section is optional; a missing file is the same as an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    pub storage: StorageConfig,
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of run documents and event logs. Relative paths are resolved
    /// against the home directory. Defaults to `<home>/storage`.
    pub base_dir: Option<PathBuf>,
}

impl InstanceConfig {
    /// Load `<home>/runplane.toml`, falling back to defaults if it is absent.
    pub async fn load(home: &Path) -> Result<Self, InstanceError> {
        let path = home.join(CONFIG_FILE_NAME);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        Self::parse(&raw).map_err(|source| InstanceError::Config { path, source })
    }

    /// Parse config file contents.
    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Resolve the storage directory for the given home.
    pub fn storage_dir(&self, home: &Path) -> PathBuf {
        match &self.storage.base_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => home.join(dir),
            None => home.join("storage"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_defaults_to_home_storage() {
        let config = InstanceConfig::parse("").unwrap();
        assert_eq!(
            config.storage_dir(Path::new("/work")),
            PathBuf::from("/work/storage")
        );
    }

    #[test]
    fn test_relative_and_absolute_base_dir() {
        let config = InstanceConfig::parse("[storage]\nbase_dir = \"runs-db\"\n").unwrap();
        assert_eq!(
            config.storage_dir(Path::new("/work")),
            PathBuf::from("/work/runs-db")
        );

        let config = InstanceConfig::parse("[storage]\nbase_dir = \"/var/runplane\"\n").unwrap();
        assert_eq!(
            config.storage_dir(Path::new("/work")),
            PathBuf::from("/var/runplane")
        );
    }

    #[tokio::test]
    async fn test_malformed_config_is_reported_with_path() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join(CONFIG_FILE_NAME), "[storage\n").unwrap();

        let err = InstanceConfig::load(home.path()).await.unwrap_err();
        assert!(matches!(err, InstanceError::Config { .. }));
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }
}
