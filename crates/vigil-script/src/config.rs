//! Loader configuration

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Settings for [`Loader`](crate::Loader)
///
/// # Example
///
/// ```
/// use vigil_script::LoaderConfig;
///
/// let config = LoaderConfig::default();
/// assert!(config.recursive);
/// assert!(!config.allow_redefinition);
///
/// let config = LoaderConfig::from_ron("(allow_redefinition: true)").unwrap();
/// assert!(config.recursive);
/// assert!(config.allow_redefinition);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Descend into subdirectories when loading a directory
    pub recursive: bool,
    /// Let a later definition of a class replace an earlier one instead of
    /// failing with a duplicate definition error
    pub allow_redefinition: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            allow_redefinition: false,
        }
    }
}

impl LoaderConfig {
    /// Parse a configuration from RON; missing fields keep their defaults
    pub fn from_ron(content: &str) -> Result<Self> {
        Ok(ron::from_str(content)?)
    }

    /// Read a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_ron(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(LoaderConfig::from_ron("()").unwrap(), LoaderConfig::default());
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            LoaderConfig::from_ron("(recursive: 3)"),
            Err(Error::Ron(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loader.ron");
        fs::write(&path, "(recursive: false)").unwrap();

        let config = LoaderConfig::from_file(&path).unwrap();
        assert!(!config.recursive);
        assert!(matches!(
            LoaderConfig::from_file(dir.path().join("missing.ron")),
            Err(Error::Io(_))
        ));
    }
}
