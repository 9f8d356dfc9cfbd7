//! Optional TOML configuration
//!
//! ```toml
//! salt_path = "/home/me/.ssh/enc-notes-salt"
//! recursive = false
//! log_level = "warn"
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCategory, ErrorKind, NotecryptError, Result};
use crate::salt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Salt file used for key derivation (default: ~/.ssh/enc-notes-salt)
    pub salt_path: Option<PathBuf>,
    /// Descend into subdirectories when given a directory
    pub recursive: bool,
    /// Log filter used when neither -v nor RUST_LOG is given
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            salt_path: salt::default_salt_path(),
            recursive: false,
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// `<config dir>/notecrypt/config.toml`, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("notecrypt").join("config.toml"))
    }

    /// Parse configuration from TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| {
            NotecryptError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Config,
                format!("invalid configuration: {}", e.message()),
                e,
            )
        })
    }

    /// Load configuration.
    ///
    /// With an explicit path the file must exist. Without one, the default
    /// location is tried and a missing file yields defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        match fs::read_to_string(&path) {
            Ok(text) => Self::parse(&text)
                .map_err(|e| e.with_context(format!("parsing config {}", path.display()))),
            Err(e) if e.kind() == io::ErrorKind::NotFound && !required => Ok(Self::default()),
            Err(e) => Err(NotecryptError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Config,
                format!("reading config {}", path.display()),
                e,
            )),
        }
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| {
            NotecryptError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Config,
                "failed to serialize configuration",
                e,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full() {
        let config = Config::parse(
            r#"
salt_path = "/tmp/salt"
recursive = true
log_level = "debug"
"#,
        )
        .unwrap();

        assert_eq!(config.salt_path, Some(PathBuf::from("/tmp/salt")));
        assert!(config.recursive);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_parse_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert!(!config.recursive);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_parse_rejects_unknown_keys() {
        let err = Config::parse("salt = 3").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::Config));
    }

    #[test]
    fn test_load_explicit_missing_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = Config::load(Some(&temp_dir.path().join("nope.toml"))).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::Config));
    }

    #[test]
    fn test_load_explicit() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "recursive = true\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert!(config.recursive);
        assert_eq!(config.salt_path, salt::default_salt_path());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config {
            salt_path: Some(PathBuf::from("/srv/salt")),
            recursive: true,
            log_level: "info".to_string(),
        };
        let text = config.to_toml().unwrap();
        assert_eq!(Config::parse(&text).unwrap(), config);
    }
}
