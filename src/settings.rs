//! Persisted user settings

use crate::entrez::validate_email;
use crate::{RsidError, RsidResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Environment variable overriding [`DEFAULT_CONFIG_FILE`]
pub const CONFIG_ENV_VAR: &str = "RSID_RETRIEVAL_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Settings {
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Defaults when the file does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> RsidResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("No settings file at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> RsidResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// An explicit email wins over the stored one; the result must contain `@`
    pub fn resolve_email(&self, explicit: Option<&str>) -> RsidResult<String> {
        let email = explicit
            .map(str::to_string)
            .or_else(|| self.email.clone())
            .ok_or_else(|| {
                RsidError::InvalidEmail("none given (use --email or a saved setting)".to_string())
            })?;
        validate_email(&email)?;
        Ok(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(dir.path().join("config.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let settings = Settings {
            email: Some("user@example.org".to_string()),
        };
        settings.save(&path).unwrap();

        assert_eq!(Settings::load(&path).unwrap(), settings);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"email\": \"user@example.org\""));
    }

    #[test]
    fn test_load_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(Settings::load(&path), Err(RsidError::Json(_))));
    }

    #[test]
    fn test_resolve_email() {
        let stored = Settings {
            email: Some("stored@example.org".to_string()),
        };
        assert_eq!(stored.resolve_email(None).unwrap(), "stored@example.org");
        assert_eq!(
            stored.resolve_email(Some("cli@example.org")).unwrap(),
            "cli@example.org"
        );
        assert!(stored.resolve_email(Some("bad")).is_err());
        assert!(Settings::default().resolve_email(None).is_err());
    }
}
