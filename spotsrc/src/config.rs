//! spotsrc configuration
//!
//! Source configuration with environment-variable defaults and optional
//! TOML file loading. Credentials default to the `SPOTIFY_USER`,
//! `SPOTIFY_PASS` and `SPOTIFY_APPKEY` environment variables so a
//! deployment can avoid writing secrets into a config file.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Default track URI used when none is configured.
pub const DEFAULT_URI: &str = "spotify://spotify:track:27jdUE1EYDSXZqhjuNxLem";

/// Default byte budget for the delivery queue (see `BufferQueue`).
pub const DEFAULT_MAX_QUEUE_BYTES: u64 = 1_000_000;

/// Source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Username for the premium streaming account
    pub username: String,

    /// Password for the premium streaming account
    pub password: String,

    /// Path to the application key file (fixed-size opaque blob)
    pub appkey_file: PathBuf,

    /// Track URI (`spotify://<location>`)
    pub uri: String,

    /// Queue byte budget; enqueues are rejected once this many bytes are
    /// buffered. Zero disables the budget.
    pub max_queue_bytes: u64,

    /// Backend cache directory
    pub cache_dir: PathBuf,

    /// Backend settings directory
    pub settings_dir: PathBuf,

    /// User agent string reported to the backend
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            username: env::var("SPOTIFY_USER").unwrap_or_default(),
            password: env::var("SPOTIFY_PASS").unwrap_or_default(),
            appkey_file: env::var("SPOTIFY_APPKEY").unwrap_or_default().into(),
            uri: DEFAULT_URI.to_string(),
            max_queue_bytes: DEFAULT_MAX_QUEUE_BYTES,
            cache_dir: PathBuf::from("/tmp"),
            settings_dir: PathBuf::from("/tmp"),
            user_agent: "spotsrc".to_string(),
        }
    }
}

impl SourceConfig {
    /// Load configuration from a TOML file
    ///
    /// Missing keys fall back to the environment-variable defaults.
    ///
    /// # Arguments
    /// * `path` - Path to the TOML configuration file
    ///
    /// # Errors
    /// - File cannot be read
    /// - File is not valid TOML for this structure
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn test_defaults_from_environment() {
        env::set_var("SPOTIFY_USER", "alice");
        env::set_var("SPOTIFY_PASS", "hunter2");
        env::set_var("SPOTIFY_APPKEY", "/etc/spotsrc/appkey.key");

        let config = SourceConfig::default();
        assert_eq!(config.username, "alice");
        assert_eq!(config.password, "hunter2");
        assert_eq!(config.appkey_file, PathBuf::from("/etc/spotsrc/appkey.key"));
        assert_eq!(config.uri, DEFAULT_URI);
        assert_eq!(config.max_queue_bytes, DEFAULT_MAX_QUEUE_BYTES);

        env::remove_var("SPOTIFY_USER");
        env::remove_var("SPOTIFY_PASS");
        env::remove_var("SPOTIFY_APPKEY");
    }

    #[test]
    #[serial]
    fn test_load_partial_toml() {
        env::remove_var("SPOTIFY_USER");
        env::remove_var("SPOTIFY_PASS");
        env::remove_var("SPOTIFY_APPKEY");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
username = "bob"
uri = "spotify://spotify:track:abc123"
max_queue_bytes = 500000
"#
        )
        .unwrap();

        let config = SourceConfig::load(file.path()).unwrap();
        assert_eq!(config.username, "bob");
        assert_eq!(config.password, "");
        assert_eq!(config.uri, "spotify://spotify:track:abc123");
        assert_eq!(config.max_queue_bytes, 500_000);
        assert_eq!(config.user_agent, "spotsrc");
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = SourceConfig::load(std::path::Path::new("/nonexistent/spotsrc.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_malformed_toml_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_queue_bytes = \"not a number\"").unwrap();

        let result = SourceConfig::load(file.path());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
