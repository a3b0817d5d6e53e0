//! Session defaults
//!
//! Loads optional session defaults from .ptypad/config.toml in the working
//! directory. Command-line arguments take precedence over everything here.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Configuration file location, relative to the working directory
pub const CONFIG_DIR: &str = ".ptypad";
pub const CONFIG_FILE: &str = "config.toml";

/// Errors that can occur during config operations
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Session defaults, all optional
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    /// Program to run when none is given on the command line
    pub program: Option<String>,
    /// Arguments for the configured program
    #[serde(default)]
    pub args: Vec<String>,
    /// Rows reserved for surrounding UI chrome
    pub padding: Option<u16>,
    /// Extra environment variables for the child
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Settings {
    /// Load settings from a directory, defaulting when no config file exists
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let config_path = dir.join(CONFIG_DIR).join(CONFIG_FILE);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(dir.path()).unwrap();
        assert!(settings.program.is_none());
        assert!(settings.args.is_empty());
        assert!(settings.padding.is_none());
        assert!(settings.env.is_empty());
    }

    #[test]
    fn test_load_full_config() {
        let dir = tempdir().unwrap();
        let config_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(
            config_dir.join(CONFIG_FILE),
            r#"
program = "htop"
args = ["--tree"]
padding = 2

[env]
TERM = "xterm-256color"
"#,
        )
        .unwrap();

        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.program.as_deref(), Some("htop"));
        assert_eq!(settings.args, vec!["--tree"]);
        assert_eq!(settings.padding, Some(2));
        assert_eq!(
            settings.env.get("TERM").map(String::as_str),
            Some("xterm-256color")
        );
    }

    #[test]
    fn test_load_malformed_config() {
        let dir = tempdir().unwrap();
        let config_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join(CONFIG_FILE), "padding = \"lots\"").unwrap();

        let result = Settings::load(dir.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
