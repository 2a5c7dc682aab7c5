//! Configuration
//!
//! JSON configuration file, by default `conf.json`:
//!
//! ```json
//! {
//!   "port": 8080,
//!   "frontend_root": "frontend",
//!   "simulated_gpio_enabled": false,
//!   "media_directories": ["/media/usb"],
//!   "controls": [{"control": "channel", "type": "rotary", "pins": [17, 27]}]
//! }
//! ```

use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::gpio::sysfs::DEFAULT_ROOT;
use crate::gpio::PinWatchSet;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8080;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "conf.json";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served as the web frontend
    #[serde(default = "default_frontend_root")]
    pub frontend_root: PathBuf,

    /// Page served for unknown paths, defaults to `<frontend_root>/index.html`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend_bootstrap_page: Option<PathBuf>,

    /// Use the in-memory pin simulator instead of sysfs
    #[serde(default)]
    pub simulated_gpio_enabled: bool,

    /// sysfs GPIO class directory
    #[serde(default = "default_gpio_root")]
    pub gpio_root: PathBuf,

    #[serde(default)]
    pub media_directories: Vec<PathBuf>,

    /// Explicit omxplayer location, looked up in `$PATH` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_path: Option<PathBuf>,

    #[serde(default)]
    pub controls: Vec<Control>,
}

/// A physical control wired to one or more pins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub control: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub pins: Vec<u8>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_frontend_root() -> PathBuf {
    PathBuf::from("frontend")
}

fn default_gpio_root() -> PathBuf {
    PathBuf::from(DEFAULT_ROOT)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            frontend_root: default_frontend_root(),
            frontend_bootstrap_page: None,
            simulated_gpio_enabled: false,
            gpio_root: default_gpio_root(),
            media_directories: Vec::new(),
            player_path: None,
            controls: Vec::new(),
        }
    }
}

impl Config {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file without validating it, so overrides can
    /// be applied first
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the hardware backend cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.simulated_gpio_enabled && self.watch_set().is_empty() {
            return Err(ConfigError::Invalid(
                "no control pins configured and simulated GPIO disabled".to_string(),
            ));
        }
        for control in &self.controls {
            if control.control.trim().is_empty() {
                return Err(ConfigError::Invalid("control with empty name".to_string()));
            }
        }
        Ok(())
    }

    /// Every control pin, in declaration order, without duplicates
    pub fn watch_set(&self) -> PinWatchSet {
        self.controls
            .iter()
            .flat_map(|c| c.pins.iter().copied())
            .collect()
    }

    /// Page served when no frontend file matches
    pub fn bootstrap_page(&self) -> PathBuf {
        self.frontend_bootstrap_page
            .clone()
            .unwrap_or_else(|| self.frontend_root.join("index.html"))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("couldn't read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(
            r#"{
                "port": 9000,
                "frontend_root": "/srv/ezbox",
                "frontend_bootstrap_page": "/srv/ezbox/boot.html",
                "media_directories": ["/media/usb"],
                "controls": [
                    {"control": "channel", "type": "rotary", "pins": [17, 27]},
                    {"control": "power", "type": "button", "pins": [4, 17]}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert!(!config.simulated_gpio_enabled);
        assert_eq!(config.gpio_root, PathBuf::from("/sys/class/gpio"));
        assert_eq!(config.controls[0].kind, "rotary");
        assert_eq!(config.watch_set().iter().collect::<Vec<_>>(), vec![17, 27, 4]);
        assert_eq!(config.bootstrap_page(), PathBuf::from("/srv/ezbox/boot.html"));
    }

    #[test]
    fn test_defaults_in_simulated_mode() {
        let config = Config::parse(r#"{"simulated_gpio_enabled": true}"#).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.watch_set().is_empty());
        assert_eq!(config.bootstrap_page(), PathBuf::from("frontend/index.html"));
    }

    #[test]
    fn test_hardware_mode_requires_pins() {
        let err = Config::parse(r#"{"controls": []}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(Config::parse("{port: 1}"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/conf.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_read_skips_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "{}").unwrap();

        let mut config = Config::read(&path).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.simulated_gpio_enabled = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, r#"{"controls": [{"control": "play", "type": "button", "pins": [2]}]}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.watch_set().len(), 1);
    }
}
