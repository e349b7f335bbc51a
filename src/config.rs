// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving application settings.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bluetooth::{EnumerationOrder, NamePattern};
use crate::session::SessionOptions;

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bluetooth settings.
    pub bluetooth: BluetoothConfig,

    /// Session settings.
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Name of the paired module to connect to.
    pub device_pattern: String,

    /// Loose-match prefix. Derived from `device_pattern` when unset.
    pub match_prefix: Option<String>,

    /// "platform" or "by-address".
    pub enumeration_order: EnumerationOrder,

    /// Controller to use, e.g. "hci0". Default adapter when unset.
    pub adapter: Option<String>,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            device_pattern: "HC-06".to_string(),
            match_prefix: None,
            enumeration_order: EnumerationOrder::Platform,
            adapter: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Give up on a connect after this many seconds.
    pub connect_timeout_secs: u64,

    /// Give up on a send, or on closing the link, after this many seconds.
    pub send_timeout_secs: u64,

    /// Drop the connection when a send fails.
    pub disconnect_on_send_failure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
            send_timeout_secs: 5,
            disconnect_on_send_failure: false,
        }
    }
}

impl Config {
    /// Default location: `<config dir>/spp-link/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("spp-link")
            .join("config.toml")
    }

    /// Load configuration from the default file or create it.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from `path`, writing defaults there if missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?
        } else {
            let config = Self::default();
            config.save_to(path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.bluetooth.device_pattern.trim().is_empty() {
            bail!("bluetooth.device_pattern must not be empty");
        }
        if matches!(&self.bluetooth.match_prefix, Some(prefix) if prefix.trim().is_empty()) {
            bail!("bluetooth.match_prefix must not be empty when set");
        }
        if self.session.connect_timeout_secs == 0 {
            bail!("session.connect_timeout_secs must be at least 1");
        }
        if self.session.send_timeout_secs == 0 {
            bail!("session.send_timeout_secs must be at least 1");
        }
        Ok(())
    }

    pub fn name_pattern(&self) -> NamePattern {
        let pattern = NamePattern::new(self.bluetooth.device_pattern.trim());
        match &self.bluetooth.match_prefix {
            Some(prefix) => pattern.with_prefix(prefix.trim()),
            None => pattern,
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            pattern: self.name_pattern(),
            order: self.bluetooth.enumeration_order,
            connect_timeout: Duration::from_secs(self.session.connect_timeout_secs),
            send_timeout: Duration::from_secs(self.session.send_timeout_secs),
            disconnect_on_send_failure: self.session.disconnect_on_send_failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[bluetooth]\ndevice_pattern = \"HC-05\"\nenumeration_order = \"by-address\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.bluetooth.device_pattern, "HC-05");
        assert_eq!(config.bluetooth.enumeration_order, EnumerationOrder::ByAddress);
        assert_eq!(config.session, SessionConfig::default());

        let options = config.session_options();
        assert_eq!(options.pattern.target(), "HC-05");
        assert_eq!(options.pattern.prefix(), "HC");
        assert_eq!(options.connect_timeout, Duration::from_secs(15));
        assert_eq!(options.send_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_prefix_override() {
        let mut config = Config::default();
        config.bluetooth.match_prefix = Some("bt".to_string());
        assert_eq!(config.name_pattern().prefix(), "BT");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.bluetooth.device_pattern = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.session.connect_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.session.send_timeout_secs = 0;
        assert!(config.validate().is_err());

        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[session]\nconnect_timeout_secs = \"soon\"\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
