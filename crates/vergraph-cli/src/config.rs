//! CLI configuration

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
const OUTPUT_FORMATS: [&str; 2] = ["table", "json"];

/// Get default config file path
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vergraph")
        .join("config.toml")
}

/// Configuration for the CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    /// Default for rebase steps that do not say whether to force
    pub force_rebase: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_format: "table".to_string(),
            log_level: None,
            force_rebase: false,
        }
    }
}

impl Config {
    pub fn keys() -> &'static [&'static str] {
        &["output_format", "log_level", "force_rebase"]
    }

    /// Load from `path`; a missing or unreadable file yields the defaults,
    /// a file that is not valid config is an error
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let Ok(contents) = std::fs::read_to_string(path) else {
            return Ok(Self::default());
        };
        toml::from_str(&contents)
            .with_context(|| format!("Malformed config at {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "output_format" => Some(self.output_format.clone()),
            "log_level" => self.log_level.clone(),
            "force_rebase" => Some(self.force_rebase.to_string()),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "output_format" => {
                let value = value.to_lowercase();
                if !OUTPUT_FORMATS.contains(&value.as_str()) {
                    anyhow::bail!(
                        "Invalid output format '{}'. Expected one of: {}",
                        value,
                        OUTPUT_FORMATS.join(", ")
                    );
                }
                self.output_format = value;
            }
            "log_level" => {
                let value = value.to_lowercase();
                if !LOG_LEVELS.contains(&value.as_str()) {
                    anyhow::bail!(
                        "Invalid log level '{}'. Expected one of: {}",
                        value,
                        LOG_LEVELS.join(", ")
                    );
                }
                self.log_level = Some(value);
            }
            "force_rebase" => {
                self.force_rebase = value
                    .parse()
                    .with_context(|| format!("Invalid boolean '{}'", value))?;
            }
            _ => anyhow::bail!(
                "Unknown config key: {}. Available keys: {}",
                key,
                Self::keys().join(", ")
            ),
        }
        Ok(())
    }
}
