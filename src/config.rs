//! Startup configuration.
//!
//! The service endpoint, credential, API version, and the assistant catalog
//! all come from a TOML file (with CLI/env overrides) instead of being baked
//! into the binary.

use crate::model::AssistantOption;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_KEY_ENV: &str = "AZURE_OPENAI_API_KEY";

const DEFAULT_API_VERSION: &str = "2024-05-01-preview";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(8);

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Service base URL, e.g. "https://myresource.openai.azure.com".
    pub endpoint: String,

    /// Static credential. Falls back to the AZURE_OPENAI_API_KEY
    /// environment variable when absent from the file.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Versioned API surface passed as the api-version query parameter.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Fixed interval between run status polls.
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Assistant catalog shown in the selector.
    #[serde(default, rename = "assistant")]
    pub assistants: Vec<AssistantOption>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: None,
            api_version: default_api_version(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            assistants: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an explicit path, or from the default
    /// location if it exists, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default = Self::default_path();
                match default {
                    Some(ref p) if p.exists() => Self::from_file(p)?,
                    _ => Self::default(),
                }
            }
        };
        config.load_env_vars();
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Default config location: `<config dir>/assistant-desk/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("assistant-desk").join("config.toml"))
    }

    fn load_env_vars(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var(API_KEY_ENV).ok();
        }
    }

    /// Look up an option by name (case-insensitive) or by 1-based index.
    pub fn find_assistant(&self, selector: &str) -> Option<&AssistantOption> {
        if let Ok(idx) = selector.parse::<usize>() {
            if idx >= 1 {
                return self.assistants.get(idx - 1);
            }
        }
        self.assistants
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(selector))
    }
}
