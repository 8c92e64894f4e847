use anyhow::Context;
use hopfield_core::HopfieldConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "hopfield.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub network: HopfieldConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// One of trace, debug, info, warn, error
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load `path`, or `./hopfield.toml` if present, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !local.exists() {
                    return Ok(Config::default());
                }
                local
            }
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
