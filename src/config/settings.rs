use crate::llm::anthropic::{DEFAULT_MAIN_MODEL, DEFAULT_QUICK_MODEL};
use crate::permissions::{PermissionRules, parse_rule_key};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Config directory not found")]
    DirectoryNotFound,

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    pub llm: LLMConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub permissions: PermissionRules,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LLMConfig {
    pub provider: String,
    pub quick_model: String,
    pub main_model: String,
    pub api_key_env: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GateConfig {
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dump_dir: Option<PathBuf>,
}

fn default_timeout_seconds() -> u64 {
    300
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            dump_dir: None,
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        let home = std::env::var("HOME").map_err(|_| ConfigError::DirectoryNotFound)?;
        Ok(PathBuf::from(home).join(".config").join("bashgate"))
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load and validate configuration from a file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ReadError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Config file not found",
            )));
        }

        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        config.validate()?;

        Ok(config)
    }

    /// Load the default config file, or defaults when there is none
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Ok(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default_config()),
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a file readable only by its owner
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        // Set permissions to 600 (owner read/write only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    /// Create default configuration
    pub fn default_config() -> Self {
        Config {
            llm: LLMConfig {
                provider: "anthropic".to_string(),
                quick_model: DEFAULT_QUICK_MODEL.to_string(),
                main_model: DEFAULT_MAIN_MODEL.to_string(),
                api_key_env: "ANTHROPIC_API_KEY".to_string(),
                api_key: None,
            },
            gate: GateConfig::default(),
            permissions: PermissionRules::default(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.provider != "anthropic" {
            return Err(ConfigError::InvalidValue(format!(
                "Unsupported LLM provider: {}. Only 'anthropic' is supported",
                self.llm.provider
            )));
        }

        for model in [&self.llm.quick_model, &self.llm.main_model] {
            if !model.starts_with("claude-") {
                return Err(ConfigError::InvalidValue(format!(
                    "Invalid model name: {}. Must be a Claude model",
                    model
                )));
            }
        }

        if self.gate.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "gate.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if let Some(key) = self
            .permissions
            .keys()
            .find(|key| parse_rule_key(key).is_none())
        {
            return Err(ConfigError::InvalidValue(format!(
                "Malformed permission rule: {}",
                key
            )));
        }

        Ok(())
    }

    /// Get API key from environment variable or config
    pub fn get_api_key(&self) -> Option<String> {
        // First try environment variable
        if let Ok(key) = std::env::var(&self.llm.api_key_env) {
            if !key.is_empty() {
                return Some(key);
            }
        }

        // Fall back to config file if present
        self.llm.api_key.clone()
    }

    /// Check if API key is available
    pub fn has_api_key(&self) -> bool {
        self.get_api_key().is_some()
    }
}
