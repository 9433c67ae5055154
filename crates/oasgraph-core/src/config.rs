//! Configuration management for oasgraph
//!
//! Loads configuration with priority:
//! 1. oasgraph.toml (or specified config file)
//! 2. Environment variables referenced as `${VAR_NAME}`
//! 3. Defaults

use crate::options::Options;
use anyhow::{Context, Result, anyhow};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "oasgraph.toml";

/// oasgraph configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OasGraphConfig {
    /// API documents to translate (file paths or URLs)
    #[serde(default)]
    pub documents: Vec<String>,

    #[serde(default)]
    pub options: Options,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Credentials keyed by security scheme name, used for requests that
    /// do not go through a viewer
    #[serde(default)]
    pub credentials: IndexMap<String, CredentialConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Observability configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Default log filter when RUST_LOG is unset
    pub log_filter: Option<String>,
    pub service_name: Option<String>,
    /// Emit log lines as JSON
    #[serde(default)]
    pub json_logs: bool,
}

/// Credentials for one security scheme.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialConfig {
    ApiKey { key: String },
    Basic { username: String, password: String },
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl OasGraphConfig {
    /// Load configuration from `oasgraph.toml` in the current directory or
    /// one of its parents.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p.to_path_buf()
        } else {
            Self::find_config_file()?
        };

        tracing::debug!("Loading configuration from: {:?}", config_path);

        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))
    }

    /// Parse configuration from TOML text and resolve `${VAR}` references.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: OasGraphConfig = toml::from_str(contents)?;
        config.resolve_env_vars()?;
        Ok(config)
    }

    /// Find oasgraph.toml by searching current directory and parents
    fn find_config_file() -> Result<PathBuf> {
        let mut current = env::current_dir()?;

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Ok(config_path);
            }

            if !current.pop() {
                break;
            }
        }

        Err(anyhow!(
            "{} not found. Pass a config path or list the API documents on the command line",
            CONFIG_FILE_NAME
        ))
    }

    /// Resolve ${VAR_NAME} references to environment variables
    fn resolve_env_vars(&mut self) -> Result<()> {
        if let Some(ref url) = self.options.base_url {
            self.options.base_url = Some(Self::require_env_var(url)?);
        }

        for value in self.options.headers.values_mut() {
            *value = Self::require_env_var(value)?;
        }

        for value in self.options.query_params.values_mut() {
            *value = Self::require_env_var(value)?;
        }

        for credential in self.credentials.values_mut() {
            match credential {
                CredentialConfig::ApiKey { key } => {
                    *key = Self::require_env_var(key)?;
                }
                CredentialConfig::Basic { username, password } => {
                    *username = Self::require_env_var(username)?;
                    *password = Self::require_env_var(password)?;
                }
            }
        }

        Ok(())
    }

    fn require_env_var(value: &str) -> Result<String> {
        Self::resolve_env_var(value)
            .ok_or_else(|| anyhow!("Environment variable referenced by '{}' is not set", value))
    }

    /// Resolve a single ${VAR_NAME} reference
    fn resolve_env_var(value: &str) -> Option<String> {
        if value.starts_with("${") && value.ends_with('}') {
            let var_name = &value[2..value.len() - 1];
            env::var(var_name).ok()
        } else {
            Some(value.to_string())
        }
    }

    /// Create test-friendly defaults (no config file required)
    pub fn test_defaults() -> Self {
        Self {
            documents: Vec::new(),
            options: Options::default(),
            server: ServerConfig::default(),
            observability: ObservabilityConfig::default(),
            credentials: IndexMap::new(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}
