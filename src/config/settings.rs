//! Configuration settings for the Tabletalk service.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Row limit applied when a query carries no usable `LIMIT` clause.
pub const DEFAULT_QUERY_LIMIT: usize = 10;

/// Upper bound on accepted chat message length, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 500;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub supabase: SupabaseConfig,
    pub openai: OpenAiConfig,
    pub limits: LimitsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            supabase: SupabaseConfig::default(),
            openai: OpenAiConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations or use defaults.
    pub fn load() -> Result<Self> {
        // Try standard config locations
        let config_paths = [
            // Current directory
            PathBuf::from("tabletalk.toml"),
            PathBuf::from("config.toml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("tabletalk/config.toml"))
                .unwrap_or_default(),
            // Home directory
            dirs::home_dir()
                .map(|p| p.join(".tabletalk/config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        if self.openai.model.is_empty() {
            return Err(ConfigError::MissingField("openai.model".to_string()).into());
        }
        if self.openai.base_url.is_empty() {
            return Err(ConfigError::MissingField("openai.base_url".to_string()).into());
        }

        if self.limits.default_query_limit == 0 {
            return Err(ConfigError::Invalid("default_query_limit must be > 0".to_string()).into());
        }
        if self.limits.max_message_length == 0 {
            return Err(ConfigError::Invalid("max_message_length must be > 0".to_string()).into());
        }

        Ok(())
    }

    /// Resolve the credentials for one request.
    ///
    /// Precedence per value: request-supplied, then config file, then
    /// environment. Credentials are threaded through the pipeline as a
    /// plain value; there is no process-wide credential state.
    pub fn resolve_credentials(
        &self,
        supabase_url: Option<&str>,
        supabase_key: Option<&str>,
        openai_key: Option<&str>,
    ) -> Result<Credentials> {
        let supabase_url =
            first_present(supabase_url, Some(self.supabase.url.as_str()), "SUPABASE_URL")
                .ok_or_else(|| ConfigError::MissingField("supabase_url".to_string()))?;
        let supabase_key = first_present(supabase_key, self.supabase.key.as_deref(), "SUPABASE_KEY")
            .ok_or_else(|| ConfigError::MissingField("supabase_key".to_string()))?;
        let openai_api_key =
            first_present(openai_key, self.openai.api_key.as_deref(), "OPENAI_API_KEY")
                .ok_or_else(|| ConfigError::MissingField("openai_key".to_string()))?;

        Ok(Credentials {
            supabase_url,
            supabase_key,
            openai_api_key,
        })
    }
}

/// First non-empty value among request, config, and environment.
fn first_present(request: Option<&str>, config: Option<&str>, env_key: &str) -> Option<String> {
    request
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| config.filter(|v| !v.is_empty()).map(str::to_string))
        .or_else(|| std::env::var(env_key).ok().filter(|v| !v.is_empty()))
}

/// Fully resolved credentials for a single request.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub supabase_url: String,
    pub supabase_key: String,
    pub openai_api_key: String,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Listen port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Supabase backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Service or anon key (loaded from environment if not set)
    pub key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            key: None,
            timeout_secs: 30,
        }
    }
}

/// OpenAI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API key (loaded from environment if not set)
    pub api_key: Option<String>,
    /// Chat completion model
    pub model: String,
    /// Base URL for the API
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-3.5-turbo".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Query and input limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Row limit when a query has no `LIMIT`
    pub default_query_limit: usize,
    /// Maximum accepted chat message length
    pub max_message_length: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default_query_limit: DEFAULT_QUERY_LIMIT,
            max_message_length: MAX_MESSAGE_LENGTH,
        }
    }
}
