//! Configuration management for Aperture.
//!
//! Configuration is loaded from the platform config directory (or an explicit
//! path) with defaults for every section. Provider API keys are usually
//! `${ENV_VAR}` references resolved at startup.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Aperture.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Retry/backoff settings
    pub retry: RetryConfig,

    /// Provider credentials, models and pricing
    pub providers: ProvidersConfig,

    /// Per-image price estimation
    pub pricing: PricingConfig,

    /// In-memory observability buffers
    pub monitor: MonitorConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.aperture.aperture/config.toml
    /// - Linux: ~/.config/aperture/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\aperture\config\config.toml
    ///
    /// Falls back to ~/.aperture/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "aperture", "aperture")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".aperture").join("config.toml")
            })
    }

    /// Expand `~` in a user-supplied path.
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).into_owned())
    }

    /// Socket address string for the HTTP listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProviderId;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8787);
        assert_eq!(config.retry.max_retries, 1000);
        assert_eq!(config.retry.max_retry_time_ms, 21_600_000);
        assert_eq!(config.monitor.error_log_capacity, 100);
        assert_eq!(config.bind_address(), "127.0.0.1:8787");
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[server]"));
        assert!(toml.contains("[retry]"));
        assert!(toml.contains("[providers.anthropic]"));
    }

    #[test]
    fn test_partial_provider_section_falls_back_to_defaults() {
        let toml = r#"
            [providers.groq]
            model = "llama-3.2-90b-vision-preview"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let groq = config.providers.settings(ProviderId::Groq);
        assert_eq!(groq.model, "llama-3.2-90b-vision-preview");
        assert_eq!(groq.endpoint, "https://api.groq.com/openai");
        assert_eq!(groq.api_key, "${GROQ_API_KEY}");
        assert!(groq.enabled);

        // Untouched sections keep full defaults
        let anthropic = config.providers.settings(ProviderId::Anthropic);
        assert_eq!(anthropic.input_cost_per_mtok, 3.0);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nport = 9000\n\n[retry]\nmax_retries = 5\n\n[providers.grok]\nenabled = false"
        )
        .unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_backoff_ms, 1000);
        assert!(!config.providers.settings(ProviderId::Grok).enabled);
    }

    #[test]
    fn test_load_from_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retry]\nmax_retries = 0").unwrap();
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("max_retries"));
    }

    #[test]
    fn test_resolve_env_var() {
        // Non-env-var strings pass through
        assert_eq!(resolve_env_var("plain-key"), Some("plain-key".to_string()));
        // Empty returns None
        assert_eq!(resolve_env_var(""), None);
        // Unset env var returns None
        assert_eq!(resolve_env_var("${DEFINITELY_NOT_SET_XYZ_123}"), None);
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = Config::expand_path("~/aperture.toml");
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }
}
