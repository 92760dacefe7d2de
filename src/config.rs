//! Configuration types.
//!
//! Everything is read from environment variables. Loading goes through
//! [`AppConfig::from_lookup`] so tests can supply values without touching the
//! process environment.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CORE_MODEL: &str = "gpt-4o";
pub const DEFAULT_MAX_TOKENS: u32 = 8192;
pub const DEFAULT_SEARCH_BASE_URL: &str = "https://api.perplexity.ai";
pub const DEFAULT_SEARCH_MODEL: &str = "sonar";
pub const DEFAULT_DB_PATH: &str = "./data/turnloop.db";
pub const DEFAULT_AGENT: &str = "vanilla";

/// Language model endpoints and model names.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api_key: SecretString,
    pub base_url: String,
    /// Model used when no other slot is configured.
    pub core_model: String,
    pub editor_model: Option<String>,
    pub reasoner_model: Option<String>,
    /// Model that picks tools in `stream_step`.
    pub router_model: Option<String>,
    pub max_tokens: u32,
}

/// Web search backend. Absent when no search key is set.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub models: ModelConfig,
    pub search: Option<SearchConfig>,
    pub db_path: PathBuf,
    /// Filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Directory for a daily rolling log file, if any.
    pub log_dir: Option<PathBuf>,
    pub default_agent: String,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("TURNLOOP_API_KEY")
            .or_else(|| get("OPENAI_API_KEY"))
            .ok_or_else(|| ConfigError::MissingEnvVar("TURNLOOP_API_KEY".to_string()))?;

        let max_tokens = match get("TURNLOOP_MAX_TOKENS") {
            Some(raw) => raw.parse::<u32>().map_err(|e| ConfigError::InvalidValue {
                key: "TURNLOOP_MAX_TOKENS".to_string(),
                message: e.to_string(),
            })?,
            None => DEFAULT_MAX_TOKENS,
        };
        if max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TURNLOOP_MAX_TOKENS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let models = ModelConfig {
            api_key: SecretString::from(api_key),
            base_url: get("TURNLOOP_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            core_model: get("TURNLOOP_CORE_MODEL")
                .unwrap_or_else(|| DEFAULT_CORE_MODEL.to_string()),
            editor_model: get("TURNLOOP_EDITOR_MODEL"),
            reasoner_model: get("TURNLOOP_REASONER_MODEL"),
            router_model: get("TURNLOOP_ROUTER_MODEL"),
            max_tokens,
        };

        let search = get("PERPLEXITY_API_KEY").map(|key| SearchConfig {
            api_key: SecretString::from(key),
            base_url: get("TURNLOOP_SEARCH_BASE_URL")
                .unwrap_or_else(|| DEFAULT_SEARCH_BASE_URL.to_string()),
            model: get("TURNLOOP_SEARCH_MODEL").unwrap_or_else(|| DEFAULT_SEARCH_MODEL.to_string()),
        });

        Ok(Self {
            models,
            search,
            db_path: PathBuf::from(
                get("TURNLOOP_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            ),
            log_filter: get("TURNLOOP_LOG").unwrap_or_else(|| "info".to_string()),
            log_dir: get("TURNLOOP_LOG_DIR").map(PathBuf::from),
            default_agent: get("TURNLOOP_DEFAULT_AGENT")
                .unwrap_or_else(|| DEFAULT_AGENT.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_missing_api_key_is_an_error() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "TURNLOOP_API_KEY"));
    }

    #[test]
    fn test_defaults_apply() {
        let config = load(&[("OPENAI_API_KEY", "sk-1")]).unwrap();
        assert_eq!(config.models.api_key.expose_secret(), "sk-1");
        assert_eq!(config.models.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.models.core_model, DEFAULT_CORE_MODEL);
        assert_eq!(config.models.max_tokens, 8192);
        assert!(config.models.router_model.is_none());
        assert!(config.search.is_none());
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(config.default_agent, "vanilla");
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_turnloop_key_wins_over_openai_key() {
        let config = load(&[("OPENAI_API_KEY", "a"), ("TURNLOOP_API_KEY", "b")]).unwrap();
        assert_eq!(config.models.api_key.expose_secret(), "b");
    }

    #[test]
    fn test_blank_values_count_as_unset() {
        let config = load(&[("TURNLOOP_API_KEY", "k"), ("TURNLOOP_CORE_MODEL", "  ")]).unwrap();
        assert_eq!(config.models.core_model, DEFAULT_CORE_MODEL);
    }

    #[test]
    fn test_search_enabled_by_perplexity_key() {
        let config = load(&[("TURNLOOP_API_KEY", "k"), ("PERPLEXITY_API_KEY", "p")]).unwrap();
        let search = config.search.unwrap();
        assert_eq!(search.model, "sonar");
        assert_eq!(search.base_url, DEFAULT_SEARCH_BASE_URL);
    }

    #[test]
    fn test_invalid_max_tokens_is_rejected() {
        let err = load(&[("TURNLOOP_API_KEY", "k"), ("TURNLOOP_MAX_TOKENS", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = load(&[("TURNLOOP_API_KEY", "k"), ("TURNLOOP_MAX_TOKENS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
