//! Server configuration
//!
//! All configuration comes from environment variables, loaded once at
//! startup. Invalid or missing required values are a fatal startup
//! error.

use loghunter::providers::{
  AnthropicSettings, OllamaSettings, OpenAiSettings, ProviderSettings, VllmSettings,
};
use std::time::Duration;

use crate::error::ServerError;

/// Top-level configuration for the LogHunter server
#[derive(Debug, Clone)]
pub struct Config {
  pub server: ServerConfig,
  pub database: DatabaseConfig,
  pub redis: RedisConfig,
  pub loki: LokiConfig,
  pub ai: AiConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
  pub port: u16,
  pub env: String,
  pub rate_limit_per_minute: i64,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
  pub url: String,
  pub max_open_conns: u32,
  pub max_idle_conns: u32,
  pub conn_max_lifetime: Duration,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
  pub url: String,
}

#[derive(Debug, Clone)]
pub struct LokiConfig {
  pub base_url: String,
  pub username: Option<String>,
  pub password: Option<String>,
  pub org_id: Option<String>,
  pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
  pub provider: String,
  pub inference_timeout: Duration,
  pub ollama_base_url: String,
  pub ollama_model: String,
  pub vllm_base_url: String,
  pub vllm_model: String,
  pub openai_api_key: String,
  pub openai_model: String,
  pub anthropic_api_key: String,
  pub anthropic_model: String,
}

const VALID_PROVIDERS: [&str; 4] = ["ollama", "vllm", "openai", "anthropic"];

impl Config {
  /// Load configuration from environment variables and validate it
  pub fn load() -> Result<Self, ServerError> {
    let cfg = Self {
      server: ServerConfig {
        port: env_parse("LOGHUNTER_PORT", 8080),
        env: env_string("LOGHUNTER_ENV", "development"),
        rate_limit_per_minute: env_parse("LOGHUNTER_RATE_LIMIT_PER_MINUTE", 60),
      },
      database: DatabaseConfig {
        url: env_optional("DATABASE_URL").unwrap_or_default(),
        max_open_conns: env_parse("DATABASE_MAX_OPEN_CONNS", 25),
        max_idle_conns: env_parse("DATABASE_MAX_IDLE_CONNS", 5),
        conn_max_lifetime: Duration::from_secs(env_parse("DATABASE_CONN_MAX_LIFETIME_SECS", 300)),
      },
      redis: RedisConfig {
        url: env_optional("REDIS_URL").unwrap_or_default(),
      },
      loki: LokiConfig {
        base_url: env_optional("LOKI_BASE_URL").unwrap_or_default(),
        username: env_optional("LOKI_USERNAME"),
        password: env_optional("LOKI_PASSWORD"),
        org_id: Some(env_string("LOKI_ORG_ID", "default")),
        timeout: Duration::from_secs(env_parse("LOKI_TIMEOUT", 30)),
      },
      ai: AiConfig {
        provider: env_optional("AI_PROVIDER").unwrap_or_default(),
        inference_timeout: Duration::from_secs(env_parse("AI_INFERENCE_TIMEOUT_SECS", 60)),
        ollama_base_url: env_string("OLLAMA_BASE_URL", "http://localhost:11434"),
        ollama_model: env_string("OLLAMA_MODEL", "llama3"),
        vllm_base_url: env_string("VLLM_BASE_URL", "http://localhost:8000"),
        vllm_model: env_string("VLLM_MODEL", ""),
        openai_api_key: env_optional("OPENAI_API_KEY").unwrap_or_default(),
        openai_model: env_string("OPENAI_MODEL", "gpt-4"),
        anthropic_api_key: env_optional("ANTHROPIC_API_KEY").unwrap_or_default(),
        anthropic_model: env_string("ANTHROPIC_MODEL", "claude-sonnet-4-5"),
      },
    };

    cfg.validate()?;
    Ok(cfg)
  }

  fn validate(&self) -> Result<(), ServerError> {
    if self.database.url.is_empty() {
      return Err(ServerError::config("DATABASE_URL is required"));
    }
    if self.redis.url.is_empty() {
      return Err(ServerError::config("REDIS_URL is required"));
    }

    if self.loki.base_url.is_empty() {
      return Err(ServerError::config("LOKI_BASE_URL is required"));
    }
    if !self.loki.base_url.starts_with("http://") && !self.loki.base_url.starts_with("https://") {
      return Err(ServerError::config(format!(
        "LOKI_BASE_URL must start with http:// or https://, got {:?}",
        self.loki.base_url
      )));
    }

    if self.ai.provider.is_empty() {
      return Err(ServerError::config("AI_PROVIDER is required"));
    }
    if !VALID_PROVIDERS.contains(&self.ai.provider.as_str()) {
      return Err(ServerError::config(format!(
        "AI_PROVIDER must be one of ollama, vllm, openai, anthropic; got {:?}",
        self.ai.provider
      )));
    }
    if self.ai.provider == "openai" && self.ai.openai_api_key.is_empty() {
      return Err(ServerError::config(
        "OPENAI_API_KEY is required when AI_PROVIDER is openai",
      ));
    }
    if self.ai.provider == "anthropic" && self.ai.anthropic_api_key.is_empty() {
      return Err(ServerError::config(
        "ANTHROPIC_API_KEY is required when AI_PROVIDER is anthropic",
      ));
    }

    Ok(())
  }
}

impl AiConfig {
  /// Convert to the core provider settings
  pub fn provider_settings(&self) -> ProviderSettings {
    ProviderSettings {
      provider: self.provider.clone(),
      inference_timeout: self.inference_timeout,
      ollama: OllamaSettings {
        base_url: self.ollama_base_url.clone(),
        model: self.ollama_model.clone(),
      },
      vllm: VllmSettings {
        base_url: self.vllm_base_url.clone(),
        model: self.vllm_model.clone(),
      },
      openai: OpenAiSettings {
        api_key: self.openai_api_key.clone(),
        model: self.openai_model.clone(),
      },
      anthropic: AnthropicSettings {
        api_key: self.anthropic_api_key.clone(),
        model: self.anthropic_model.clone(),
      },
    }
  }
}

fn env_optional(key: &str) -> Option<String> {
  std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_string(key: &str, default: &str) -> String {
  env_optional(key).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
  env_optional(key)
    .and_then(|v| v.parse().ok())
    .unwrap_or(default)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn valid_config() -> Config {
    Config {
      server: ServerConfig {
        port: 8080,
        env: "test".to_string(),
        rate_limit_per_minute: 60,
      },
      database: DatabaseConfig {
        url: "postgres://localhost/loghunter".to_string(),
        max_open_conns: 25,
        max_idle_conns: 5,
        conn_max_lifetime: Duration::from_secs(300),
      },
      redis: RedisConfig {
        url: "redis://localhost:6379".to_string(),
      },
      loki: LokiConfig {
        base_url: "http://localhost:3100".to_string(),
        username: None,
        password: None,
        org_id: Some("default".to_string()),
        timeout: Duration::from_secs(30),
      },
      ai: AiConfig {
        provider: "ollama".to_string(),
        inference_timeout: Duration::from_secs(60),
        ollama_base_url: "http://localhost:11434".to_string(),
        ollama_model: "llama3".to_string(),
        vllm_base_url: "http://localhost:8000".to_string(),
        vllm_model: String::new(),
        openai_api_key: String::new(),
        openai_model: "gpt-4".to_string(),
        anthropic_api_key: String::new(),
        anthropic_model: "claude-sonnet-4-5".to_string(),
      },
    }
  }

  #[test]
  fn test_valid_config_passes() {
    assert!(valid_config().validate().is_ok());
  }

  #[test]
  fn test_missing_required_values_fail() {
    let mut cfg = valid_config();
    cfg.database.url = String::new();
    assert!(cfg.validate().is_err());

    let mut cfg = valid_config();
    cfg.redis.url = String::new();
    assert!(cfg.validate().is_err());

    let mut cfg = valid_config();
    cfg.loki.base_url = String::new();
    assert!(cfg.validate().is_err());

    let mut cfg = valid_config();
    cfg.ai.provider = String::new();
    assert!(cfg.validate().is_err());
  }

  #[test]
  fn test_loki_base_url_scheme_enforced() {
    let mut cfg = valid_config();
    cfg.loki.base_url = "localhost:3100".to_string();
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("LOKI_BASE_URL"));

    cfg.loki.base_url = "https://loki.example.com".to_string();
    assert!(cfg.validate().is_ok());
  }

  #[test]
  fn test_unknown_provider_rejected() {
    let mut cfg = valid_config();
    cfg.ai.provider = "skynet".to_string();
    assert!(cfg.validate().is_err());
  }

  #[test]
  fn test_api_keys_required_for_hosted_providers() {
    let mut cfg = valid_config();
    cfg.ai.provider = "openai".to_string();
    assert!(cfg.validate().is_err());
    cfg.ai.openai_api_key = "sk-test".to_string();
    assert!(cfg.validate().is_ok());

    let mut cfg = valid_config();
    cfg.ai.provider = "anthropic".to_string();
    assert!(cfg.validate().is_err());
    cfg.ai.anthropic_api_key = "sk-ant-test".to_string();
    assert!(cfg.validate().is_ok());
  }

  #[test]
  fn test_provider_settings_conversion() {
    let cfg = valid_config();
    let settings = cfg.ai.provider_settings();
    assert_eq!(settings.provider, "ollama");
    assert_eq!(settings.ollama.model, "llama3");
    assert_eq!(settings.inference_timeout, Duration::from_secs(60));
  }
}
