use std::time::Duration;

use serde::Deserialize;

use crate::services::vision::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// API key for the vision model provider. Jobs fail with a
    /// configuration error while it is missing.
    #[serde(default)]
    pub ai_api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_ai_base_url")]
    pub ai_base_url: String,

    /// Model used when a submission does not name one.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Per-request timeout for model calls.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Attempts per model call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles after each attempt.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound on submission bodies.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// How long shutdown waits for the running job to finish.
    #[serde(default = "default_shutdown_drain_secs")]
    pub shutdown_drain_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_ai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_shutdown_drain_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_drain(&self) -> Duration {
        Duration::from_secs(self.shutdown_drain_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let config: AppConfig = envy::from_iter(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.ai_api_key, None);
        assert_eq!(config.default_model, "gpt-4o-mini");
        assert_eq!(config.retry_policy().max_attempts, 3);
        assert_eq!(config.retry_policy().base_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_overrides_parsed() {
        let vars = vec![
            ("AI_API_KEY".to_string(), "sk-test".to_string()),
            ("MAX_ATTEMPTS".to_string(), "0".to_string()),
            ("DEFAULT_MODEL".to_string(), "gpt-4o".to_string()),
        ];
        let config: AppConfig = envy::from_iter(vars).unwrap();
        assert_eq!(config.ai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.default_model, "gpt-4o");
        // At least one attempt is always made.
        assert_eq!(config.retry_policy().max_attempts, 1);
    }
}
