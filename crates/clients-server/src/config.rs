//! Configuration for the clients server.

use anyhow::{Context, Result};
use registration_saga::RegistrationPolicy;
use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// API key authentication
    pub auth: AuthConfig,

    /// Master (directory) store configuration
    #[serde(default)]
    pub master: MasterConfig,

    /// Regional tenant store configuration
    #[serde(default)]
    pub tenant: TenantConfig,

    /// Welcome email service configuration
    #[serde(default)]
    pub mailer: MailerConfig,

    /// Registration flow configuration
    #[serde(default)]
    pub registration: RegistrationConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Expected value of the `X-API-KEY` header
    pub api_key: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MasterConfig {
    /// Master PocketBase URL
    #[serde(default = "default_master_url")]
    pub url: String,

    /// Admin token sent as `Authorization`
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Run against seeded in-memory stores instead of PocketBase
    #[serde(default)]
    pub in_memory: bool,

    /// Request timeout
    #[serde(default = "default_store_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TenantConfig {
    /// Admin token for the regional stores
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Request timeout
    #[serde(default = "default_store_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailerConfig {
    /// Email service URL
    #[serde(default = "default_mailer_url")]
    pub url: String,

    /// Send welcome emails (log only if false)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Request timeout
    #[serde(default = "default_mailer_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationConfig {
    /// Plan every new client joins
    #[serde(default = "default_starter_plan")]
    pub starter_plan: String,

    /// Welcome email subject
    #[serde(default = "default_welcome_subject")]
    pub welcome_subject: String,

    /// Roll back a registration whose welcome email failed
    #[serde(default)]
    pub rollback_on_notify_failure: bool,

    /// Retries of the plan membership update
    #[serde(default = "default_plan_update_retries")]
    pub plan_update_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Global requests per minute
    #[serde(default = "default_per_minute")]
    pub per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default implementations
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
        }
    }
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            url: default_master_url(),
            admin_token: None,
            in_memory: false,
            timeout: default_store_timeout(),
        }
    }
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            admin_token: None,
            timeout: default_store_timeout(),
        }
    }
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            url: default_mailer_url(),
            enabled: true,
            timeout: default_mailer_timeout(),
        }
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            starter_plan: default_starter_plan(),
            welcome_subject: default_welcome_subject(),
            rollback_on_notify_failure: false,
            plan_update_retries: default_plan_update_retries(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: default_per_minute(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl From<&RegistrationConfig> for RegistrationPolicy {
    fn from(config: &RegistrationConfig) -> Self {
        Self {
            starter_plan: config.starter_plan.clone(),
            welcome_subject: config.welcome_subject.clone(),
            rollback_on_notify_failure: config.rollback_on_notify_failure,
            plan_update_retries: config.plan_update_retries,
        }
    }
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8082
}

fn default_master_url() -> String {
    "http://127.0.0.1:8090".into()
}

fn default_store_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_mailer_url() -> String {
    "http://127.0.0.1:3001".into()
}

fn default_mailer_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_true() -> bool {
    true
}

fn default_starter_plan() -> String {
    "Starter".into()
}

fn default_welcome_subject() -> String {
    "Welcome to PAF!".into()
}

fn default_plan_update_retries() -> u32 {
    5
}

fn default_per_minute() -> u32 {
    30
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "auth": { "api_key": "k" }
        }))
        .unwrap();

        assert_eq!(config.server.port, 8082);
        assert_eq!(config.auth.api_key.expose_secret(), "k");
        assert!(!config.master.in_memory);
        assert!(config.mailer.enabled);
        assert_eq!(config.registration.starter_plan, "Starter");
        assert!(!config.registration.rollback_on_notify_failure);
        assert_eq!(config.tenant.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_policy_from_config() {
        let config = RegistrationConfig {
            rollback_on_notify_failure: true,
            plan_update_retries: 2,
            ..Default::default()
        };

        let policy = RegistrationPolicy::from(&config);
        assert!(policy.rollback_on_notify_failure);
        assert_eq!(policy.plan_update_retries, 2);
        assert_eq!(policy.welcome_subject, "Welcome to PAF!");
    }

    #[test]
    fn test_humantime_timeout() {
        let config: MailerConfig =
            serde_json::from_value(serde_json::json!({ "timeout": "3s" })).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(3));
    }
}
