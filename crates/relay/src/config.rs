use serde::Deserialize;
use thiserror::Error;
use tokio::time::Duration;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// The provider caps emergency re-delivery parameters: retries may not come
/// faster than every 30 seconds and an emergency may not outlive 3 hours.
const MIN_EMERGENCY_RETRY_SECS: u32 = 30;
const MAX_EMERGENCY_EXPIRE_SECS: u32 = 10800;

#[derive(Clone, Debug, Deserialize)]
pub struct RelayConfig {
    /// Base URL of the provider's REST API.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Application token issued by the provider.
    pub token: String,
    /// Seconds between poll cycles over the pending-ack registry.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Per-request timeout towards the provider.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Seconds between provider-side re-deliveries of an emergency message.
    #[serde(default = "default_emergency_retry_secs")]
    pub emergency_retry_secs: u32,
    /// Seconds until the provider stops re-delivering an unacknowledged
    /// emergency message.
    #[serde(default = "default_emergency_expire_secs")]
    pub emergency_expire_secs: u32,
}

fn default_api_url() -> String {
    "https://api.pushover.net/1/".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_emergency_retry_secs() -> u32 {
    600
}

fn default_emergency_expire_secs() -> u32 {
    3600
}

impl RelayConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.is_empty() {
            return Err(ConfigError::Validation("token must not be empty".into()));
        }
        let url = Url::parse(&self.api_url)
            .map_err(|e| ConfigError::Validation(format!("api_url is not a valid URL: {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "api_url scheme must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "poll_interval_secs must be > 0".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "request_timeout_secs must be > 0".into(),
            ));
        }
        if self.emergency_retry_secs < MIN_EMERGENCY_RETRY_SECS {
            return Err(ConfigError::Validation(format!(
                "emergency_retry_secs must be >= {MIN_EMERGENCY_RETRY_SECS}"
            )));
        }
        if self.emergency_expire_secs > MAX_EMERGENCY_EXPIRE_SECS {
            return Err(ConfigError::Validation(format!(
                "emergency_expire_secs must be <= {MAX_EMERGENCY_EXPIRE_SECS}"
            )));
        }
        Ok(())
    }
}

/// Load relay configuration from `relay.yaml` + environment overrides.
///
/// Any variable of the form `PUSHOVER__<KEY>` (e.g. `PUSHOVER__TOKEN`)
/// overrides the file value.
///
/// Returns a `ConfigError` instead of panicking so the caller can decide how
/// to fail.
pub fn load_config() -> Result<RelayConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name("relay").required(false))
        .add_source(Environment::with_prefix("pushover").separator("__"))
        .build()?;

    let relay: RelayConfig = cfg.try_deserialize()?;
    relay.validate()?;
    Ok(relay)
}

/// Convenience helper for binaries wanting panic-on-error behaviour.
pub fn load_config_or_panic() -> RelayConfig {
    match load_config() {
        Ok(c) => c,
        Err(e) => panic!("Failed to load configuration: {e}"),
    }
}
