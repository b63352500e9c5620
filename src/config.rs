//! Configuration System
//!
//! Layered client configuration: built-in defaults, the user's global file, project files and
//! `PUBSUB__*` environment variables, in increasing precedence. The loaded [`ClientConfig`]
//! yields the settings contexts and the heartbeat scheduler are built from.

use crate::context::{generate_uuid, Context, ContextOptions, ContextSettings, KeepAlive, ProxyConfig};
use crate::heartbeat::HeartbeatConfig;
use crate::logging::LoggingConfig;
use crate::types::{
    DEFAULT_ORIGIN, DEFAULT_TRANSACTION_TIMER_MS, DEFAULT_WAIT_CONNECT_TIMER_MS,
    MIN_TRANSACTION_TIMER_MS, MIN_WAIT_CONNECT_TIMER_MS,
};
use serde::{Deserialize, Serialize};

mod loader;
mod merge;
mod sources;

pub use loader::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub keys: KeysConfig,

    #[serde(default = "default_origin")]
    pub origin: String,

    /// Client identity; a random one is generated when unset
    #[serde(default)]
    pub uuid: Option<String>,

    #[serde(default)]
    pub auth: Option<String>,

    #[serde(default = "default_true")]
    pub use_tls: bool,

    #[serde(default)]
    pub keep_alive: KeepAlive,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    #[serde(default)]
    pub heartbeat: HeartbeatSettings,

    #[serde(default)]
    pub proxy: Option<ProxyConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Publish and subscribe keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysConfig {
    #[serde(default)]
    pub publish_key: String,
    #[serde(default)]
    pub subscribe_key: String,
}

/// Per-context timeouts in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_transaction_ms")]
    pub transaction_ms: u64,
    #[serde(default = "default_connect_ms")]
    pub connect_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            transaction_ms: default_transaction_ms(),
            connect_ms: default_connect_ms(),
        }
    }
}

/// Auto-heartbeat settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatSettings {
    /// Enable auto heartbeat on contexts built from this configuration
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_period_sec")]
    pub period_sec: u64,
    #[serde(default)]
    pub scheduler: HeartbeatConfig,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            period_sec: default_period_sec(),
            scheduler: HeartbeatConfig::default(),
        }
    }
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

fn default_true() -> bool {
    true
}

fn default_transaction_ms() -> u64 {
    DEFAULT_TRANSACTION_TIMER_MS
}

fn default_connect_ms() -> u64 {
    DEFAULT_WAIT_CONNECT_TIMER_MS
}

fn default_period_sec() -> u64 {
    60
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            keys: KeysConfig::default(),
            origin: default_origin(),
            uuid: None,
            auth: None,
            use_tls: true,
            keep_alive: KeepAlive::default(),
            timeouts: TimeoutsConfig::default(),
            heartbeat: HeartbeatSettings::default(),
            proxy: None,
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Keys(String),
    Origin(String),
    Timeouts(String),
    Heartbeat(String),
    Proxy(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Keys(msg) => write!(f, "Keys: {}", msg),
            ValidationError::Origin(msg) => write!(f, "Origin: {}", msg),
            ValidationError::Timeouts(msg) => write!(f, "Timeouts: {}", msg),
            ValidationError::Heartbeat(msg) => write!(f, "Heartbeat: {}", msg),
            ValidationError::Proxy(msg) => write!(f, "Proxy: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ClientConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.keys.subscribe_key.trim().is_empty() {
            errors.push(ValidationError::Keys(
                "subscribe_key cannot be empty".to_string(),
            ));
        }

        if self.origin.trim().is_empty() {
            errors.push(ValidationError::Origin("origin cannot be empty".to_string()));
        } else if self.origin.contains("://") || self.origin.contains('/') {
            errors.push(ValidationError::Origin(format!(
                "'{}' must be a host (and optional port), not a URL",
                self.origin
            )));
        }

        if matches!(&self.uuid, Some(uuid) if uuid.trim().is_empty()) {
            errors.push(ValidationError::Keys("uuid cannot be empty when set".to_string()));
        }

        if self.timeouts.transaction_ms < MIN_TRANSACTION_TIMER_MS {
            errors.push(ValidationError::Timeouts(format!(
                "transaction_ms {} is below the minimum of {}",
                self.timeouts.transaction_ms, MIN_TRANSACTION_TIMER_MS
            )));
        }
        if self.timeouts.connect_ms < MIN_WAIT_CONNECT_TIMER_MS {
            errors.push(ValidationError::Timeouts(format!(
                "connect_ms {} is below the minimum of {}",
                self.timeouts.connect_ms, MIN_WAIT_CONNECT_TIMER_MS
            )));
        }

        if self.heartbeat.period_sec == 0 {
            errors.push(ValidationError::Heartbeat(
                "period_sec must be greater than zero".to_string(),
            ));
        }
        if self.heartbeat.scheduler.max_thumpers == 0 {
            errors.push(ValidationError::Heartbeat(
                "scheduler.max_thumpers must be greater than zero".to_string(),
            ));
        }

        if let Some(proxy) = &self.proxy {
            if proxy.url.trim().is_empty() {
                errors.push(ValidationError::Proxy("url cannot be empty".to_string()));
            }
        }

        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Settings for a context; generates a UUID when none is configured
    pub fn context_settings(&self) -> ContextSettings {
        ContextSettings {
            publish_key: self.keys.publish_key.clone(),
            subscribe_key: self.keys.subscribe_key.clone(),
            uuid: self.uuid.clone().unwrap_or_else(generate_uuid),
            auth: self.auth.clone(),
            origin: self.origin.clone(),
            use_tls: self.use_tls,
            keep_alive: self.keep_alive.clone(),
            proxy: self.proxy.clone(),
        }
    }

    /// Build a context with the configured settings and timeouts
    pub fn build_context(&self, options: ContextOptions) -> Context {
        let ctx = Context::with_options(self.context_settings(), options);
        ctx.set_transaction_timeout(self.timeouts.transaction_ms);
        ctx.set_connect_timeout(self.timeouts.connect_ms);
        ctx
    }
}
