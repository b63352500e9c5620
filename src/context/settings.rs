//! Connection parameters of a context. Heartbeat clones copy these from their owner.

use crate::types::DEFAULT_ORIGIN;
use serde::{Deserialize, Serialize};

/// HTTP keep-alive behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepAlive {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum idle connections kept per host
    #[serde(default = "default_keep_alive_max")]
    pub max: u32,
    /// Idle connection timeout in seconds
    #[serde(default = "default_keep_alive_timeout")]
    pub timeout_sec: u64,
}

fn default_true() -> bool {
    true
}

fn default_keep_alive_max() -> u32 {
    1
}

fn default_keep_alive_timeout() -> u64 {
    50
}

impl Default for KeepAlive {
    fn default() -> Self {
        Self {
            enabled: true,
            max: default_keep_alive_max(),
            timeout_sec: default_keep_alive_timeout(),
        }
    }
}

/// HTTP proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Keys, identity and connection options of a context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSettings {
    pub publish_key: String,
    pub subscribe_key: String,
    pub uuid: String,
    pub auth: Option<String>,
    pub origin: String,
    pub use_tls: bool,
    pub keep_alive: KeepAlive,
    pub proxy: Option<ProxyConfig>,
}

impl ContextSettings {
    /// Settings with a freshly generated UUID and the default origin
    pub fn new(publish_key: impl Into<String>, subscribe_key: impl Into<String>) -> Self {
        Self {
            publish_key: publish_key.into(),
            subscribe_key: subscribe_key.into(),
            uuid: generate_uuid(),
            auth: None,
            origin: DEFAULT_ORIGIN.to_string(),
            use_tls: true,
            keep_alive: KeepAlive::default(),
            proxy: None,
        }
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = uuid.into();
        self
    }

    pub fn with_auth(mut self, auth: impl Into<String>) -> Self {
        self.auth = Some(auth.into());
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }
}

/// Random client identity, `pn-<uuid v4>`
pub fn generate_uuid() -> String {
    format!("pn-{}", uuid::Uuid::new_v4())
}
