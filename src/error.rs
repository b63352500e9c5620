//! Error types for the publish/subscribe client.
//!
//! Transaction outcomes are not errors: they travel as [`crate::types::TransactionResult`]
//! codes. The enums here cover the fallible operations around transactions: context
//! lifecycle, heartbeat scheduling, transports and configuration.

use thiserror::Error;

/// Context lifecycle errors
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Transaction still in progress after waiting {waited_ms} ms")]
    FreeTimeout { waited_ms: u64 },

    #[error("Transaction did not finish within {waited_ms} ms")]
    AwaitTimeout { waited_ms: u64 },
}

/// Auto-heartbeat scheduling errors
#[derive(Debug, Error)]
pub enum HeartbeatError {
    #[error("No heartbeat thumper slots left (max {max})")]
    NoThumperSlots { max: usize },

    #[error("Heartbeat period must be greater than zero")]
    ZeroPeriod,

    #[error("Failed to release {failed} heartbeat context(s) in time")]
    FreeFailed { failed: usize },

    #[error("Failed to spawn heartbeat watcher thread: {0}")]
    WatcherSpawn(#[source] std::io::Error),
}

/// Transport (PAL) errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Address resolution failed: {0}")]
    Resolve(String),

    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Transport closed")]
    Closed,
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_builder() {
            TransportError::InvalidUrl(err.to_string())
        } else {
            TransportError::Io(err.to_string())
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Load(String),

    #[error("Configuration validation failed:\n{0}")]
    Invalid(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}
