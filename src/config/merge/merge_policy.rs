//! Merge rules: built-in defaults and the order sources are layered in.

use crate::types::{DEFAULT_ORIGIN, DEFAULT_TRANSACTION_TIMER_MS, DEFAULT_WAIT_CONNECT_TIMER_MS};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment};

/// Prefix of environment overrides, e.g. `PUBSUB__KEYS__SUBSCRIBE_KEY`
pub const ENV_PREFIX: &str = "PUBSUB";
pub const ENV_SEPARATOR: &str = "__";

/// Config builder with the built-in defaults applied
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("origin", DEFAULT_ORIGIN)?
        .set_default("use_tls", true)?
        .set_default("timeouts.transaction_ms", DEFAULT_TRANSACTION_TIMER_MS)?
        .set_default("timeouts.connect_ms", DEFAULT_WAIT_CONNECT_TIMER_MS)
}

/// Environment overrides; applied last so they win over every file
pub fn add_environment(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    )
}
