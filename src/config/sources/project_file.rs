//! Project config file source: config/pubsub.toml and config/{PUBSUB_ENV}.toml

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use std::path::Path;

/// Selects the environment-specific project file
pub const ENV_NAME_VAR: &str = "PUBSUB_ENV";

/// Add project config files under `project_root/config` to `builder`
///
/// `pubsub.toml` is the base and `{PUBSUB_ENV}.toml` (default `development`) layers on top.
pub fn add_to_builder(
    mut builder: ConfigBuilder<DefaultState>,
    project_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let config_dir = project_root.join("config");
    let env_name = std::env::var(ENV_NAME_VAR).unwrap_or_else(|_| "development".to_string());

    for path in [
        config_dir.join("pubsub.toml"),
        config_dir.join(format!("{}.toml", env_name)),
    ] {
        if path.exists() {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }
    }
    Ok(builder)
}
