//! Loading [`ClientConfig`] from layered sources.

use super::merge::merge_policy;
use super::sources::{global_file, project_file};
use super::ClientConfig;
use crate::error::ConfigError;
use config::{File, FileFormat};
use std::path::{Path, PathBuf};

/// Entry point for loading configuration
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load defaults, the global file, project files under `project_root` and the environment
    pub fn load(project_root: &Path) -> Result<ClientConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = project_file::add_to_builder(builder, project_root)?;
        let builder = merge_policy::add_environment(builder);
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Load a single file on top of the defaults; the environment still overrides it
    pub fn load_from_file(path: &Path) -> Result<ClientConfig, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::Load(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let builder = merge_policy::builder_with_defaults()?
            .add_source(File::from(path).format(FileFormat::Toml).required(true));
        let builder = merge_policy::add_environment(builder);
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Path of the global config file
    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    /// Serialize `config` as TOML, e.g. to seed a config file
    pub fn to_toml(config: &ClientConfig) -> Result<String, ConfigError> {
        toml::to_string_pretty(config).map_err(|e| ConfigError::Load(e.to_string()))
    }
}
