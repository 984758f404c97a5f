//! Initialization of the runtime environment:
//! 1. resolve the global config, from a given entity, a YAML file or env
//! 2. initialize the global logger

use crate::{config, config::ConfigEntity, Result};

/// `init_default` initializes the engine using the configuration from the
/// system environment and the built-in defaults.
#[inline]
pub fn init_default() -> Result<()> {
    init_with_config_file(&mut String::new())
}

/// `init_with_config` initializes the engine using the given config entity.
#[inline]
pub fn init_with_config(config_entity: ConfigEntity) -> Result<()> {
    config_entity.check()?;
    config::reset_global_config(config_entity);
    #[cfg(any(feature = "logger_env", feature = "logger_log4rs"))]
    config::init_log()?;
    Ok(())
}

/// `init_with_config_file` loads the general configuration from the given
/// YAML file and initializes the engine. An empty path falls back to the
/// `RAMPART_CONFIG_FILE_PATH` env variable and then to the defaults.
#[inline]
pub fn init_with_config_file(config_path: &mut String) -> Result<()> {
    config::init_config_with_yaml(config_path)
}
