use super::{constant::*, ConfigEntity};
use crate::{base::ResourceType, logging, utils, Result};
use lazy_static::lazy_static;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::RwLock;

lazy_static! {
    static ref GLOBAL_CONFIG: RwLock<ConfigEntity> = RwLock::new(ConfigEntity::new());
}

pub fn reset_global_config(entity: ConfigEntity) {
    *GLOBAL_CONFIG.write().unwrap() = entity;
}

/// init_config_with_yaml loads the general configuration from the YAML file
/// under the provided path, then applies environment overrides and
/// initializes the logger.
pub fn init_config_with_yaml(config_path: &mut String) -> Result<()> {
    apply_yaml_config_file(config_path)?;
    override_items_from_system_env()?;
    #[cfg(any(feature = "logger_env", feature = "logger_log4rs"))]
    init_log()?;
    Ok(())
}

// Priority: system environment > YAML file > default config
fn apply_yaml_config_file(config_path: &mut String) -> Result<()> {
    if utils::is_blank(config_path) {
        // when no path is given, try to resolve one from the system env
        *config_path = env::var(CONF_FILE_PATH_ENV_KEY).unwrap_or_else(|_| CONFIG_FILENAME.into());
    }
    load_global_config_from_yaml_file(config_path)
}

fn load_global_config_from_yaml_file(path_str: &str) -> Result<()> {
    if path_str == CONFIG_FILENAME {
        // no file was given or resolved, keep the defaults
        return Ok(());
    }
    let path = Path::new(path_str);
    let content = fs::read_to_string(path)?;
    let entity: ConfigEntity = serde_yaml::from_str(&content)?;
    entity.check()?;
    logging::info!("[Config] Resolving config from file, file {}", path_str);
    reset_global_config(entity);
    Ok(())
}

fn override_items_from_system_env() -> Result<()> {
    let app_name = env::var(APP_NAME_ENV_KEY).unwrap_or_default();
    let app_type: ResourceType = env::var(APP_TYPE_ENV_KEY)
        .unwrap_or_else(|_| format!("{}", DEFAULT_APP_TYPE))
        .parse::<u8>()
        .unwrap_or(DEFAULT_APP_TYPE)
        .into();

    let mut cfg = GLOBAL_CONFIG.write().unwrap();
    if !utils::is_blank(&app_name) {
        cfg.config.app.app_name = app_name;
    }
    cfg.config.app.app_type = app_type;
    cfg.check()?;
    Ok(())
}

#[cfg(any(feature = "logger_env", feature = "logger_log4rs"))]
pub fn init_log() -> Result<()> {
    logging::logger_init(log_config_file());

    logging::info!("[Config] App name resolved, appName {}", app_name());
    logging::info!(
        "[Config] Print effective global config, globalConfig {:?}",
        *GLOBAL_CONFIG.read().unwrap()
    );
    Ok(())
}

#[inline]
pub fn log_config_file() -> Option<String> {
    Some(GLOBAL_CONFIG.read().unwrap().config.log.config_file.clone())
}

#[inline]
pub fn app_name() -> String {
    GLOBAL_CONFIG.read().unwrap().config.app.app_name.clone()
}

#[inline]
pub fn app_type() -> ResourceType {
    GLOBAL_CONFIG.read().unwrap().config.app.app_type
}

#[inline]
pub fn global_stat_interval_ms_total() -> u32 {
    GLOBAL_CONFIG.read().unwrap().config.stat.interval_ms_total
}

#[inline]
pub fn global_stat_sample_count_total() -> u32 {
    GLOBAL_CONFIG.read().unwrap().config.stat.sample_count_total
}

#[inline]
pub fn global_stat_bucket_length_ms() -> u32 {
    global_stat_interval_ms_total() / global_stat_sample_count_total()
}

#[inline]
pub fn metric_stat_interval_ms() -> u32 {
    GLOBAL_CONFIG.read().unwrap().config.stat.interval_ms
}

#[inline]
pub fn metric_stat_sample_count() -> u32 {
    GLOBAL_CONFIG.read().unwrap().config.stat.sample_count
}
