use super::constant::*;
use crate::{
    base::{check_validity_for_reuse_statistic, constant::*, ResourceType},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// app_name represents the name of the current running service.
    pub app_name: String,
    /// app_type indicates the resource type of the service (e.g. web service, API gateway).
    pub app_type: ResourceType,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            app_name: DEFAULT_APP_NAME.into(),
            app_type: DEFAULT_APP_TYPE.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// path of the log4rs configuration file, only read when the
    /// `logger_log4rs` feature is active
    pub config_file: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            config_file: LOG_CONFIG_FILE.into(),
        }
    }
}

/// StatConfig carries the sliding window settings of the statistic nodes.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct StatConfig {
    /// sample_count_total and interval_ms_total configure the underlying
    /// statistic array of every resource node
    pub sample_count_total: u32,
    pub interval_ms_total: u32,
    /// sample_count and interval_ms configure the read-only metric view
    /// of every resource node, which must be reusable on the array above
    pub sample_count: u32,
    pub interval_ms: u32,
}

impl Default for StatConfig {
    fn default() -> Self {
        StatConfig {
            sample_count_total: DEFAULT_SAMPLE_COUNT_TOTAL,
            interval_ms_total: DEFAULT_INTERVAL_MS_TOTAL,
            sample_count: DEFAULT_SAMPLE_COUNT,
            interval_ms: DEFAULT_INTERVAL_MS,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(default)]
pub struct RampartConfig {
    pub app: AppConfig,
    pub log: LogConfig,
    pub stat: StatConfig,
}

/// ConfigEntity is the root of the general configuration.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct ConfigEntity {
    pub version: String,
    pub config: RampartConfig,
}

impl Default for ConfigEntity {
    fn default() -> Self {
        ConfigEntity {
            version: RAMPART_VERSION.into(),
            config: RampartConfig::default(),
        }
    }
}

impl ConfigEntity {
    pub fn new() -> Self {
        ConfigEntity::default()
    }

    pub fn check(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(Error::msg("empty version"));
        }
        if self.config.app.app_name.is_empty() {
            return Err(Error::msg("empty app name"));
        }
        check_validity_for_reuse_statistic(
            self.config.stat.sample_count,
            self.config.stat.interval_ms,
            self.config.stat.sample_count_total,
            self.config.stat.interval_ms_total,
        )?;
        Ok(())
    }
}

impl fmt::Display for ConfigEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(self) {
            Ok(fmtted) => write!(f, "{}", fmtted),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}
