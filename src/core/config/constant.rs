use crate::base::ResourceType;

// default app settings
pub const RAMPART_VERSION: &str = "v1";
pub const DEFAULT_APP_NAME: &str = "unknown_service";
pub const DEFAULT_APP_TYPE: u8 = ResourceType::Common as _;
pub const APP_NAME_ENV_KEY: &str = "RAMPART_APP_NAME";
pub const APP_TYPE_ENV_KEY: &str = "RAMPART_APP_TYPE";
pub const CONF_FILE_PATH_ENV_KEY: &str = "RAMPART_CONFIG_FILE_PATH";
// placeholder meaning "no config file, use the built-in defaults"
pub const CONFIG_FILENAME: &str = "USE_DEFAULT_CONFIGURATION";

// default log settings
pub const DEFAULT_LOG_LEVEL: &str = "warn";
pub const LOG_CONFIG_FILE: &str = "testdata/config/log4rs.yaml";
