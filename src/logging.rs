use cfg_if::cfg_if;
pub use log::{debug, error, info, trace, warn};

cfg_if! {
    if #[cfg(feature = "logger_env")] {
        use crate::config::DEFAULT_LOG_LEVEL;
        pub fn logger_init(_: Option<String>) {
            // repeated initialization is a no-op
            env_logger::Builder::from_env(
                env_logger::Env::default().default_filter_or(DEFAULT_LOG_LEVEL),
            )
            .try_init()
            .ok();
        }
    }
    else if #[cfg(feature = "logger_log4rs")] {
        use std::path::Path;
        pub fn logger_init(file_name: Option<String>) {
            let file_name =
                file_name.expect("must provide a configuration file for the log4rs crate");
            let path = Path::new(&file_name);
            if path.exists() {
                log4rs::init_file(path, Default::default()).ok();
            }
        }
    } else {
        pub fn logger_init(_: Option<String>) {}
    }
}
