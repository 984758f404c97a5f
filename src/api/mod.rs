//! mod `api` provides the topmost APIs of the engine.
//! Initialize the runtime before loading any rules, either with
//! `init_default()`, `init_with_config(entity)` or
//! `init_with_config_file(path)`. Afterwards guard a piece of code by
//! building an entry for its resource name and exiting it when done.

mod api;
mod init;
mod slot_chain;

pub use self::api::*;
pub use init::*;
pub use slot_chain::*;
