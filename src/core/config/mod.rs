//! mod `config` holds the general configuration of the engine: application
//! identity, logger settings and the default sliding window layout.
//! The effective configuration is resolved from, in increasing priority,
//! built-in defaults, an optional YAML file and system environment variables.

pub mod base;
pub mod constant;
pub mod entity;

pub use self::base::*;
pub use constant::*;
pub use entity::*;
