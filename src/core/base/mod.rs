//! Core data model: resources, contexts, entries, rule check results and
//! the slot chain traits every pipeline component implements.

pub mod block_error;
pub mod constant;
pub mod context;
pub mod entry;
pub mod resource;
pub mod result;
pub mod rule;
pub mod slot_chain;
pub mod stat;

pub use block_error::*;
pub use constant::*;
pub use context::*;
pub use entry::*;
pub use resource::*;
pub use result::*;
pub use rule::*;
pub use slot_chain::*;
pub use stat::*;
