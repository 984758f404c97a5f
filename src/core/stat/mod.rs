//! The `stat` mod implements the statistic slots and their data structures:
//! the sliding window (LeapArray) and the statistic node hierarchy.
mod base;
mod cluster_builder_slot;
mod node;
mod node_selector_slot;
mod node_storage;
mod stat_slot;

pub(crate) use base::*;
pub use cluster_builder_slot::*;
pub use node::*;
pub use node_selector_slot::*;
pub use node_storage::*;
pub use stat_slot::*;
