//! mod `system` provides adaptive system-wide protection.
//!
//! Rules here are not scoped to a single resource. Each one guards a global
//! inbound metric (pass QPS, concurrency or average RT) and rejects further
//! inbound traffic once the metric reaches the rule threshold.

pub mod rule;
pub mod rule_manager;
pub mod slot;

pub use rule::*;
pub use rule_manager::*;
pub use slot::*;
