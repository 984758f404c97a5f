//! The flow module implements flow shaping control.
//!
//! A flow `Rule` is compiled into a `Controller` with two cooperating parts:
//!
//!  1. The `Calculator` derives the actual allowed threshold. Built-in
//!     strategies are Direct and WarmUp.
//!  2. The `Checker` compares current metrics against that threshold and
//!     yields the token result. Built-in strategies are Reject and Throttling.
//!
//! Rules with `global_mode` set are kept apart from resource level rules and
//! gate every entry of the resource they name, regardless of the context the
//! entry was created in.
//!
//! Customized shaping strategies can be plugged in for the `Custom` control
//! strategy via `set_traffic_shaping_generator()` and removed again with
//! `remove_traffic_shaping_generator()`. The built-in strategies cannot be
//! overridden.

pub mod rule;
pub mod rule_manager;
pub mod slot;
pub mod traffic_shaping;

pub use rule::*;
pub use rule_manager::*;
pub use slot::*;
pub use traffic_shaping::*;
