#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Rampart
//!
//! Rampart is an in-process admission control and resilience engine. It
//! guards named resources with **flow rules**, **traffic shaping**,
//! **circuit breaking** and **adaptive system protection**, all backed by
//! sliding-window statistics.
//!
//! Every admission runs through a chain-of-responsibility pipeline
//! (`base::SlotChain`): statistic preparation slots select the nodes to
//! account against, rule check slots decide pass/block/wait, and statistic
//! slots record the outcome. Using the engine takes four steps:
//! 1. Initialize the runtime once (`init_default()` or one of its variants).
//! 2. Load rules for the resources you want to guard.
//! 3. Build an entry before the guarded code runs.
//! 4. Exit the entry when the code finishes (and attach errors via
//!    `trace_error` so error-based breakers see them).
//!
//! ## Initialization
//!
//! - `init_default()`: resolve configuration from environment variables,
//!   falling back to defaults.
//! - `init_with_config_file(config_path: &mut String)`: load a YAML file.
//! - `init_with_config(config_entity: ConfigEntity)`: hand-crafted config.
//!
//! ```rust
//! use rampart::{init_default, logging};
//! init_default().unwrap_or_else(|err| logging::error!("{:?}", err));
//! ```
//!
//! ## Guarding a resource
//!
//! An entry is created through `EntryBuilder`. If the admission is blocked,
//! `build()` returns an error and no `exit()` call is needed.
//!
//! ```rust
//! use rampart::{base, EntryBuilder};
//! let entry_builder = EntryBuilder::new("example".into())
//!     .with_traffic_type(base::TrafficType::Inbound);
//! if let Ok(entry) = entry_builder.build() {
//!     // the request is admitted, run the guarded logic,
//!     // then exit the entry
//!     entry.exit().unwrap();
//! } else {
//!     // the request is blocked, serve the fallback instead
//! }
//! ```
//!
//! ## Loading rules
//!
//! `load_rules()` replaces all rules of a module atomically, `append_rule()`
//! adds one incrementally. For example:
//!
//! ```rust
//! use rampart::flow;
//! use std::sync::Arc;
//! flow::load_rules(vec![Arc::new(flow::Rule {
//!     resource: "example".into(),
//!     threshold: 10.0,
//!     control_strategy: flow::ControlStrategy::Reject,
//!     ..Default::default()
//! })]);
//! ```
//!
//! Reloading preserves the state of controllers and breakers whose rules are
//! value-equal to the previous ones.

/// Public entry points: initialization and the entry builder.
pub mod api;
/// Core implementations: the sliding-window statistic structures, the slot
/// chain, and the rule managers for flow control, circuit breaking and
/// system protection.
pub mod core;
/// Adapters for the logging facade.
pub mod logging;
/// Time and formatting helpers.
pub mod utils;

pub use crate::core::*;
pub use api::*;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
