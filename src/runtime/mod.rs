//! # Runtime
//!
//! Process wiring around the engine: startup, the kube-runtime controller
//! loop, its error policy and the plugin composition root.

pub mod context;
pub mod error_policy;
pub mod initialization;
pub mod plugin;
pub mod watch_loop;

pub use context::Context;
pub use plugin::{AgentPlugin, Routine};
