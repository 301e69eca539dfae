//! Addon Deploy Controller Library
//!
//! Hub-side engine that turns each registered addon's manifests into
//! size-bounded ManifestWorks on its managed cluster (or hosting cluster) and
//! reports deployment, hook and health progress as addon conditions.
//!
//! ## Quick Start
//!
//! ```rust
//! use addon_deploy_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod provider;
pub mod runtime;
