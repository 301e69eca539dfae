//! # Configuration
//!
//! Controller settings loaded from environment variables, with CLI overrides
//! applied in `main`.

pub mod controller;

pub use controller::ControllerConfig;
