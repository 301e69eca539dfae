//! # Controller
//!
//! - `addon_deploy`: the reconciliation engine
//! - `backoff`: retry delays for failed syncs
//! - `server`: metrics and probe endpoints

pub mod addon_deploy;
pub mod backoff;
pub mod server;
